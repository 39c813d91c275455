//! Format-specific text extraction

use pulldown_cmark::{Event, Parser, TagEnd};
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Document, FileType};

/// Extracts plain text documents from supported file formats
pub struct FileParser;

impl FileParser {
    /// Parse a file based on its extension
    ///
    /// Markdown yields a single document; PDFs yield one document per page
    /// that has text.
    pub fn parse(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
        match FileType::from_path(path) {
            FileType::Markdown => Self::parse_markdown(path, data).map(|doc| vec![doc]),
            FileType::Pdf => Self::parse_pdf_guarded(path, data),
            FileType::Unknown => Err(Error::UnsupportedFileType(
                path.extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_else(|| "<none>".to_string()),
            )),
        }
    }

    /// Parse markdown into plain text, one block per paragraph
    fn parse_markdown(path: &Path, data: &[u8]) -> Result<Document> {
        let source = std::str::from_utf8(data)
            .map_err(|e| Error::file_parse(display_name(path), format!("invalid UTF-8: {}", e)))?;

        Ok(Document::new(
            path,
            markdown_to_text(source),
            FileType::Markdown,
        ))
    }

    /// Run PDF extraction, turning a panic inside the PDF crates (malformed
    /// fonts trip asserts in pdf-extract) into a parse error for this file
    fn parse_pdf_guarded(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
        catch_unwind(AssertUnwindSafe(|| Self::parse_pdf(path, data))).unwrap_or_else(|payload| {
            let reason = panic_reason(payload.as_ref());
            tracing::warn!("PDF extraction panicked on {}: {}", path.display(), reason);
            Err(Error::file_parse(
                display_name(path),
                format!("PDF extraction panicked: {}", reason),
            ))
        })
    }

    /// Parse PDF page by page
    fn parse_pdf(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
        let pdf = match lopdf::Document::load_mem(data) {
            Ok(pdf) => pdf,
            Err(e) => {
                tracing::debug!(
                    "lopdf could not load {}: {}; trying pdf-extract",
                    path.display(),
                    e
                );
                return Self::parse_pdf_whole(path, data);
            }
        };

        let pages = pdf.get_pages();
        let mut docs = Vec::with_capacity(pages.len());
        let mut failed_pages = 0usize;

        for (index, page_number) in pages.keys().enumerate() {
            match pdf.extract_text(&[*page_number]) {
                Ok(text) => {
                    let text = normalize_whitespace(&text);
                    if !text.is_empty() {
                        docs.push(Document::new(path, text, FileType::Pdf).with_page(index as u32));
                    }
                }
                Err(e) => {
                    failed_pages += 1;
                    tracing::warn!(
                        "Failed to extract page {} of {}: {}",
                        index + 1,
                        path.display(),
                        e
                    );
                }
            }
        }

        if docs.is_empty() && failed_pages > 0 {
            return Self::parse_pdf_whole(path, data);
        }

        Ok(docs)
    }

    /// Whole-document fallback when per-page extraction is not possible
    fn parse_pdf_whole(path: &Path, data: &[u8]) -> Result<Vec<Document>> {
        let text = pdf_extract::extract_text_from_mem(data)
            .map_err(|e| Error::file_parse(display_name(path), e.to_string()))?;
        let text = normalize_whitespace(&text);

        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![Document::new(path, text, FileType::Pdf).with_page(0)])
    }
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// Render markdown as plain text, separating blocks with blank lines
pub fn markdown_to_text(source: &str) -> String {
    let mut text = String::with_capacity(source.len());

    for event in Parser::new(source) {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::TableRow,
            )
            | Event::Rule => text.push_str("\n\n"),
            Event::End(TagEnd::TableCell) => text.push(' '),
            _ => {}
        }
    }

    normalize_whitespace(&text)
}

/// Trim line ends and collapse runs of blank lines into one
fn normalize_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        blank_run = 0;
    }

    out
}
