//! Recursive sliding-window text chunking

use std::collections::VecDeque;
use unicode_segmentation::UnicodeSegmentation;

use crate::config::ChunkingConfig;
use crate::types::{Chunk, Document};

/// Split levels, coarsest first. Every level yields pieces that concatenate
/// back to the input, so merging never loses text.
#[derive(Debug, Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Grapheme,
}

const BOUNDARIES: [Boundary; 5] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
    Boundary::Grapheme,
];

impl Boundary {
    fn split<'a>(&self, text: &'a str) -> Vec<&'a str> {
        match self {
            Boundary::Paragraph => text.split_inclusive("\n\n").collect(),
            Boundary::Line => text.split_inclusive('\n').collect(),
            Boundary::Sentence => text.split_sentence_bounds().collect(),
            Boundary::Word => text.split_word_bounds().collect(),
            Boundary::Grapheme => text.graphemes(true).collect(),
        }
    }
}

/// Text chunker with configurable size and overlap (both in characters)
#[derive(Debug, Clone)]
pub struct TextChunker {
    /// Target chunk size in characters
    chunk_size: usize,
    /// Overlap between consecutive chunks
    overlap: usize,
}

impl TextChunker {
    /// Create a new chunker
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            overlap: overlap.min(chunk_size.saturating_sub(1)),
        }
    }

    /// Create from config
    pub fn from_config(config: &ChunkingConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Split documents into chunks, preserving document order then position
    pub fn split(&self, documents: &[Document]) -> Vec<Chunk> {
        documents
            .iter()
            .flat_map(|doc| self.chunk_document(doc))
            .collect()
    }

    /// Chunk a single document
    pub fn chunk_document(&self, doc: &Document) -> Vec<Chunk> {
        let texts = self.split_text(&doc.raw_text);
        let mut chunks = Vec::with_capacity(texts.len());
        let mut previous: Option<&str> = None;

        for (index, text) in texts.iter().enumerate() {
            let overlap = previous
                .map(|prev| shared_overlap(prev, text, self.overlap))
                .unwrap_or(0);
            chunks.push(Chunk::new(doc, text.clone(), index as u32, overlap));
            previous = Some(text.as_str());
        }

        chunks
    }

    /// Split raw text into chunk strings
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, 0)
    }

    fn split_recursive(&self, text: &str, level: usize) -> Vec<String> {
        let mut out = Vec::new();
        let mut fitting: Vec<&str> = Vec::new();

        for piece in BOUNDARIES[level].split(text) {
            if char_len(piece) <= self.chunk_size {
                fitting.push(piece);
                continue;
            }

            if !fitting.is_empty() {
                out.extend(self.merge(&fitting));
                fitting.clear();
            }

            if level + 1 < BOUNDARIES.len() {
                out.extend(self.split_recursive(piece, level + 1));
            } else {
                // one grapheme cluster longer than a chunk: cut by char
                out.extend(self.merge(&char_pieces(piece)));
            }
        }

        if !fitting.is_empty() {
            out.extend(self.merge(&fitting));
        }

        out
    }

    /// Greedily merge pieces into windows of at most `chunk_size` characters,
    /// carrying up to `overlap` characters of trailing pieces forward
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut out = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut out, &concat(&window));

                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, dropped)) => total -= dropped,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if !window.is_empty() {
            push_trimmed(&mut out, &concat(&window));
        }

        out
    }
}

impl Default for TextChunker {
    fn default() -> Self {
        Self::from_config(&ChunkingConfig::default())
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn char_pieces(text: &str) -> Vec<&str> {
    text.char_indices()
        .map(|(start, c)| &text[start..start + c.len_utf8()])
        .collect()
}

fn concat(window: &VecDeque<(&str, usize)>) -> String {
    window.iter().map(|(piece, _)| *piece).collect()
}

fn push_trimmed(out: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

/// Length in characters of the longest suffix of `prev` that starts `next`,
/// bounded by `max`
fn shared_overlap(prev: &str, next: &str, max: usize) -> usize {
    let prev_chars: Vec<char> = prev.chars().collect();
    let next_chars: Vec<char> = next.chars().collect();
    let limit = max.min(prev_chars.len()).min(next_chars.len());

    (1..=limit)
        .rev()
        .find(|&n| prev_chars[prev_chars.len() - n..] == next_chars[..n])
        .unwrap_or(0)
}
