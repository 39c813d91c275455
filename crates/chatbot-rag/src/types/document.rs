//! Document, chunk and embedding record types

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Supported source file types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Markdown file
    Markdown,
    /// PDF document
    Pdf,
    /// Anything else (skipped by the loader)
    Unknown,
}

impl FileType {
    /// Detect file type from extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "md" | "markdown" => Self::Markdown,
            "pdf" => Self::Pdf,
            _ => Self::Unknown,
        }
    }

    /// Detect file type from a path
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(Self::Unknown)
    }

    /// Check if this is a supported file type
    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Name used in metadata
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Unknown => "unknown",
        }
    }
}

/// Raw text loaded from one source file (or one PDF page)
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Path the text was read from
    pub source_path: PathBuf,
    /// Extracted plain text
    pub raw_text: String,
    /// Ordered metadata (`source`, `file_type`, `page`, ...)
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    /// Create a document with the standard `source` / `file_type` metadata
    pub fn new(source_path: impl Into<PathBuf>, raw_text: String, file_type: FileType) -> Self {
        let source_path = source_path.into();
        let mut metadata = BTreeMap::new();
        metadata.insert(
            "source".to_string(),
            source_path.to_string_lossy().to_string(),
        );
        metadata.insert("file_type".to_string(), file_type.as_str().to_string());
        Self {
            source_path,
            raw_text,
            metadata,
        }
    }

    /// Attach the 0-based page number of a PDF page
    pub fn with_page(mut self, page: u32) -> Self {
        self.metadata.insert("page".to_string(), page.to_string());
        self
    }

    /// Page number, if this document is a PDF page
    pub fn page(&self) -> Option<u32> {
        self.metadata.get("page").and_then(|p| p.parse().ok())
    }
}

/// A bounded text segment of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Deterministic id derived from source, position and text
    pub id: String,
    /// Text content
    pub text: String,
    /// Position within the source document
    pub chunk_index: u32,
    /// Characters shared with the previous chunk of the same document
    pub overlap_with_prev: usize,
    /// Metadata inherited from the document
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    /// Create a chunk for `doc`
    pub fn new(doc: &Document, text: String, chunk_index: u32, overlap_with_prev: usize) -> Self {
        let id = chunk_id(&doc.metadata, chunk_index, &text);
        let mut metadata = doc.metadata.clone();
        metadata.insert("chunk_index".to_string(), chunk_index.to_string());
        Self {
            id,
            text,
            chunk_index,
            overlap_with_prev,
            metadata,
        }
    }

    /// Pair this chunk with its embedding
    pub fn into_record(self, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            id: self.id,
            chunk_text: self.text,
            vector,
            metadata: self.metadata,
        }
    }
}

/// A persisted embedding with its source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    /// Opaque record id
    pub id: String,
    /// The embedded text
    pub chunk_text: String,
    /// Embedding vector
    pub vector: Vec<f32>,
    /// Source metadata
    pub metadata: BTreeMap<String, String>,
}

fn chunk_id(metadata: &BTreeMap<String, String>, chunk_index: u32, text: &str) -> String {
    let mut hasher = Sha256::new();
    if let Some(source) = metadata.get("source") {
        hasher.update(source.as_bytes());
    }
    hasher.update(b"\0");
    if let Some(page) = metadata.get("page") {
        hasher.update(page.as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(chunk_index.to_le_bytes());
    hasher.update(text.as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
