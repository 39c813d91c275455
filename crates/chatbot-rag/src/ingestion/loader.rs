//! Directory loader dispatching files to format parsers

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Document, FileType};

use super::parser::FileParser;

/// Loads every supported file directly inside a directory
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentLoader;

impl DocumentLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self
    }

    /// Load documents from the direct children of `dir`
    ///
    /// Subdirectories are skipped, unsupported extensions are skipped with a
    /// warning, and a file that fails to parse contributes nothing. A missing
    /// directory yields an empty result.
    pub fn load_directory(&self, dir: &Path) -> Vec<Document> {
        let files = match list_files(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!("Cannot read document directory {}: {}", dir.display(), e);
                return Vec::new();
            }
        };

        let mut documents = Vec::new();
        for path in files {
            if !FileType::from_path(&path).is_supported() {
                tracing::warn!("Skipping unsupported file {}", path.display());
                continue;
            }

            match self.load_file(&path) {
                Ok(docs) => {
                    tracing::debug!("Loaded {} document(s) from {}", docs.len(), path.display());
                    documents.extend(docs);
                }
                Err(e) => tracing::warn!("Error loading file {}: {}", path.display(), e),
            }
        }

        tracing::info!(
            "Loaded {} document(s) from {}",
            documents.len(),
            dir.display()
        );
        documents
    }

    /// Load a single file
    pub fn load_file(&self, path: &Path) -> Result<Vec<Document>> {
        let data = std::fs::read(path)?;
        FileParser::parse(path, &data)
    }
}

/// Regular files directly inside `dir`, sorted by name
fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
