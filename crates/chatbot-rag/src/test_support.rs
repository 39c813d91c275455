//! Deterministic providers shared by unit tests

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::providers::EmbeddingProvider;
use crate::store::VectorStore;
use crate::types::EmbeddingRecord;

const VOCAB: [&str; 5] = ["paris", "berlin", "france", "germany", "capital"];

/// Term counts over a tiny fixed vocabulary
pub struct VocabEmbedder;

impl VocabEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        VOCAB
            .iter()
            .map(|word| lower.matches(word).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for VocabEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| Self::vector(t)).collect())
    }

    fn model(&self) -> &str {
        "vocab"
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "vocab"
    }
}

/// A store at `path` holding `texts` embedded with `VocabEmbedder`
pub fn vocab_store(path: &Path, texts: &[&str]) -> Arc<VectorStore> {
    let records = texts
        .iter()
        .enumerate()
        .map(|(i, text)| EmbeddingRecord {
            id: format!("r{}", i),
            chunk_text: text.to_string(),
            vector: VocabEmbedder::vector(text),
            metadata: BTreeMap::new(),
        })
        .collect();
    Arc::new(VectorStore::create(path, "sw_db", "vocab", records).unwrap())
}

/// A one-page PDF whose only font is a `Type0` font with no
/// `DescendantFonts`, which pdf-extract cannot handle
pub fn broken_font_pdf() -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type0",
        "BaseFont" => "Broken",
        "Encoding" => "Identity-H",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![100.into(), 600.into()]),
            Operation::new("Tj", vec![Object::string_literal("Hello")]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}
