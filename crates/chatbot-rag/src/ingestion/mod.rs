//! Document ingestion: loading, chunking and batched embedding

mod batcher;
mod chunker;
mod loader;
mod parser;
mod policy;

pub use batcher::{EmbeddingBatcher, IngestOutcome, IngestReport};
pub use chunker::TextChunker;
pub use loader::DocumentLoader;
pub use parser::{markdown_to_text, FileParser};
pub use policy::PacingPolicy;
