//! Query-time retrieval over the vector store

mod retriever;

pub use retriever::Retriever;
