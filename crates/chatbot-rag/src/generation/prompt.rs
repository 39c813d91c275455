//! Prompt template for grounded question answering

use crate::types::RetrievedChunk;

/// Separator placed between retrieved chunks in the context
pub const CONTEXT_SEPARATOR: &str = "\n\n";

/// Prompt builder for RAG queries
pub struct PromptBuilder;

impl PromptBuilder {
    /// Join retrieved chunk texts in retrieval order
    pub fn build_context(chunks: &[RetrievedChunk]) -> String {
        chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CONTEXT_SEPARATOR)
    }

    /// Fill the fixed answer template. Each placeholder is substituted once,
    /// so braces inside the question or context are left alone.
    pub fn build_rag_prompt(question: &str, context: &str) -> String {
        format!(
            r#"You are an assistant for question-answering tasks. Use the following pieces of retrieved context to answer the question.
If you don't know the answer, just say that you don't know.
Use three sentences maximum and keep the answer concise.

Question: {question}
Context: {context}
Answer:"#,
            question = question,
            context = context
        )
    }
}
