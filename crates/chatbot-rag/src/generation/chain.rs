//! Retrieve, prompt, generate

use std::sync::Arc;

use crate::error::Result;
use crate::providers::LlmProvider;
use crate::retrieval::Retriever;

use super::fallback;
use super::prompt::PromptBuilder;

/// Answers questions from retrieved context with a generation model
pub struct AnswerChain {
    retriever: Retriever,
    llm: Arc<dyn LlmProvider>,
}

impl AnswerChain {
    pub fn new(retriever: Retriever, llm: Arc<dyn LlmProvider>) -> Self {
        Self { retriever, llm }
    }

    /// Retrieve context for `question` and return the model's raw output
    pub async fn answer(&self, question: &str) -> Result<String> {
        let chunks = self.retriever.retrieve_default(question).await?;
        let context = PromptBuilder::build_context(&chunks);
        let prompt = PromptBuilder::build_rag_prompt(question, &context);

        tracing::debug!(
            "Prompting {} with {} chunks ({} chars)",
            self.llm.model(),
            chunks.len(),
            prompt.len()
        );

        self.llm.generate(&prompt).await
    }

    /// Like `answer`, but failures become a fixed user-facing message
    pub async fn respond(&self, question: &str) -> String {
        match self.answer(question).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::error!("Answer generation failed: {}", e);
                fallback::user_message(&e)
            }
        }
    }
}

impl std::fmt::Debug for AnswerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerChain")
            .field("retriever", &self.retriever)
            .field("llm", &self.llm.model())
            .finish()
    }
}
