//! Answer generation: prompt assembly, the answer chain and user-facing fallbacks

mod chain;
pub mod fallback;
mod prompt;

pub use chain::AnswerChain;
pub use prompt::{PromptBuilder, CONTEXT_SEPARATOR};
