//! Fixed user-facing messages for answers that could not be generated

use crate::error::{Error, ProviderErrorKind};

/// No store has been built or opened
pub const NO_DATABASE: &str =
    "Sorry, the document database is not available right now. Please contact the administrator.";

/// The provider rejected (or never received) credentials
pub const AUTH_FAILURE: &str =
    "Sorry, the API key for the language model is missing or invalid. Please contact the administrator.";

/// The configured model does not exist or is not served
pub const MODEL_UNAVAILABLE: &str =
    "Sorry, the AI model cannot be reached right now. Please contact the administrator.";

/// Prefix of the generic failure message
pub const GENERIC_FAILURE_PREFIX: &str = "Sorry, an error occurred while generating the answer: ";

/// Returned by the API when the model produced an empty answer
pub const EMPTY_ANSWER: &str = "Sorry, I could not generate an answer.";

/// Characters of error text included in the generic message
pub const ERROR_EXCERPT_CHARS: usize = 100;

/// Map a failure to the message shown to the user
pub fn user_message(error: &Error) -> String {
    match error.provider_kind() {
        Some(ProviderErrorKind::Auth) => AUTH_FAILURE.to_string(),
        Some(ProviderErrorKind::ModelUnavailable) => MODEL_UNAVAILABLE.to_string(),
        _ => format!(
            "{}{}",
            GENERIC_FAILURE_PREFIX,
            excerpt(&error.to_string(), ERROR_EXCERPT_CHARS)
        ),
    }
}

/// First `max` characters of `text`
fn excerpt(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
