//! Generative model interface.
//!
//! The core never talks to a model endpoint directly; it goes through the
//! [`Generator`] trait, which has a blocking single-call variant and a
//! streaming variant. The production implementation is
//! [`OpenAiGenerator`]; tests script the trait with stubs.

mod openai;

pub use openai::OpenAiGenerator;
pub(crate) use openai::map_openai_error;

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use crate::error::ModelError;

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    /// System instruction.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

/// One ordered message in a generator conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message role.
    pub role: ChatRole,
    /// Message text.
    pub text: String,
}

impl ChatMessage {
    /// Creates a system message.
    #[must_use]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            text: text.into(),
        }
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            text: text.into(),
        }
    }
}

/// Lazy sequence of completion fragments, terminating with completion or a
/// [`ModelError`].
pub type TokenStream = Pin<Box<dyn Stream<Item = std::result::Result<String, ModelError>> + Send>>;

/// Trait for generative model endpoints.
///
/// Implementations must be thread-safe (`Send + Sync`); a single generator
/// is shared across concurrent requests.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the full completion for the given messages.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] with a stable category (rate limit,
    /// authentication, upstream failure, transport).
    async fn call(&self, messages: &[ChatMessage]) -> std::result::Result<String, ModelError>;

    /// Returns a lazy stream of completion fragments.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the stream cannot be opened; in-stream
    /// failures surface as `Err` items.
    async fn stream(&self, messages: &[ChatMessage])
    -> std::result::Result<TokenStream, ModelError>;
}

/// Strips one matching pair of surrounding quotes from model output.
///
/// Generators frequently wrap short answers in quotes despite instructions;
/// expansion steps strip them before use.
#[must_use]
pub fn strip_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    for (open, close) in [('"', '"'), ('\'', '\''), ('\u{201C}', '\u{201D}')] {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            let inner = &trimmed[open.len_utf8()..trimmed.len() - close.len_utf8()];
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_constructors() {
        assert_eq!(ChatMessage::system("s").role, ChatRole::System);
        assert_eq!(ChatMessage::user("u").role, ChatRole::User);
        assert_eq!(ChatMessage::assistant("a").role, ChatRole::Assistant);
    }

    #[test]
    fn test_strip_quotes_double() {
        assert_eq!(strip_quotes("\"hello world\""), "hello world");
    }

    #[test]
    fn test_strip_quotes_single() {
        assert_eq!(strip_quotes("'hello'"), "hello");
    }

    #[test]
    fn test_strip_quotes_smart() {
        assert_eq!(strip_quotes("\u{201C}hello\u{201D}"), "hello");
    }

    #[test]
    fn test_strip_quotes_untouched() {
        assert_eq!(strip_quotes("plain text"), "plain text");
        assert_eq!(strip_quotes("\"mismatched'"), "\"mismatched'");
    }

    #[test]
    fn test_strip_quotes_whitespace() {
        assert_eq!(strip_quotes("  \" padded \"  "), "padded");
    }

    #[test]
    fn test_strip_quotes_empty() {
        assert_eq!(strip_quotes(""), "");
        assert_eq!(strip_quotes("\""), "\"");
    }
}
