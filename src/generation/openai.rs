//! Generator backed by an OpenAI-compatible chat endpoint.
//!
//! Works against any server speaking the OpenAI chat API (set the base URL
//! for local inference servers). HTTP status categories are mapped onto
//! [`ModelError`] so callers can react to rate limits and auth failures.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures_util::StreamExt;

use super::{ChatMessage, ChatRole, Generator, TokenStream};
use crate::error::ModelError;

/// Generator over an OpenAI-compatible chat-completion endpoint.
pub struct OpenAiGenerator {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiGenerator {
    /// Creates a generator for `model`, reading credentials from the
    /// standard environment variables.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    /// Creates a generator against a custom base URL (e.g. a local
    /// inference server).
    #[must_use]
    pub fn with_base_url(model: impl Into<String>, base_url: &str, api_key: &str) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
        }
    }

    fn build_request(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<async_openai::types::CreateChatCompletionRequest, ModelError> {
        let mapped: Vec<ChatCompletionRequestMessage> = messages
            .iter()
            .map(to_request_message)
            .collect::<std::result::Result<_, _>>()?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(mapped)
            .build()
            .map_err(map_openai_error)
    }
}

#[async_trait]
impl Generator for OpenAiGenerator {
    async fn call(&self, messages: &[ChatMessage]) -> std::result::Result<String, ModelError> {
        let request = self.build_request(messages)?;
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ModelError::EmptyResponse)
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
    ) -> std::result::Result<TokenStream, ModelError> {
        let request = self.build_request(messages)?;
        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(map_openai_error)?;

        let fragments = stream.filter_map(|chunk| async move {
            match chunk {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|fragment| !fragment.is_empty())
                    .map(Ok),
                Err(err) => Some(Err(map_openai_error(err))),
            }
        });

        Ok(Box::pin(fragments))
    }
}

fn to_request_message(
    message: &ChatMessage,
) -> std::result::Result<ChatCompletionRequestMessage, ModelError> {
    let built = match message.role {
        ChatRole::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(message.text.clone())
            .build()
            .map(ChatCompletionRequestMessage::from),
        ChatRole::User => ChatCompletionRequestUserMessageArgs::default()
            .content(message.text.clone())
            .build()
            .map(ChatCompletionRequestMessage::from),
        ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(message.text.clone())
            .build()
            .map(ChatCompletionRequestMessage::from),
    };
    built.map_err(map_openai_error)
}

/// Maps endpoint failures onto the stable [`ModelError`] categories.
pub(crate) fn map_openai_error(err: OpenAIError) -> ModelError {
    match err {
        OpenAIError::ApiError(api) => {
            let message = api.message.clone();
            let lowered = message.to_lowercase();
            match api.code.as_deref() {
                Some("429") | Some("rate_limit_exceeded") | Some("insufficient_quota") => {
                    ModelError::RateLimited { message }
                }
                Some("401") | Some("invalid_api_key") => ModelError::Unauthorized { message },
                _ if lowered.contains("rate limit") => ModelError::RateLimited { message },
                _ if lowered.contains("unauthorized") || lowered.contains("api key") => {
                    ModelError::Unauthorized { message }
                }
                _ => ModelError::Request(message),
            }
        }
        OpenAIError::Reqwest(err) => {
            let message = err.to_string();
            match err.status().map(|s| s.as_u16()) {
                Some(429) => ModelError::RateLimited { message },
                Some(401) => ModelError::Unauthorized { message },
                Some(status) if status >= 500 => ModelError::UpstreamServer { status, message },
                _ => ModelError::Request(message),
            }
        }
        other => ModelError::Request(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_openai::error::ApiError;

    fn api_error(code: Option<&str>, message: &str) -> OpenAIError {
        OpenAIError::ApiError(ApiError {
            message: message.to_string(),
            r#type: None,
            param: None,
            code: code.map(ToString::to_string),
        })
    }

    #[test]
    fn test_map_rate_limit_code() {
        let err = map_openai_error(api_error(Some("rate_limit_exceeded"), "slow down"));
        assert!(matches!(err, ModelError::RateLimited { .. }));
    }

    #[test]
    fn test_map_unauthorized_code() {
        let err = map_openai_error(api_error(Some("invalid_api_key"), "bad key"));
        assert!(matches!(err, ModelError::Unauthorized { .. }));
    }

    #[test]
    fn test_map_rate_limit_from_message() {
        let err = map_openai_error(api_error(None, "Rate limit reached for requests"));
        assert!(matches!(err, ModelError::RateLimited { .. }));
    }

    #[test]
    fn test_map_other_api_error() {
        let err = map_openai_error(api_error(None, "model overloaded"));
        assert!(matches!(err, ModelError::Request(_)));
    }

    #[test]
    fn test_map_stream_error() {
        let err = map_openai_error(OpenAIError::StreamError("connection reset".to_string()));
        assert!(matches!(err, ModelError::Request(_)));
    }

    #[test]
    fn test_build_request_maps_roles() {
        let generator = OpenAiGenerator::with_base_url("test-model", "http://localhost:1", "k");
        let request = generator
            .build_request(&[
                ChatMessage::system("sys"),
                ChatMessage::user("usr"),
                ChatMessage::assistant("asst"),
            ])
            .unwrap();
        assert_eq!(request.messages.len(), 3);
    }
}
