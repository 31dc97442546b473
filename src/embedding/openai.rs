//! Embedder backed by an OpenAI-compatible embeddings endpoint.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::ModelError;
use crate::generation::map_openai_error;

/// Embedder over an OpenAI-compatible embeddings endpoint.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbedder {
    /// Creates an embedder for `model` with the given output dimensions,
    /// reading credentials from the standard environment variables.
    #[must_use]
    pub fn new(model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
            dimensions,
        }
    }

    /// Creates an embedder against a custom base URL.
    #[must_use]
    pub fn with_base_url(
        model: impl Into<String>,
        dimensions: usize,
        base_url: &str,
        api_key: &str,
    ) -> Self {
        let config = OpenAIConfig::new()
            .with_api_base(base_url)
            .with_api_key(api_key);
        Self {
            client: Client::with_config(config),
            model: model.into(),
            dimensions,
        }
    }

    async fn request(
        &self,
        input: EmbeddingInput,
    ) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(&self.model)
            .input(input)
            .build()
            .map_err(map_openai_error)?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(map_openai_error)?;

        if response.data.is_empty() {
            return Err(ModelError::EmptyResponse);
        }

        // The API may reorder; restore input order by index.
        let mut data = response.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ModelError> {
        let mut vectors = self
            .request(EmbeddingInput::String(text.to_string()))
            .await?;
        vectors.pop().ok_or(ModelError::EmptyResponse)
    }

    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(EmbeddingInput::StringArray(texts.to_vec()))
            .await
    }
}
