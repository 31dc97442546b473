//! Embedding generation for dense retrieval.
//!
//! The [`Embedder`] trait hides the model endpoint; the crate ships an
//! OpenAI-compatible client ([`OpenAiEmbedder`]) and a deterministic
//! hash-based fallback ([`HashEmbedder`]) for offline use and tests.
//! Embedders must be deterministic for identical input.

mod cache;
mod fallback;
mod openai;

pub use cache::EmbeddingCache;
pub use fallback::HashEmbedder;
pub use openai::OpenAiEmbedder;

use async_trait::async_trait;

use crate::error::ModelError;

/// Default embedding dimensions (matches the text-embedding-3-small family).
///
/// This is the authoritative dimension constant; the index and the fallback
/// embedder both use it.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Trait for embedding generators.
///
/// Implementations must be thread-safe (`Send + Sync`) so a single embedder
/// can serve ingestion and concurrent query expansion.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimensions.
    fn dimensions(&self) -> usize;

    /// Maps a text to a fixed-dimension dense vector.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if the endpoint fails.
    async fn embed(&self, text: &str) -> std::result::Result<Vec<f32>, ModelError>;

    /// Embeds multiple texts. The default implementation embeds
    /// sequentially; implementations may batch.
    ///
    /// # Errors
    ///
    /// Returns a [`ModelError`] if embedding fails for any text.
    async fn embed_batch(
        &self,
        texts: &[String],
    ) -> std::result::Result<Vec<Vec<f32>>, ModelError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Computes cosine similarity between two embedding vectors.
///
/// Returns a value between -1.0 (opposite) and 1.0 (identical), or 0.0 if
/// the vectors differ in length or have zero magnitude.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cosine_similarity_identical() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_opposite() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_different_lengths() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_similarity_zero_vector() {
        let a = vec![0.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_embed_batch_default_impl() {
        let embedder = HashEmbedder::new(64);
        let texts = vec!["hello".to_string(), "world".to_string()];
        let embeddings = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(embeddings.len(), 2);
        for embedding in &embeddings {
            assert_eq!(embedding.len(), 64);
        }
    }
}
