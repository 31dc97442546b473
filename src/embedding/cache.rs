//! Sentence-embedding cache used during ingestion.
//!
//! Semantic chunking embeds every sentence of the document; long books
//! repeat boilerplate sentences (headers, footers, code fences), so the
//! chunker routes its lookups through this cache. Single-writer: it is
//! owned by one ingestion run and never shared across threads.

use std::collections::HashMap;

use crate::embedding::Embedder;
use crate::error::ModelError;

/// Write-once cache from sentence text to its embedding.
pub struct EmbeddingCache<'a> {
    embedder: &'a dyn Embedder,
    entries: HashMap<String, Vec<f32>>,
    hits: usize,
    misses: usize,
}

impl<'a> EmbeddingCache<'a> {
    /// Creates an empty cache over `embedder`.
    #[must_use]
    pub fn new(embedder: &'a dyn Embedder) -> Self {
        Self {
            embedder,
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    /// Returns the embedding for `text`, calling the embedder only on the
    /// first request for a given sentence.
    ///
    /// # Errors
    ///
    /// Propagates embedder failures for uncached sentences.
    pub async fn get(&mut self, text: &str) -> std::result::Result<Vec<f32>, ModelError> {
        if let Some(cached) = self.entries.get(text) {
            self.hits += 1;
            return Ok(cached.clone());
        }
        self.misses += 1;
        let embedding = self.embedder.embed(text).await?;
        self.entries.insert(text.to_string(), embedding.clone());
        Ok(embedding)
    }

    /// Number of lookups served from the cache.
    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }

    /// Number of lookups that reached the embedder.
    #[must_use]
    pub const fn misses(&self) -> usize {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;

    #[tokio::test]
    async fn test_cache_serves_repeats() {
        let embedder = HashEmbedder::new(64);
        let mut cache = EmbeddingCache::new(&embedder);

        let first = cache.get("repeated sentence").await.unwrap();
        let second = cache.get("repeated sentence").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
    }

    #[tokio::test]
    async fn test_cache_distinct_entries() {
        let embedder = HashEmbedder::new(64);
        let mut cache = EmbeddingCache::new(&embedder);

        cache.get("one").await.unwrap();
        cache.get("two").await.unwrap();
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 2);
    }
}
