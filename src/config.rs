//! Pipeline configuration.
//!
//! Ablation flags and tunables are resolved at startup (CLI flags with
//! environment fallbacks) and read-only afterwards. The RRF constant and
//! the semantic breakpoint thresholds are deliberately exposed here rather
//! than baked into the pipeline.

use serde::{Deserialize, Serialize};

/// Default per-stage candidate count for hybrid search.
pub const SEARCH_TOP_K: usize = 20;

/// Maximum passages returned from a retrieval.
pub const FINAL_TOP_K: usize = 5;

/// Retrieval pipeline options.
///
/// All ablation flags default to `true`; disabling one degrades the
/// pipeline to the documented simpler behaviour rather than erroring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalOptions {
    /// Expand queries into hypothetical documents before embedding.
    pub hyde: bool,
    /// Derive and search a step-back (more abstract) sibling query.
    pub stepback: bool,
    /// Apply feature-weighted reranking after fusion.
    pub rerank: bool,
    /// Fuse lexical search with vector search; `false` degrades each
    /// branch to vector-only.
    pub hybrid_search: bool,
    /// Reciprocal-rank-fusion constant.
    pub rrf_k: u32,
    /// Candidates retrieved per search stage.
    pub search_top_k: usize,
    /// Passages returned after promotion.
    pub final_top_k: usize,
}

impl Default for RetrievalOptions {
    fn default() -> Self {
        Self {
            hyde: true,
            stepback: true,
            rerank: true,
            hybrid_search: true,
            rrf_k: 60,
            search_top_k: SEARCH_TOP_K,
            final_top_k: FINAL_TOP_K,
        }
    }
}

impl RetrievalOptions {
    /// Creates options with all features enabled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enables or disables HyDE expansion.
    #[must_use]
    pub const fn with_hyde(mut self, enabled: bool) -> Self {
        self.hyde = enabled;
        self
    }

    /// Enables or disables the step-back branch.
    #[must_use]
    pub const fn with_stepback(mut self, enabled: bool) -> Self {
        self.stepback = enabled;
        self
    }

    /// Enables or disables reranking.
    #[must_use]
    pub const fn with_rerank(mut self, enabled: bool) -> Self {
        self.rerank = enabled;
        self
    }

    /// Enables or disables hybrid (lexical + vector) search.
    #[must_use]
    pub const fn with_hybrid_search(mut self, enabled: bool) -> Self {
        self.hybrid_search = enabled;
        self
    }

    /// Sets the RRF constant.
    #[must_use]
    pub const fn with_rrf_k(mut self, k: u32) -> Self {
        self.rrf_k = k;
        self
    }
}

/// Model endpoint configuration shared by the generator and embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Chat completion model name.
    pub chat_model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Embedding output dimensions.
    pub embedding_dimensions: usize,
    /// Optional custom base URL (local inference servers).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: crate::embedding::DEFAULT_DIMENSIONS,
            api_base: None,
        }
    }
}
