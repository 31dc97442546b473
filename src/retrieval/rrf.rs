//! Reciprocal Rank Fusion (RRF).
//!
//! Combines multiple ranked lists into a single fused ranking.
//! Based on: Cormack, Clarke, Buettcher (2009) - "Reciprocal Rank Fusion
//! outperforms Condorcet and individual Rank Learning Methods"

use std::collections::HashMap;

/// Configuration for the RRF algorithm.
#[derive(Debug, Clone, Copy)]
pub struct RrfConfig {
    /// The k parameter controls how much weight is given to lower-ranked
    /// items. Default is 60, the value recommended in the original paper.
    pub k: u32,
}

impl Default for RrfConfig {
    fn default() -> Self {
        Self { k: 60 }
    }
}

impl RrfConfig {
    /// Creates a new RRF config with the specified k value.
    #[must_use]
    pub const fn new(k: u32) -> Self {
        Self { k }
    }
}

/// Performs Reciprocal Rank Fusion over ranked child-slot lists.
///
/// The RRF score for each item is `Σ 1 / (k + rank + 1)` over the lists
/// containing it, with 0-based ranks. Output is sorted by fused score
/// descending; ties break on the smaller child slot so fusion stays
/// deterministic.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn reciprocal_rank_fusion(ranked_lists: &[&[usize]], config: &RrfConfig) -> Vec<(usize, f32)> {
    let mut scores: HashMap<usize, f32> = HashMap::new();

    for list in ranked_lists {
        for (rank, &child) in list.iter().enumerate() {
            // rank is 0-indexed; add 1 to make it 1-indexed
            let rrf_score = 1.0 / (f64::from(config.k) + rank as f64 + 1.0);
            *scores.entry(child).or_insert(0.0) += rrf_score as f32;
        }
    }

    let mut results: Vec<(usize, f32)> = scores.into_iter().collect();
    results.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });

    results
}
