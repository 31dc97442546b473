//! Feature-weighted reranking of fused candidates.
//!
//! Combines four signals per candidate child:
//! `0.4 · score + 0.3 · keyword coverage + 0.1 · length preference +
//! 0.2 · keyword density`. The length window is calibrated for child-sized
//! segments (reranking happens before small-to-big promotion).

use crate::index::tokenize_query;

/// The standard English stoplist used for keyword coverage and density.
pub const STOPWORDS: [&str; 40] = [
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for", "from",
    "has", "have", "how", "i", "in", "is", "it", "not", "of", "on", "or", "that", "the", "this",
    "to", "was", "what", "when", "where", "which", "who", "why", "will", "with", "you", "your",
];

/// Query tokens with stopwords removed, for rerank scoring.
#[must_use]
pub fn content_tokens(query: &str) -> Vec<String> {
    tokenize_query(query)
        .into_iter()
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Computes the reranked score for one candidate.
///
/// `original_score` is the candidate's score from the previous stage,
/// clamped into `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn rerank_score(tokens: &[String], text: &str, original_score: f32) -> f32 {
    let v = original_score.clamp(0.0, 1.0);
    let k = keyword_coverage(tokens, text);
    let l = length_preference(text.chars().count());
    let d = keyword_density(tokens, text);

    0.4 * v + 0.3 * k + 0.1 * l + 0.2 * d
}

/// Fraction of non-stopword query tokens occurring in the text.
#[allow(clippy::cast_precision_loss)]
fn keyword_coverage(tokens: &[String], text: &str) -> f32 {
    if tokens.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let matched = tokens
        .iter()
        .filter(|token| lowered.contains(token.as_str()))
        .count();
    matched as f32 / tokens.len() as f32
}

/// Length preference peaking in the 100-500 char window.
#[allow(clippy::cast_precision_loss)]
fn length_preference(len: usize) -> f32 {
    if len < 100 {
        len as f32 / 100.0 * 0.5
    } else if len <= 500 {
        1.0
    } else {
        1.0 - ((len - 500) as f32 / 500.0).min(0.5)
    }
}

/// Aggregate per-token occurrence density, halved and clamped to `[0, 1]`.
#[allow(clippy::cast_precision_loss)]
fn keyword_density(tokens: &[String], text: &str) -> f32 {
    if tokens.is_empty() || text.is_empty() {
        return 0.0;
    }
    let lowered = text.to_lowercase();
    let len = lowered.chars().count() as f32;
    let budget = (len / 5.0).max(1.0);

    let total: f32 = tokens
        .iter()
        .map(|token| lowered.matches(token.as_str()).count() as f32 / budget)
        .sum();

    (total / 2.0).min(1.0)
}
