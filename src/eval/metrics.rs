//! Intrinsic evaluation metrics.
//!
//! Context precision measures keyword overlap between retrieved sources
//! and the ground-truth source; answer similarity blends keyword Jaccard
//! with normalised Levenshtein distance.

use std::collections::HashSet;

use crate::retrieval::STOPWORDS;

/// Relevance threshold for a retrieved source's precision.
const RELEVANT_PRECISION: f32 = 0.3;

/// Keyword set of a text: alphabetic tokens of length >= 3, lowercased,
/// with stopwords removed.
#[must_use]
pub fn keyword_set(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphabetic())
        .map(str::to_lowercase)
        .filter(|token| token.chars().count() >= 3 && !STOPWORDS.contains(&token.as_str()))
        .collect()
}

/// Per-source precision: fraction of the source's keywords that also occur
/// in the ground-truth source.
#[allow(clippy::cast_precision_loss)]
fn source_precision(source_keywords: &HashSet<String>, truth_keywords: &HashSet<String>) -> f32 {
    if source_keywords.is_empty() {
        return 0.0;
    }
    let shared = source_keywords.intersection(truth_keywords).count();
    shared as f32 / source_keywords.len() as f32
}

/// Context precision over the retrieved sources:
/// `0.5 · (relevant / retrieved) + 0.5 · mean(precision)`, where a source
/// is relevant when its precision exceeds 0.3.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn context_precision(retrieved: &[String], ground_truth_source: &str) -> f32 {
    if retrieved.is_empty() {
        return 0.0;
    }

    let truth = keyword_set(ground_truth_source);
    let precisions: Vec<f32> = retrieved
        .iter()
        .map(|source| source_precision(&keyword_set(source), &truth))
        .collect();

    let relevant = precisions
        .iter()
        .filter(|&&p| p > RELEVANT_PRECISION)
        .count();
    let mean = precisions.iter().sum::<f32>() / precisions.len() as f32;

    0.5 * (relevant as f32 / retrieved.len() as f32) + 0.5 * mean
}

/// Jaccard similarity of two keyword sets.
#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Answer similarity:
/// `0.6 · Jaccard(keywords) + 0.4 · (1 − Levenshtein / max_len)` over the
/// lowercased texts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn answer_similarity(answer: &str, ground_truth: &str) -> f32 {
    let keyword_part = jaccard(&keyword_set(answer), &keyword_set(ground_truth));

    let answer_lc = answer.to_lowercase();
    let truth_lc = ground_truth.to_lowercase();
    let max_len = answer_lc.chars().count().max(truth_lc.chars().count());
    let edit_part = if max_len == 0 {
        1.0
    } else {
        1.0 - strsim::levenshtein(&answer_lc, &truth_lc) as f32 / max_len as f32
    };

    0.6 * keyword_part + 0.4 * edit_part
}
