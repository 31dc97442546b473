//! Evaluation reports: Markdown summary and dated JSON history.
//!
//! The Markdown report lists averages plus per-question scores; a JSON
//! snapshot of each run is appended to `evaluation-history/` under a
//! dated filename, written only after all scoring has finished.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;
use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};

/// One scored evaluation record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    /// The test question.
    pub question: String,
    /// Expected answer.
    pub ground_truth: String,
    /// The system's answer.
    pub answer: String,
    /// Judge faithfulness score in `[0, 1]`.
    pub faithfulness: f32,
    /// Judge relevance score in `[0, 1]`.
    pub relevance: f32,
    /// Intrinsic context-precision score in `[0, 1]`.
    #[serde(rename = "contextPrecision")]
    pub context_precision: f32,
    /// Intrinsic answer-similarity score in `[0, 1]`.
    #[serde(rename = "answerSimilarity")]
    pub answer_similarity: f32,
    /// The judge's reasoning.
    pub judge_reasoning: String,
    /// Texts of the retrieved source passages.
    pub sources: Vec<String>,
}

/// Averages across a batch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AverageScores {
    /// Mean faithfulness.
    pub faithfulness: f32,
    /// Mean relevance.
    pub relevance: f32,
    /// Mean context precision.
    #[serde(rename = "contextPrecision")]
    pub context_precision: f32,
    /// Mean answer similarity.
    #[serde(rename = "answerSimilarity")]
    pub answer_similarity: f32,
}

/// One run snapshot as appended to the history file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Run date (`YYYY-MM-DD`).
    pub date: String,
    /// Run timestamp (RFC 3339).
    pub timestamp: String,
    /// Number of questions evaluated.
    #[serde(rename = "numQuestions")]
    pub num_questions: usize,
    /// Score averages.
    #[serde(rename = "averageScores")]
    pub average_scores: AverageScores,
    /// Per-question records.
    pub results: Vec<EvaluationRecord>,
}

/// Computes score averages over `records`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn average_scores(records: &[EvaluationRecord]) -> AverageScores {
    if records.is_empty() {
        return AverageScores::default();
    }
    let n = records.len() as f32;
    AverageScores {
        faithfulness: records.iter().map(|r| r.faithfulness).sum::<f32>() / n,
        relevance: records.iter().map(|r| r.relevance).sum::<f32>() / n,
        context_precision: records.iter().map(|r| r.context_precision).sum::<f32>() / n,
        answer_similarity: records.iter().map(|r| r.answer_similarity).sum::<f32>() / n,
    }
}

/// Renders the Markdown report: an averages table followed by per-question
/// scores.
#[must_use]
pub fn render_markdown(records: &[EvaluationRecord]) -> String {
    let averages = average_scores(records);
    let mut out = String::from("# Evaluation Report\n\n");

    let _ = writeln!(out, "Questions evaluated: {}\n", records.len());
    out.push_str("## Averages\n\n");
    out.push_str("| Metric | Score |\n|---|---|\n");
    let _ = writeln!(out, "| Faithfulness | {:.3} |", averages.faithfulness);
    let _ = writeln!(out, "| Relevance | {:.3} |", averages.relevance);
    let _ = writeln!(out, "| Context Precision | {:.3} |", averages.context_precision);
    let _ = writeln!(out, "| Answer Similarity | {:.3} |", averages.answer_similarity);

    out.push_str("\n## Per-question scores\n\n");
    out.push_str("| # | Question | Faithfulness | Relevance | Context Precision | Answer Similarity |\n");
    out.push_str("|---|---|---|---|---|---|\n");
    for (i, record) in records.iter().enumerate() {
        let _ = writeln!(
            out,
            "| {} | {} | {:.3} | {:.3} | {:.3} | {:.3} |",
            i + 1,
            truncate_cell(&record.question),
            record.faithfulness,
            record.relevance,
            record.context_precision,
            record.answer_similarity,
        );
    }

    out
}

/// Writes the Markdown report atomically.
pub fn write_report(path: &Path, records: &[EvaluationRecord]) -> Result<()> {
    let markdown = render_markdown(records);
    let tmp = path.with_extension("md.tmp");
    std::fs::write(&tmp, markdown).map_err(|e| EvalError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::rename(&tmp, path).map_err(|e| EvalError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(())
}

/// Appends a run snapshot to the dated history file
/// (`evaluation-history/evaluation_YYYYMMDD.json`). Each day's file holds
/// the array of that day's run snapshots.
///
/// # Errors
///
/// Returns [`EvalError::WriteFailed`] on I/O failure.
pub fn append_history(history_dir: &Path, records: &[EvaluationRecord]) -> Result<PathBuf> {
    let now = Local::now();
    let entry = HistoryEntry {
        date: now.format("%Y-%m-%d").to_string(),
        timestamp: now.to_rfc3339(),
        num_questions: records.len(),
        average_scores: average_scores(records),
        results: records.to_vec(),
    };

    std::fs::create_dir_all(history_dir).map_err(|e| EvalError::WriteFailed {
        path: history_dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let path = history_dir.join(format!("evaluation_{}.json", now.format("%Y%m%d")));
    let mut entries: Vec<HistoryEntry> = match std::fs::read_to_string(&path) {
        Ok(existing) => serde_json::from_str(&existing).unwrap_or_default(),
        Err(_) => Vec::new(),
    };
    entries.push(entry);

    let json = serde_json::to_string_pretty(&entries).map_err(EvalError::from)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| EvalError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    std::fs::rename(&tmp, &path).map_err(|e| EvalError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    Ok(path)
}

/// Keeps table cells single-line and bounded.
fn truncate_cell(text: &str) -> String {
    let cleaned: String = text.replace(['\n', '|'], " ");
    let mut chars: Vec<char> = cleaned.chars().collect();
    if chars.len() > 80 {
        chars.truncate(77);
        chars.extend(['.', '.', '.']);
    }
    chars.into_iter().collect()
}
