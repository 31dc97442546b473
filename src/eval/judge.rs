//! Generator-as-judge scoring for faithfulness and relevance.
//!
//! A dedicated system prompt asks for a JSON verdict. Malformed verdicts
//! score zero rather than failing the batch; endpoint errors (notably rate
//! limits) propagate so the batch driver can pause.

use std::fmt::Write;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::ModelError;
use crate::generation::{ChatMessage, Generator};

/// System prompt for the judge call.
pub const JUDGE_SYSTEM_PROMPT: &str = "You are an impartial evaluation judge for a book \
question-answering system. Given a question, the system's answer, and the source passages the \
answer was based on, score two dimensions in [0, 1]: faithfulness (is every claim in the answer \
supported by the sources?) and relevance (does the answer address the question?). Respond with \
ONLY a JSON object of the form {\"faithfulness\": <number>, \"relevance\": <number>, \
\"reasoning\": \"<one short sentence>\"} and no other text.";

/// A parsed and clamped judge verdict.
#[derive(Debug, Clone, Deserialize)]
pub struct JudgeVerdict {
    /// Whether the answer is supported by the sources, in `[0, 1]`.
    pub faithfulness: f32,
    /// Whether the answer addresses the question, in `[0, 1]`.
    pub relevance: f32,
    /// The judge's one-line justification.
    #[serde(default)]
    pub reasoning: String,
}

impl JudgeVerdict {
    /// The all-zero verdict used when the judge output cannot be parsed.
    #[must_use]
    pub fn zero() -> Self {
        Self {
            faithfulness: 0.0,
            relevance: 0.0,
            reasoning: "judge output could not be parsed".to_string(),
        }
    }

    fn clamped(mut self) -> Self {
        self.faithfulness = self.faithfulness.clamp(0.0, 1.0);
        self.relevance = self.relevance.clamp(0.0, 1.0);
        self
    }
}

/// Extracts and parses the first JSON object in `raw`.
///
/// Judges occasionally wrap the verdict in prose or code fences; scanning
/// for the outermost braces tolerates both.
#[must_use]
pub fn parse_verdict(raw: &str) -> Option<JudgeVerdict> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<JudgeVerdict>(&raw[start..=end])
        .ok()
        .map(JudgeVerdict::clamped)
}

/// Runs the judge over one answer.
///
/// # Errors
///
/// Propagates [`ModelError`] from the endpoint (rate limits pause the
/// batch); parse failures return the zero verdict instead of erroring.
pub async fn judge_answer(
    generator: &Arc<dyn Generator>,
    question: &str,
    answer: &str,
    sources: &[String],
) -> std::result::Result<JudgeVerdict, ModelError> {
    let mut user = format!("Question:\n{question}\n\nAnswer:\n{answer}\n\nSources:\n");
    for (i, source) in sources.iter().enumerate() {
        let _ = write!(user, "[{}] {source}\n\n", i + 1);
    }

    let messages = [
        ChatMessage::system(JUDGE_SYSTEM_PROMPT),
        ChatMessage::user(user),
    ];
    let raw = generator.call(&messages).await?;

    Ok(parse_verdict(&raw).unwrap_or_else(|| {
        tracing::warn!("judge returned unparseable verdict; scoring zero");
        JudgeVerdict::zero()
    }))
}
