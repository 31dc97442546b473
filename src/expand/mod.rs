//! Query expansion: language normalisation, step-back abstraction, and
//! hypothetical-document (HyDE) generation.
//!
//! Every generator call here is opportunistic. A failed translation falls
//! back to the raw query, a failed step-back skips the dual branch, and a
//! failed HyDE falls back to the query itself; only cancellation, auth
//! failures, and rate limits abort the expansion.

use std::sync::Arc;

use crate::config::RetrievalOptions;
use crate::core::RequestContext;
use crate::error::ModelError;
use crate::generation::{ChatMessage, Generator, strip_quotes};

/// Translation instruction: English search keywords only.
const TRANSLATE_SYSTEM_PROMPT: &str = "You are a search-query translator. Translate the user's \
question into English search keywords suitable for retrieving passages from a technical \
programming book. Return only the translated query text with no quotes, labels, or extra text.";

/// Step-back instruction: one more-abstract sibling question.
const STEP_BACK_SYSTEM_PROMPT: &str = "You are a query analyst. Given a specific technical \
question, produce one higher-level conceptual question about the same topic, suitable for \
retrieving background passages. Return only the question, nothing else.";

/// HyDE instruction: a short plausible answer in the book's voice.
const HYDE_SYSTEM_PROMPT: &str = "You are writing in the style of an authoritative book on \
software engineering best practices. Write a 2-3 sentence technical answer to the question as \
it might appear in that book. Return only the answer text, without quotes or preamble.";

/// Derived queries produced from one user query.
#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    /// The raw user query.
    pub original: String,
    /// Language-normalised query (`Q_en`).
    pub english: String,
    /// Step-back sibling question (`Q_sb`), when enabled and successful.
    pub step_back: Option<String>,
    /// Hypothetical document for `Q_en` (falls back to `Q_en` itself).
    pub hyde_english: String,
    /// Hypothetical document for `Q_sb`.
    pub hyde_step_back: Option<String>,
    /// Whether a translation call was made.
    pub translated: bool,
}

/// Expands user queries through the generator.
pub struct QueryExpander {
    generator: Arc<dyn Generator>,
}

impl QueryExpander {
    /// Creates an expander over `generator`.
    #[must_use]
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self { generator }
    }

    /// Produces the derived queries for `query` under `options`.
    ///
    /// # Errors
    ///
    /// Cancellation, authentication failures, and rate limits abort
    /// expansion; every other generator failure degrades to a fallback.
    pub async fn expand(
        &self,
        ctx: &RequestContext,
        query: &str,
        options: &RetrievalOptions,
    ) -> std::result::Result<ExpandedQuery, ModelError> {
        ctx.ensure_active()?;

        let (english, translated) = self.normalise_language(ctx, query).await?;

        let step_back = if options.stepback {
            self.step_back(ctx, &english).await?
        } else {
            None
        };

        let hyde_english = if options.hyde {
            self.hypothetical(ctx, &english).await?
        } else {
            english.clone()
        };

        let hyde_step_back = match (&step_back, options.hyde) {
            (Some(sb), true) => Some(self.hypothetical(ctx, sb).await?),
            (Some(sb), false) => Some(sb.clone()),
            (None, _) => None,
        };

        Ok(ExpandedQuery {
            original: query.to_string(),
            english,
            step_back,
            hyde_english,
            hyde_step_back,
            translated,
        })
    }

    /// Detects the dominant script and translates non-English queries.
    async fn normalise_language(
        &self,
        ctx: &RequestContext,
        query: &str,
    ) -> std::result::Result<(String, bool), ModelError> {
        if is_dominantly_latin(query) {
            return Ok((query.to_string(), false));
        }

        ctx.ensure_active()?;
        let messages = [
            ChatMessage::system(TRANSLATE_SYSTEM_PROMPT),
            ChatMessage::user(query),
        ];
        match self.generator.call(&messages).await {
            Ok(raw) => {
                let cleaned = strip_quotes(&raw).to_string();
                if cleaned.is_empty() {
                    tracing::warn!("translation returned empty text; using original query");
                    Ok((query.to_string(), true))
                } else {
                    Ok((cleaned, true))
                }
            }
            Err(err) if err.is_fatal() || err.is_rate_limited() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "translation failed; using original query");
                Ok((query.to_string(), true))
            }
        }
    }

    /// Derives the step-back question, or `None` on failure.
    async fn step_back(
        &self,
        ctx: &RequestContext,
        english: &str,
    ) -> std::result::Result<Option<String>, ModelError> {
        ctx.ensure_active()?;
        let messages = [
            ChatMessage::system(STEP_BACK_SYSTEM_PROMPT),
            ChatMessage::user(english),
        ];
        match self.generator.call(&messages).await {
            Ok(raw) => {
                let cleaned = strip_quotes(&raw).to_string();
                Ok((!cleaned.is_empty()).then_some(cleaned))
            }
            Err(err) if err.is_fatal() || err.is_rate_limited() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "step-back generation failed; skipping dual branch");
                Ok(None)
            }
        }
    }

    /// Generates a hypothetical document for `query`, falling back to the
    /// query itself.
    async fn hypothetical(
        &self,
        ctx: &RequestContext,
        query: &str,
    ) -> std::result::Result<String, ModelError> {
        ctx.ensure_active()?;
        let messages = [
            ChatMessage::system(HYDE_SYSTEM_PROMPT),
            ChatMessage::user(query),
        ];
        match self.generator.call(&messages).await {
            Ok(raw) => {
                let cleaned = strip_quotes(&raw).to_string();
                if cleaned.is_empty() {
                    Ok(query.to_string())
                } else {
                    Ok(cleaned)
                }
            }
            Err(err) if err.is_fatal() || err.is_rate_limited() => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "HyDE generation failed; embedding the query directly");
                Ok(query.to_string())
            }
        }
    }
}

/// `true` when Latin letters make up more than half of the letter
/// characters (queries with no letters at all count as English).
#[must_use]
pub fn is_dominantly_latin(text: &str) -> bool {
    let mut letters = 0usize;
    let mut latin = 0usize;
    for c in text.chars() {
        if c.is_alphabetic() {
            letters += 1;
            if c.is_ascii_alphabetic() {
                latin += 1;
            }
        }
    }
    letters == 0 || latin * 2 > letters
}
