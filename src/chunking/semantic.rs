//! Embedding-guided semantic chunker.
//!
//! Walks adjacent sentence pairs and records a breakpoint where cosine
//! similarity drops below threshold with enough text accumulated. Chunk
//! materialisation then applies three refinements in order: code-bearing
//! chunks pass through unsplit, undersized chunks merge forward, and
//! oversized chunks split at a scored position snapped to a sentence
//! boundary.

use regex::Regex;

use crate::chunking::{
    ChunkedDocument, ChunkerConfig, StructureScanner, child_windows, recursive_split_default,
    split_sentences,
};
use crate::core::Segment;
use crate::embedding::{Embedder, EmbeddingCache, cosine_similarity};
use crate::error::{ChunkingError, Result};

/// Substrings that mark a chunk as code-bearing.
const CODE_SIGNALS: [&str; 6] = [
    "public class",
    "private ",
    "public ",
    "@Override",
    "//",
    "/*",
];

/// Chars a split scorer looks around for paragraph breaks.
const PARAGRAPH_LOOKAROUND: usize = 10;

/// Distance after an `Item N` header within which splitting is penalised.
const ITEM_HEADER_SHADOW: usize = 100;

/// Semantic chunker producing the Parent/Child hierarchy.
pub struct SemanticChunker {
    config: ChunkerConfig,
    scanner: StructureScanner,
    brace_pair: Regex,
}

impl SemanticChunker {
    /// Creates a chunker with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::Regex`] if pattern compilation fails.
    pub fn new() -> Result<Self> {
        Self::with_config(ChunkerConfig::default())
    }

    /// Creates a chunker with a custom configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::Regex`] if pattern compilation fails, or
    /// [`ChunkingError::InvalidConfig`] for inconsistent thresholds.
    pub fn with_config(config: ChunkerConfig) -> Result<Self> {
        if config.max_chunk_size == 0 || config.min_chunk_size > config.max_chunk_size {
            return Err(ChunkingError::InvalidConfig {
                reason: format!(
                    "min chunk size {} must not exceed max chunk size {}",
                    config.min_chunk_size, config.max_chunk_size
                ),
            }
            .into());
        }
        Ok(Self {
            config,
            scanner: StructureScanner::new()?,
            brace_pair: Regex::new(r"\{[^}]*\}").map_err(ChunkingError::from)?,
        })
    }

    /// Chunks a full document into parents and children.
    ///
    /// Sentence embeddings drive breakpoint detection; when sentence
    /// splitting yields nothing useful the chunker falls back to naive
    /// recursive splitting rather than failing.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::EmptyDocument`] for empty input and
    /// propagates embedder failures.
    pub async fn chunk(&self, text: &str, embedder: &dyn Embedder) -> Result<ChunkedDocument> {
        if text.trim().is_empty() {
            return Err(ChunkingError::EmptyDocument.into());
        }

        let sentences = split_sentences(text)?;
        // A single undivided fragment on a long document means sentence
        // detection found no structure to work with.
        let unstructured =
            sentences.len() < 2 && text.chars().count() > crate::chunking::FALLBACK_CHUNK_SIZE;
        let parent_texts = if sentences.is_empty() || unstructured {
            tracing::warn!("no usable sentences detected; falling back to recursive splitting");
            recursive_split_default(text)
        } else {
            let embeddings = self.embed_sentences(&sentences, embedder).await?;
            let breakpoints = self.find_breakpoints(&sentences, &embeddings);
            self.materialise(&sentences, &breakpoints)
        };

        let mut parents = Vec::with_capacity(parent_texts.len());
        let mut children = Vec::new();
        for text in parent_texts {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parent = Segment::parent(parents.len(), trimmed.to_string());
            parent.structure = self.scanner.scan(&parent.text);
            children.extend(child_windows(&parent));
            parents.push(parent);
        }

        tracing::debug!(
            parents = parents.len(),
            children = children.len(),
            "document chunked"
        );

        Ok(ChunkedDocument { parents, children })
    }

    /// Embeds every sentence longer than the configured minimum; shorter
    /// sentences get no embedding and never trigger a breakpoint.
    async fn embed_sentences(
        &self,
        sentences: &[String],
        embedder: &dyn Embedder,
    ) -> Result<Vec<Option<Vec<f32>>>> {
        let mut cache = EmbeddingCache::new(embedder);
        let mut embeddings = Vec::with_capacity(sentences.len());
        for sentence in sentences {
            if sentence.chars().count() > self.config.min_sentence_len {
                embeddings.push(Some(cache.get(sentence).await?));
            } else {
                embeddings.push(None);
            }
        }
        tracing::debug!(
            sentences = sentences.len(),
            cache_hits = cache.hits(),
            "sentence embeddings computed"
        );
        Ok(embeddings)
    }

    /// Walks adjacent sentence pairs and records breakpoint indices
    /// ("break after sentence i"). The final sentence index is always a
    /// terminal breakpoint.
    fn find_breakpoints(
        &self,
        sentences: &[String],
        embeddings: &[Option<Vec<f32>>],
    ) -> Vec<usize> {
        let mut breakpoints = Vec::new();
        let mut accumulated = 0usize;

        for i in 0..sentences.len().saturating_sub(1) {
            accumulated += sentences[i].chars().count() + 1;

            let (Some(a), Some(b)) = (&embeddings[i], &embeddings[i + 1]) else {
                continue;
            };
            let sim = cosine_similarity(a, b);

            let soft = sim < self.config.breakpoint_threshold
                && accumulated >= self.config.min_chunk_size;
            let hard = sim < self.config.hard_breakpoint_threshold
                && accumulated >= self.config.hard_min_chunk_size;

            if soft || hard {
                breakpoints.push(i);
                accumulated = 0;
            }
        }

        breakpoints.push(sentences.len() - 1);
        breakpoints
    }

    /// Materialises parent texts between breakpoints, applying the
    /// code-integrity, merge-forward, and long-split refinements in order.
    fn materialise(&self, sentences: &[String], breakpoints: &[usize]) -> Vec<String> {
        let max = self.config.max_chunk_size;
        let mut parents: Vec<String> = Vec::new();
        let mut buffer = String::new();
        let mut buffer_sentences = 0usize;
        let mut start = 0usize;

        for &bp in breakpoints {
            if bp < start {
                continue;
            }
            let mut current = std::mem::take(&mut buffer);
            let mut sentence_count = std::mem::take(&mut buffer_sentences);
            for sentence in &sentences[start..=bp] {
                if !current.is_empty() {
                    current.push(' ');
                }
                current.push_str(sentence);
                sentence_count += 1;
            }
            start = bp + 1;

            let len = current.chars().count();

            // Code chunks pass through unsplit to preserve block integrity.
            if self.has_code_signal(&current) && len < max * 3 / 2 {
                parents.push(current);
                continue;
            }

            // Too small to stand alone: hold and merge into the next chunk.
            if len < self.config.min_chunk_size && sentence_count < 3 {
                buffer = current;
                buffer_sentences = sentence_count;
                continue;
            }

            // Too large: split once at a scored position; the remainder
            // becomes the merge-forward buffer.
            if len > max {
                let (head, tail) = self.split_long(&current);
                parents.push(head);
                buffer_sentences = count_sentences(&tail);
                buffer = tail;
                continue;
            }

            parents.push(current);
        }

        // Drain the trailing buffer, splitting oversized remainders first.
        while buffer.chars().count() > max {
            let (head, tail) = self.split_long(&buffer);
            if head.is_empty() || tail.is_empty() {
                break;
            }
            parents.push(head);
            buffer = tail;
        }
        if !buffer.is_empty() {
            match parents.last_mut() {
                Some(last) if last.chars().count() + 1 + buffer.chars().count() <= max => {
                    last.push(' ');
                    last.push_str(&buffer);
                }
                _ => parents.push(buffer),
            }
        }

        parents
    }

    fn has_code_signal(&self, text: &str) -> bool {
        CODE_SIGNALS.iter().any(|signal| text.contains(signal)) || self.brace_pair.is_match(text)
    }

    /// Splits an oversized chunk. Every position in
    /// `[max(600, len/3), min(1000, 2·len/3)]` is scored; if the best score
    /// clears 0.5 the split snaps to the nearest sentence boundary,
    /// otherwise the sentence boundary nearest the midpoint wins.
    fn split_long(&self, text: &str) -> (String, String) {
        let chars: Vec<char> = text.chars().collect();
        let len = chars.len();

        let lo = (len / 3).max(600).min(len.saturating_sub(1));
        let hi = (2 * len / 3).min(1000).max(lo);

        let item_offsets = self.item_header_char_offsets(text, &chars);
        let sentence_bounds = sentence_boundaries(&chars);

        let mut best_pos = len / 2;
        let mut best_score = f32::MIN;
        for p in lo..=hi {
            let score = score_split_position(&chars, p, &item_offsets);
            if score > best_score {
                best_score = score;
                best_pos = p;
            }
        }

        let split_at = if best_score > 0.5 {
            nearest_boundary(&sentence_bounds, best_pos).unwrap_or(best_pos)
        } else {
            nearest_boundary(&sentence_bounds, len / 2).unwrap_or(best_pos)
        };
        let split_at = split_at.clamp(1, len.saturating_sub(1));

        let head: String = chars[..split_at].iter().collect();
        let tail: String = chars[split_at..].iter().collect();
        (head.trim().to_string(), tail.trim().to_string())
    }

    /// Char offsets of `Item N` headers, for the split-shadow penalty.
    fn item_header_char_offsets(&self, text: &str, chars: &[char]) -> Vec<usize> {
        let byte_offsets = self.scanner.item_header_offsets(text);
        if byte_offsets.is_empty() {
            return Vec::new();
        }
        // Map byte offsets to char positions in one forward pass.
        let mut result = Vec::with_capacity(byte_offsets.len());
        let mut byte_pos = 0usize;
        let mut iter = byte_offsets.iter().peekable();
        for (char_pos, c) in chars.iter().enumerate() {
            while let Some(&&target) = iter.peek() {
                if target <= byte_pos {
                    result.push(char_pos);
                    iter.next();
                } else {
                    break;
                }
            }
            byte_pos += c.len_utf8();
        }
        result
    }
}

/// Scores a candidate split before char position `p`.
fn score_split_position(chars: &[char], p: usize, item_offsets: &[usize]) -> f32 {
    let len = chars.len();
    let mut score = 0.0f32;

    // Paragraph boundary within +-10 chars.
    let from = p.saturating_sub(PARAGRAPH_LOOKAROUND);
    let to = (p + PARAGRAPH_LOOKAROUND).min(len.saturating_sub(1));
    if (from..to).any(|j| chars[j] == '\n' && chars.get(j + 1) == Some(&'\n')) {
        score += 0.4;
    }

    if p > 0 {
        let prev = chars[p - 1];
        // Code-block closer: `}`/`;`, or newline not opening a new block.
        if prev == '}' || prev == ';' || (prev == '\n' && chars.get(p) != Some(&'{')) {
            score += 0.3;
        }
        if matches!(prev, '.' | '!' | '?') {
            score += 0.2;
        }
    }

    // Penalise splitting in the shadow of an Item header.
    if item_offsets
        .iter()
        .any(|&h| p >= h && p - h <= ITEM_HEADER_SHADOW)
    {
        score -= 0.5;
    }

    score
}

/// Positions after a sentence terminator followed by whitespace or
/// end-of-text.
fn sentence_boundaries(chars: &[char]) -> Vec<usize> {
    let len = chars.len();
    let mut bounds = Vec::new();
    for (i, c) in chars.iter().enumerate() {
        if matches!(c, '.' | '!' | '?') {
            let next = chars.get(i + 1);
            if next.is_none() || next.is_some_and(|n| n.is_whitespace()) {
                let q = i + 1;
                if q > 0 && q < len {
                    bounds.push(q);
                }
            }
        }
    }
    bounds
}

/// Nearest boundary to `target`, if any exist.
fn nearest_boundary(bounds: &[usize], target: usize) -> Option<usize> {
    bounds
        .iter()
        .copied()
        .min_by_key(|&b| b.abs_diff(target))
}

/// Approximate sentence count of a carried remainder.
fn count_sentences(text: &str) -> usize {
    let chars: Vec<char> = text.chars().collect();
    sentence_boundaries(&chars).len().max(1)
}
