//! Sparse lexical scoring over child texts.
//!
//! A lightweight keyword scorer: log-damped term frequency weighted by
//! first-occurrence position and whole-word matching, normalised into
//! `[0, 1]`. Not BM25; calibrated for 150-char child windows where
//! document-frequency statistics carry little signal.

/// Tokenises a query: whitespace split, lowercased, non-alphanumerics
/// stripped, tokens of length <= 2 dropped.
#[must_use]
pub fn tokenize_query(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .map(|raw| {
            raw.chars()
                .filter(|c| c.is_alphanumeric())
                .collect::<String>()
                .to_lowercase()
        })
        .filter(|token| token.chars().count() > 2)
        .collect()
}

/// Scores `text` against pre-tokenised query tokens.
///
/// Per token: `log(1 + occurrences) · position_weight · exact_match`, where
/// the position weight is 1.5 in the first quarter, 1.2 in the first half,
/// 1.0 otherwise, and whole-word first occurrences earn a 1.3 multiplier.
/// The sum is divided by `2 · |tokens|` and clamped to `[0, 1]`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn score_text(tokens: &[String], text: &str) -> f32 {
    if tokens.is_empty() || text.is_empty() {
        return 0.0;
    }

    let lowered = text.to_lowercase();
    let mut total = 0.0f32;

    for token in tokens {
        let occurrences = lowered.matches(token.as_str()).count();
        if occurrences == 0 {
            continue;
        }

        let first = match lowered.find(token.as_str()) {
            Some(pos) => pos,
            None => continue,
        };

        let frequency = (1.0 + occurrences as f32).ln();
        let position_weight = position_weight(first, lowered.len());
        let exact = if is_whole_word(&lowered, first, token.len()) {
            1.3
        } else {
            1.0
        };

        total += frequency * position_weight * exact;
    }

    let normalised = total / (2.0 * tokens.len() as f32);
    normalised.clamp(0.0, 1.0)
}

#[allow(clippy::cast_precision_loss)]
fn position_weight(first: usize, len: usize) -> f32 {
    if len == 0 {
        return 1.0;
    }
    let ratio = first as f32 / len as f32;
    if ratio < 0.25 {
        1.5
    } else if ratio < 0.5 {
        1.2
    } else {
        1.0
    }
}

/// Whether the occurrence at `start` is bounded by non-alphanumeric
/// characters (text boundaries count as bounds).
fn is_whole_word(text: &str, start: usize, token_len: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric());
    let after_ok = text[start + token_len..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric());
    before_ok && after_ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_tokenize_basic() {
        let tokens = tokenize_query("What is the Singleton pattern?");
        assert_eq!(tokens, vec!["what", "the", "singleton", "pattern"]);
    }

    #[test]
    fn test_tokenize_drops_short_tokens() {
        let tokens = tokenize_query("a an of it singleton");
        assert_eq!(tokens, vec!["singleton"]);
    }

    #[test]
    fn test_tokenize_strips_punctuation() {
        let tokens = tokenize_query("enum-based (approach)!");
        assert_eq!(tokens, vec!["enumbased", "approach"]);
    }

    #[test]
    fn test_score_no_match() {
        let tokens = tokenize_query("missing");
        assert!(score_text(&tokens, "entirely unrelated content").abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_empty_inputs() {
        assert!(score_text(&[], "text").abs() < f32::EPSILON);
        let tokens = tokenize_query("word");
        assert!(score_text(&tokens, "").abs() < f32::EPSILON);
    }

    #[test]
    fn test_score_in_unit_range() {
        let tokens = tokenize_query("singleton singleton pattern");
        let text = "singleton pattern singleton pattern singleton pattern";
        let score = score_text(&tokens, text);
        assert!((0.0..=1.0).contains(&score));
        assert!(score > 0.0);
    }

    #[test]
    fn test_early_occurrence_scores_higher() {
        let tokens = tokenize_query("singleton");
        let early = score_text(&tokens, "singleton appears at the very start of this child text");
        let late = score_text(&tokens, "this child text ends with the word appearing singleton");
        assert!(early > late);
    }

    #[test]
    fn test_whole_word_scores_higher() {
        let tokens = tokenize_query("single");
        let whole = score_text(&tokens, "a single occurrence sits here in the middle somewhere");
        let partial = score_text(&tokens, "a singleton occurrence sits here in the middle spot");
        assert!(whole > partial);
    }

    #[test]
    fn test_repeated_term_scores_higher() {
        let tokens = tokenize_query("pattern");
        let once = score_text(&tokens, "zzz zzz zzz zzz zzz zzz pattern zzz zzz zzz zzz zzz");
        let thrice = score_text(&tokens, "zzz zzz zzz zzz pattern zzz pattern zzz pattern zzz");
        assert!(thrice > once);
    }

    #[test_case(0, 100, 1.5 ; "first quarter")]
    #[test_case(30, 100, 1.2 ; "first half")]
    #[test_case(80, 100, 1.0 ; "tail")]
    fn test_position_weight(first: usize, len: usize, expected: f32) {
        assert!((position_weight(first, len) - expected).abs() < f32::EPSILON);
    }

    #[test]
    fn test_is_whole_word() {
        assert!(is_whole_word("the word here", 4, 4));
        assert!(!is_whole_word("keywords", 0, 3));
        assert!(is_whole_word("word", 0, 4));
        assert!(is_whole_word("(word)", 1, 4));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn score_always_in_unit_range(query in "\\PC{0,40}", text in "\\PC{0,300}") {
                let tokens = tokenize_query(&query);
                let score = score_text(&tokens, &text);
                prop_assert!((0.0..=1.0).contains(&score));
            }

            #[test]
            fn tokens_are_lowercase_and_long(query in "\\PC{0,60}") {
                for token in tokenize_query(&query) {
                    prop_assert!(token.chars().count() > 2);
                    prop_assert_eq!(token.to_lowercase(), token.clone());
                    prop_assert!(token.chars().all(char::is_alphanumeric));
                }
            }
        }
    }
}
