use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Outcome of comparing a transcript against the expected script. The token
/// lists are in first-seen order for display; scoring treats them as sets.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScoreResult {
    /// Integer score in [0,100].
    pub score: u8,
    pub matched: Vec<String>,
    pub extra: Vec<String>,
    pub missed: Vec<String>,
}

/// Lower-case, whitespace-split, punctuation-trimmed unique tokens of a
/// string, in first-seen order.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for raw in text.split_whitespace() {
        let token = raw
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        if token.is_empty() {
            continue;
        }
        if seen.insert(token.clone()) {
            tokens.push(token);
        }
    }
    tokens
}

/// Score a transcript against the expected script.
///
/// Set-based: reordering words changes nothing as long as the token sets
/// stay the same. An empty expected script scores 0 outright. Otherwise the
/// match ratio over the expected set is scaled to 100, docked 2 points per
/// extra spoken token, clamped to [0,100], and rounded half-up.
pub fn score_transcript(transcript: &str, expected_script: &str) -> ScoreResult {
    let expected = tokenize(expected_script);
    let transcribed = tokenize(transcript);

    let expected_set: HashSet<&String> = expected.iter().collect();
    let transcribed_set: HashSet<&String> = transcribed.iter().collect();

    let matched: Vec<String> = expected
        .iter()
        .filter(|t| transcribed_set.contains(*t))
        .cloned()
        .collect();
    let missed: Vec<String> = expected
        .iter()
        .filter(|t| !transcribed_set.contains(*t))
        .cloned()
        .collect();
    let extra: Vec<String> = transcribed
        .iter()
        .filter(|t| !expected_set.contains(*t))
        .cloned()
        .collect();

    let score = if expected.is_empty() {
        0
    } else {
        let match_ratio = matched.len() as f64 / expected.len() as f64;
        let raw = match_ratio * 100.0 - 2.0 * extra.len() as f64;
        // round half-up after clamping
        (raw.clamp(0.0, 100.0) + 0.5).floor() as u8
    };

    ScoreResult {
        score,
        matched,
        extra,
        missed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_strips_punctuation() {
        assert_eq!(
            tokenize("Hello, World! It's fine."),
            vec!["hello", "world", "it's", "fine"]
        );
    }

    #[test]
    fn tokenize_deduplicates_keeping_first_seen_order() {
        assert_eq!(tokenize("the cat and the dog"), vec!["the", "cat", "and", "dog"]);
    }

    #[test]
    fn tokenize_drops_punctuation_only_tokens() {
        assert_eq!(tokenize("wait - no ... go"), vec!["wait", "no", "go"]);
    }

    #[test]
    fn perfect_recall_with_extras_docks_two_points_each() {
        let result = score_transcript(
            "Hello world this is a test with some extra words",
            "Hello world this is a test",
        );
        assert_eq!(result.matched.len(), 6);
        assert_eq!(result.extra.len(), 4);
        assert!(result.missed.is_empty());
        assert_eq!(result.score, 92);
    }

    #[test]
    fn empty_expected_scores_zero() {
        let result = score_transcript("anything", "");
        assert_eq!(result.score, 0);
        assert_eq!(result.extra, vec!["anything"]);
        assert!(result.matched.is_empty());
        assert!(result.missed.is_empty());
    }

    #[test]
    fn empty_transcript_scores_zero_with_all_missed() {
        let result = score_transcript("", "one two three");
        assert_eq!(result.score, 0);
        assert_eq!(result.missed, vec!["one", "two", "three"]);
    }

    #[test]
    fn exact_match_scores_one_hundred() {
        let result = score_transcript("quick brown fox", "Quick brown FOX");
        assert_eq!(result.score, 100);
        assert!(result.extra.is_empty());
        assert!(result.missed.is_empty());
    }

    #[test]
    fn score_is_order_independent() {
        let a = score_transcript("fox brown quick", "quick brown fox");
        let b = score_transcript("quick brown fox", "quick brown fox");
        assert_eq!(a.score, b.score);
        assert_eq!(a.score, 100);
    }

    #[test]
    fn many_extras_clamp_at_zero() {
        let extras: String = (0..60).map(|i| format!("extra{i} ")).collect();
        let result = score_transcript(&extras, "hello");
        assert_eq!(result.score, 0);
    }

    #[test]
    fn partial_match_rounds_half_up() {
        // 2 of 3 matched: 66.666 -> rounds to 67.
        let result = score_transcript("alpha beta", "alpha beta gamma");
        assert_eq!(result.score, 67);
        assert_eq!(result.missed, vec!["gamma"]);
    }

    #[test]
    fn score_stays_within_bounds() {
        for transcript in ["", "a", "a b c", "x y z w"] {
            for expected in ["", "a b", "a b c d e"] {
                let result = score_transcript(transcript, expected);
                assert!(result.score <= 100);
            }
        }
    }
}
