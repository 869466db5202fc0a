// src/quality.rs
// Deterministic draft validation: slop detection + the heuristic quality score
// the loop gates on. No I/O, no model calls.

use once_cell::sync::OnceCell;
use regex::Regex;

/// Forbidden phrasing that should never appear in published content.
/// Single words match on word boundaries, phrases with flexible whitespace.
pub const AI_SLOP_KEYWORDS: &[&str] = &[
    // Single words
    "delve",
    "unveil",
    "landscape",
    "realm",
    "unlock",
    "leverage",
    "utilize",
    "robust",
    "streamline",
    "cutting-edge",
    "revolutionary",
    "harness",
    "paradigm",
    "synergy",
    "game-changer",
    // Phrases
    "in today's fast-paced world",
    "it's important to note",
    "let's explore",
    "dive deep",
    "best practices",
];

fn slop_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceCell<Vec<(&'static str, Regex)>> = OnceCell::new();
    PATTERNS.get_or_init(|| {
        AI_SLOP_KEYWORDS
            .iter()
            .map(|kw| {
                let escaped = regex::escape(&kw.to_lowercase());
                let pattern = if kw.contains(' ') {
                    // regex::escape leaves spaces alone; widen them here.
                    escaped.replace(' ', r"\s+")
                } else {
                    format!(r"\b{escaped}\b")
                };
                (*kw, Regex::new(&pattern).expect("slop pattern"))
            })
            .collect()
    })
}

/// Scan content for forbidden phrasing. Returns the flag plus the specific
/// terms found, for logging and the critique prompt.
pub fn detect_ai_slop(content: &str) -> (bool, Vec<&'static str>) {
    if content.is_empty() {
        return (false, Vec::new());
    }
    let lower = content.to_lowercase();
    let found: Vec<&'static str> = slop_patterns()
        .iter()
        .filter(|(_, re)| re.is_match(&lower))
        .map(|(kw, _)| *kw)
        .collect();
    (!found.is_empty(), found)
}

/// The loop's authoritative scorer. The production implementation is
/// deterministic; tests substitute scripted sequences.
pub trait DraftScorer: Send + Sync {
    fn score(&self, title: &str, content: &str) -> f64;
}

/// Rubric-based score in [0,1]: penalties for slop, word count outside the
/// target band, missing structure, and missing source links.
#[derive(Debug, Default)]
pub struct HeuristicScorer;

impl DraftScorer for HeuristicScorer {
    fn score(&self, title: &str, content: &str) -> f64 {
        let mut score = 1.0f64;

        let (_, slop_terms) = detect_ai_slop(content);
        score -= (slop_terms.len() as f64 * 0.05).min(0.30);

        let words = content.split_whitespace().count();
        if words < 300 {
            score -= 0.40;
        } else if !(600..=3_000).contains(&words) {
            score -= 0.20;
        }

        if !content.contains("\n## ") && !content.starts_with("## ") {
            score -= 0.10;
        }
        if !content.contains("](http") && !content.contains("http") {
            score -= 0.05;
        }

        let title_words = title.split_whitespace().count();
        if !(3..=12).contains(&title_words) {
            score -= 0.05;
        }

        score.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_single_words_on_boundaries() {
        let (hit, terms) = detect_ai_slop("Let us delve into the topic");
        assert!(hit);
        assert_eq!(terms, vec!["delve"]);
    }

    #[test]
    fn word_boundary_avoids_substring_hits() {
        // "landscapes" must not match the "landscape" keyword.
        let (hit, terms) = detect_ai_slop("painted landscapes of Ontario");
        assert!(!hit, "unexpected terms: {terms:?}");
    }

    #[test]
    fn phrases_match_with_flexible_whitespace() {
        let (hit, terms) = detect_ai_slop("It's important to  note that tolerances drift");
        assert!(hit);
        assert_eq!(terms, vec!["it's important to note"]);
    }

    #[test]
    fn clean_shop_copy_is_clean() {
        let (hit, terms) = detect_ai_slop("Simple plain text about machining 4140 steel");
        assert!(!hit);
        assert!(terms.is_empty());
    }

    #[test]
    fn heuristic_rewards_structured_clean_posts() {
        let body = format!(
            "## Tolerances\n\n{}\n\n## Sources\n\n- [report](https://example.com/a)\n",
            "stable five-axis workholding keeps scrap down. ".repeat(160)
        );
        let score = HeuristicScorer.score("Holding Tenths on a Five-Axis Mill", &body);
        assert!(score >= 0.9, "got {score}");
    }

    #[test]
    fn heuristic_penalizes_short_sloppy_drafts() {
        let body = "We leverage cutting-edge synergy to unlock robust paradigms.";
        let score = HeuristicScorer.score("Post", body);
        assert!(score < 0.5, "got {score}");
    }
}
