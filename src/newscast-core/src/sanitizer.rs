//! Speech-safe text cleaning.
//!
//! Generated scripts arrive with markdown emphasis, bullet lists, section
//! labels, web citations and the occasional repeated sentence. None of that
//! should reach the voice synthesizer, so every host segment goes through
//! [`TextSanitizer::sanitize`] first.
//!
//! The fixed mechanics (emphasis, list markers, citations, sentence split)
//! live in this module. The provider-specific heuristics (which labels to
//! strip, which lines look like headings) are a [`SanitizeRules`] value that
//! can be overridden from the `[cleaning]` table of the config file.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PodcastError;

static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());
static LIST_MARKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^[ \t]*[-*][ \t]+").unwrap());
static PAREN_CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*https[^)]*\)").unwrap());
static BRACKET_CITATION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[[^\]]*https[^\]]*\]").unwrap());
static SENTENCE_END_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+").unwrap());
static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

static DEFAULT_SANITIZER: LazyLock<TextSanitizer> = LazyLock::new(|| {
    TextSanitizer::new(SanitizeRules::default()).expect("built-in cleaning rules are valid")
});

/// Tunable heuristics for [`TextSanitizer`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanitizeRules {
    /// Literal labels removed wherever they appear.
    pub structural_tokens: Vec<String>,
    /// A trimmed line starting with any of these is dropped.
    pub skip_line_prefixes: Vec<String>,
    /// A trimmed line matching any of these regexes is dropped.
    pub skip_line_patterns: Vec<String>,
    /// Sentences up to this many characters count as fragments.
    pub min_sentence_len: usize,
    /// Short sentences with at least this many words are still kept.
    pub min_short_sentence_words: usize,
}

impl Default for SanitizeRules {
    fn default() -> Self {
        Self {
            structural_tokens: [
                "HALF 1:",
                "HALF 2:",
                "HOST 1:",
                "HOST 2:",
                "SEGMENT 1:",
                "SEGMENT 2:",
                "SEGMENT 3:",
                "INTRO:",
                "OUTRO:",
                "Transition to Segment 2:",
                "Transition to Segment 3:",
                "===",
                "---",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            skip_line_prefixes: ["**", "===", "---", "#", "-", "*"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_line_patterns: vec![r"^[A-Z\s]+$".to_string(), r"^\*\*[^*]+\*\*$".to_string()],
            min_sentence_len: 10,
            min_short_sentence_words: 2,
        }
    }
}

/// Turns loosely formatted generated text into plain prose for synthesis.
#[derive(Debug, Clone)]
pub struct TextSanitizer {
    rules: SanitizeRules,
    skip_patterns: Vec<Regex>,
}

impl TextSanitizer {
    /// Compile a sanitizer from a rule set.
    ///
    /// Fails only if one of `skip_line_patterns` is not a valid regex.
    pub fn new(rules: SanitizeRules) -> Result<Self, PodcastError> {
        let skip_patterns = rules
            .skip_line_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    PodcastError::Config(format!("Invalid cleaning pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            rules,
            skip_patterns,
        })
    }

    /// Clean `text` for speech synthesis.
    ///
    /// Never fails and is idempotent: removing one artifact can expose
    /// another (a dropped short sentence leaving a `- ` at the front, say),
    /// so the pipeline is re-run until the output stops changing.
    pub fn sanitize(&self, text: &str) -> String {
        let mut current = self.clean_once(text);
        // Once normalized, every further change removes text, so this ends.
        loop {
            let next = self.clean_once(&current);
            if next == current || next.len() >= current.len() {
                return current;
            }
            current = next;
        }
    }

    fn clean_once(&self, text: &str) -> String {
        let text = strip_emphasis(text);
        // Emphasis is already gone here, so "- **Label**: x" arrives as "- Label: x".
        let text = LIST_MARKER_RE.replace_all(&text, "");
        let text = strip_citations(&text);
        let text = self.strip_structural_tokens(text);
        let joined = self.filter_lines(&text);
        let deduped = self.dedup_sentences(&joined);

        WHITESPACE_RE.replace_all(&deduped, " ").trim().to_string()
    }

    /// Removes tokens until none are left, including ones formed by a removal.
    fn strip_structural_tokens(&self, mut text: String) -> String {
        loop {
            let before = text.len();
            for token in &self.rules.structural_tokens {
                if !token.is_empty() {
                    text = text.replace(token.as_str(), "");
                }
            }
            if text.len() == before {
                return text;
            }
        }
    }

    fn filter_lines(&self, text: &str) -> String {
        text.split('\n')
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter(|line| {
                !self
                    .rules
                    .skip_line_prefixes
                    .iter()
                    .any(|prefix| !prefix.is_empty() && line.starts_with(prefix.as_str()))
            })
            .filter(|line| !self.skip_patterns.iter().any(|re| re.is_match(line)))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn dedup_sentences(&self, text: &str) -> String {
        let mut seen = HashSet::new();
        let kept: Vec<&str> = SENTENCE_END_RE
            .split(text)
            .map(str::trim)
            .filter(|sentence| self.is_substantial(sentence))
            .filter(|sentence| seen.insert(normalize_sentence(sentence)))
            .collect();

        if kept.is_empty() {
            return String::new();
        }

        let mut out = kept.join(". ");
        out.push('.');
        out
    }

    /// Filters out the debris of splitting on '.', like "U" and "S" from "U.S.".
    fn is_substantial(&self, sentence: &str) -> bool {
        if sentence.is_empty() {
            return false;
        }
        sentence.chars().count() > self.rules.min_sentence_len
            || sentence.split_whitespace().count() >= self.rules.min_short_sentence_words.max(1)
    }
}

impl Default for TextSanitizer {
    fn default() -> Self {
        DEFAULT_SANITIZER.clone()
    }
}

/// Clean `text` with the built-in rule set.
pub fn sanitize(text: &str) -> String {
    DEFAULT_SANITIZER.sanitize(text)
}

fn strip_emphasis(text: &str) -> String {
    let text = BOLD_RE.replace_all(text, "$1");
    let text = ITALIC_RE.replace_all(&text, "$1");
    text.replace('*', "")
}

fn strip_citations(text: &str) -> String {
    let text = PAREN_CITATION_RE.replace_all(text, "");
    BRACKET_CITATION_RE.replace_all(&text, "").into_owned()
}

fn normalize_sentence(sentence: &str) -> String {
    WHITESPACE_RE
        .replace_all(&sentence.to_lowercase(), " ")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_emphasis() {
        let output = sanitize("This is **bold** and *italic* text.");
        assert_eq!(output, "This is bold and italic text.");
        assert!(!output.contains('*'));
    }

    #[test]
    fn test_sanitize_strips_citations() {
        let output = sanitize(
            "The report is out (see https://example.com). Another claim [https://news.example.org/a] holds.",
        );
        assert!(!output.contains("https"));
        assert_eq!(output, "The report is out. Another claim holds.");
    }

    #[test]
    fn test_sanitize_keeps_parentheses_without_links() {
        let output = sanitize("The Senate (the upper chamber) voted on Tuesday.");
        assert_eq!(output, "The Senate (the upper chamber) voted on Tuesday.");
    }

    #[test]
    fn test_sanitize_dedups_sentences() {
        let output = sanitize("The sky is blue today. The sky is blue today. It rained.");
        let lower = output.to_lowercase();
        assert_eq!(lower.matches("the sky is blue today").count(), 1);
        assert!(lower.contains("it rained"));
    }

    #[test]
    fn test_sanitize_dedup_ignores_case_and_spacing() {
        let output = sanitize("Markets  rallied on Friday! markets rallied on friday? Then they fell hard.");
        assert_eq!(output, "Markets rallied on Friday. Then they fell hard.");
    }

    #[test]
    fn test_sanitize_drops_single_word_fragments() {
        let output = sanitize("Wow. Markets closed higher this week.");
        assert_eq!(output, "Markets closed higher this week.");
    }

    #[test]
    fn test_sanitize_keeps_short_multi_word_sentences() {
        assert_eq!(
            sanitize("I agree. The council met on Tuesday."),
            "I agree. The council met on Tuesday."
        );
        assert_eq!(sanitize("It rained."), "It rained.");
    }

    #[test]
    fn test_sanitize_removes_structural_tokens() {
        let input = "HALF 1:\n\nINTRO: Welcome back to the show everyone.\nTransition to Segment 2: Now for the world news.";
        let output = sanitize(input);
        assert_eq!(output, "Welcome back to the show everyone. Now for the world news.");
    }

    #[test]
    fn test_sanitize_drops_headings_and_rules() {
        let input = "# Episode notes\nBREAKING NEWS\n======\nThe council approved the budget.\n---\n";
        let output = sanitize(input);
        assert_eq!(output, "The council approved the budget.");
    }

    #[test]
    fn test_sanitize_strips_list_markers() {
        let input = "- **Who**: The city council\n- The vote passed narrowly";
        let output = sanitize(input);
        assert_eq!(output, "Who: The city council The vote passed narrowly.");
    }

    #[test]
    fn test_sanitize_joins_lines_with_spaces() {
        let output = sanitize("First line of the story\nsecond line of the story.");
        assert_eq!(output, "First line of the story second line of the story.");
    }

    #[test]
    fn test_sanitize_empty_input() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("   \n\n  "), "");
    }

    #[test]
    fn test_sanitize_without_terminal_punctuation() {
        assert_eq!(
            sanitize("a story with no punctuation at all"),
            "a story with no punctuation at all."
        );
    }

    #[test]
    fn test_sanitize_is_idempotent() {
        let samples = [
            "This is **bold** and *italic* text.",
            "Fact (see https://example.com).",
            "The sky is blue today. The sky is blue today. It rained.",
            "Hi. - what is going on here",
            "Ok. # not a heading after all, it seems",
            "HALHALF 1:F 1: nested markers in this sentence",
            "======\n------\n",
            "SEGMENT 1:\n**Top Story**\nLawmakers met late into the night!!! Nothing was decided?",
            "",
        ];
        for sample in samples {
            let once = sanitize(sample);
            assert_eq!(sanitize(&once), once, "not idempotent for {:?}", sample);
        }
    }

    #[test]
    fn test_deeply_nested_markers_are_removed_in_one_call() {
        let input = format!(
            "{}HALF 1:{} the council approved the budget",
            "HAL".repeat(10),
            "F 1:".repeat(10)
        );
        let once = sanitize(&input);
        assert_eq!(once, "the council approved the budget.");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_custom_rules() {
        let rules = SanitizeRules {
            structural_tokens: vec!["[MUSIC]".to_string()],
            ..SanitizeRules::default()
        };
        let sanitizer = TextSanitizer::new(rules).unwrap();
        assert_eq!(
            sanitizer.sanitize("[MUSIC] Good evening and welcome."),
            "Good evening and welcome."
        );
        // HALF markers are no longer stripped with the custom token list.
        assert!(sanitizer.sanitize("HALF 1: Good evening and welcome.").contains("HALF 1:"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let rules = SanitizeRules {
            skip_line_patterns: vec!["(unclosed".to_string()],
            ..SanitizeRules::default()
        };
        let err = TextSanitizer::new(rules).unwrap_err();
        assert!(matches!(err, PodcastError::Config(_)));
    }
}
