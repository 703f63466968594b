//! Keyword text processing.
//!
//! Normalization of free-text model output into a capped keyword list, the
//! word-length heuristic used when no generative capability is available,
//! and the editing rules for a keyword list.

use regex::Regex;
use std::sync::OnceLock;

/// Upper bound on the number of keywords produced by any generation.
pub const MAX_KEYWORDS: usize = 7;

/// Heuristic tokens must be strictly longer than this many characters.
pub const MIN_HEURISTIC_LEN: usize = 4;

fn punctuation_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\s]").expect("static regex"))
}

// ============================================================================
// Parsing
// ============================================================================

/// Split raw model output on comma, semicolon or newline, trim each piece,
/// drop pieces of one character or less, and keep the first seven.
pub fn parse_keyword_output(raw: &str) -> Vec<String> {
    raw.split([',', ';', '\n'])
        .map(|s| s.trim())
        .filter(|s| s.chars().count() > 1)
        .take(MAX_KEYWORDS)
        .map(|s| s.to_string())
        .collect()
}

// ============================================================================
// Heuristic
// ============================================================================

/// Strip punctuation, split on whitespace and keep the first seven tokens
/// longer than four characters, in prompt order.
pub fn heuristic_keywords(prompt: &str) -> Vec<String> {
    let stripped = punctuation_re().replace_all(prompt, "");
    stripped
        .split_whitespace()
        .filter(|w| w.chars().count() > MIN_HEURISTIC_LEN)
        .take(MAX_KEYWORDS)
        .map(|w| w.to_string())
        .collect()
}

// ============================================================================
// Editing
// ============================================================================

/// Append `word` (trimmed) unless it is empty or already present.
/// Returns true when the list changed.
pub fn add_keyword(keywords: &mut Vec<String>, word: &str) -> bool {
    let word = word.trim();
    if word.is_empty() || keywords.iter().any(|k| k == word) {
        return false;
    }
    keywords.push(word.to_string());
    true
}

/// Remove the keyword at `index`. Out-of-range indices are ignored.
/// Returns the removed keyword, if any.
pub fn remove_keyword(keywords: &mut Vec<String>, index: usize) -> Option<String> {
    if index < keywords.len() {
        Some(keywords.remove(index))
    } else {
        None
    }
}
