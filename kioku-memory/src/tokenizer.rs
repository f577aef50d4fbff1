use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static TERM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}_-]+").expect("term pattern is valid"));

/// Split text into lowercase terms.
///
/// A term is a maximal run of Unicode letters, digits, `_` or `-`; single
/// character terms are dropped. Documents and queries go through the same
/// function so both sides share one vocabulary.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TERM_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|term| term.chars().count() > 1)
        .map(str::to_string)
        .collect()
}

/// Term frequencies for a token stream.
pub fn count_terms(tokens: Vec<String>) -> HashMap<String, usize> {
    let mut counts = HashMap::new();
    for token in tokens {
        *counts.entry(token).or_insert(0) += 1;
    }
    counts
}
