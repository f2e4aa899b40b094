use std::sync::LazyLock;

use regex::Regex;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Collapses every run of whitespace into a single space and trims the ends.
pub fn collapse_whitespace(input: &str) -> String {
    WHITESPACE.replace_all(input, " ").trim().to_string()
}

/// Cuts `input` to at most `max_chars` characters.
/// Counts chars, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_chars(input: &str, max_chars: usize) -> &str {
    match input.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &input[..byte_idx],
        None => input,
    }
}
