// src/services/sanitize.rs
//! Cleans free-text values before they are bound into `ILIKE` patterns.
//!
//! This only keeps pattern clauses well-formed. Values are still bound as
//! query parameters; nothing here is a substitute for that.

/// Maximum length (in characters) of any sanitized value
pub const MAX_INPUT_LENGTH: usize = 100;

/// Characters with meaning in `LIKE` patterns or quoting
const STRIPPED_CHARS: [char; 6] = ['%', '_', '\'', '"', '\\', '`'];

/// Returns `None` for missing or effectively-empty input, otherwise the
/// trimmed value with pattern metacharacters removed, capped at
/// [`MAX_INPUT_LENGTH`] characters.
pub fn sanitize_input(input: Option<&str>) -> Option<String> {
    let raw = input?;

    let stripped: String = raw
        .chars()
        .filter(|c| !STRIPPED_CHARS.contains(c))
        .collect();

    let truncated: String = stripped.trim().chars().take(MAX_INPUT_LENGTH).collect();
    // Truncation can leave trailing whitespace behind
    let cleaned = truncated.trim_end();

    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_string())
    }
}

/// Wraps a sanitized value for a case-insensitive substring match
pub fn contains_pattern(value: &str) -> String {
    format!("%{}%", value)
}
