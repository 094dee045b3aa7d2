//! Classification of backend rejections of a generation brief.
//!
//! The backend signals an over-long brief only through free-text error
//! messages. Matching them against a fixed phrase table gives callers a
//! distinct, actionable error instead of a generic rejection.

use once_cell::sync::Lazy;

/// Phrases the backend uses when rejecting a brief for length.
pub const PROMPT_TOO_LONG_PHRASES: &[&str] = &[
    "prompt is too long",
    "prompt too long",
    "prompt exceeds",
    "too many characters",
    "too many tokens",
    "maximum context length",
    "exceeds the maximum length",
    "exceeds maximum length",
    "string_above_max_length",
    "input is too long",
];

static LOWERCASED: Lazy<Vec<String>> =
    Lazy::new(|| PROMPT_TOO_LONG_PHRASES.iter().map(|p| p.to_lowercase()).collect());

/// Returns true if `message` reads like a length rejection.
pub fn is_prompt_too_long(message: &str) -> bool {
    let message = message.to_lowercase();
    LOWERCASED.iter().any(|phrase| message.contains(phrase.as_str()))
}
