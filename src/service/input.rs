//! Input bounding for the write path
//!
//! Long input either gets truncated to a head/tail sample with an explicit
//! elision marker, or rejected outright, per configuration. Lengths are
//! counted in characters, not bytes, so multi-byte text never splits a
//! code point.

use crate::error::{RecallError, Result};
use crate::types::ServiceConfig;

/// Marker inserted between the kept head and tail of truncated text
pub const TRUNCATION_MARKER: &str = "\n...[truncated]...\n";

/// Fraction of the budget kept from the start (lead-in context)
const HEAD_FRACTION: usize = 7;
/// Fraction of the budget kept from the end (trailing conclusion)
const TAIL_FRACTION: usize = 2;

/// Truncate text to roughly `max_length` characters, keeping the first 70%
/// and last 20% of the budget with a marker in between. Already-short input
/// is returned unchanged.
pub fn truncate_text(text: &str, max_length: usize) -> String {
    let char_count = text.chars().count();
    if char_count <= max_length {
        return text.to_string();
    }

    let head = max_length * HEAD_FRACTION / 10;
    let tail = max_length * TAIL_FRACTION / 10;

    let head_part: String = text.chars().take(head).collect();
    let tail_part: String = text.chars().skip(char_count - tail).collect();
    format!("{}{}{}", head_part, TRUNCATION_MARKER, tail_part)
}

/// Outcome of bounding one input text
#[derive(Debug, Clone)]
pub struct BoundedInput {
    pub text: String,
    pub truncated: bool,
    pub original_len: usize,
    pub final_len: usize,
}

/// Apply the configured bound: pass through, truncate, or reject
pub fn bound_input(text: &str, config: &ServiceConfig) -> Result<BoundedInput> {
    let original_len = text.chars().count();
    if original_len <= config.max_input_len {
        return Ok(BoundedInput {
            text: text.to_string(),
            truncated: false,
            original_len,
            final_len: original_len,
        });
    }

    if !config.truncate_long_input {
        tracing::error!(
            len = original_len,
            max = config.max_input_len,
            "input text too long, rejecting"
        );
        return Err(RecallError::InputTooLong {
            len: original_len,
            max: config.max_input_len,
        });
    }

    let truncated = truncate_text(text, config.max_input_len);
    let final_len = truncated.chars().count();
    tracing::warn!(
        original = original_len,
        truncated = final_len,
        max = config.max_input_len,
        "input text truncated"
    );
    Ok(BoundedInput {
        text: truncated,
        truncated: true,
        original_len,
        final_len,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_unchanged() {
        assert_eq!(truncate_text("hello", 100), "hello");
        assert_eq!(truncate_text("", 0), "");
    }

    #[test]
    fn test_long_input_keeps_head_and_tail() {
        let text: String = ('a'..='z').cycle().take(1000).collect();
        let result = truncate_text(&text, 100);

        let head: String = text.chars().take(70).collect();
        let tail: String = text.chars().skip(1000 - 20).collect();
        assert!(result.starts_with(&head));
        assert!(result.ends_with(&tail));
        assert!(result.contains(TRUNCATION_MARKER));
        assert!(result.chars().count() <= 100 + TRUNCATION_MARKER.chars().count());
    }

    #[test]
    fn test_multibyte_input_never_panics() {
        let text = "日本語のテキスト".repeat(500);
        let result = truncate_text(&text, 100);
        assert!(result.contains(TRUNCATION_MARKER));
    }

    #[test]
    fn test_reject_mode() {
        let config = ServiceConfig {
            max_input_len: 10,
            truncate_long_input: false,
            ..Default::default()
        };
        let err = bound_input("a much longer text than allowed", &config).unwrap_err();
        assert!(matches!(
            err,
            crate::error::RecallError::InputTooLong { len: 31, max: 10 }
        ));
    }

    #[test]
    fn test_truncate_mode_reports_lengths() {
        let config = ServiceConfig {
            max_input_len: 10,
            truncate_long_input: true,
            ..Default::default()
        };
        let bounded = bound_input("a much longer text than allowed", &config).unwrap();
        assert!(bounded.truncated);
        assert_eq!(bounded.original_len, 31);
        assert!(bounded.final_len <= 10 + TRUNCATION_MARKER.chars().count());
    }
}
