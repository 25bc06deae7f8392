//! Token Estimation
//!
//! Used when a backend does not report usage. The estimate is deliberately
//! simple: roughly four characters per token for English text and JSON.

use crate::constants::pricing::CHARS_PER_TOKEN;

use super::provider::TokenUsage;

/// Estimated token count for a string
pub fn estimate_tokens(text: &str) -> u32 {
    let tokens = text.chars().count().div_ceil(CHARS_PER_TOKEN);
    u32::try_from(tokens).unwrap_or(u32::MAX)
}

/// Usage estimate for one prompt/completion exchange
pub fn estimate_usage(prompt: &[&str], completion: &str) -> TokenUsage {
    let input = prompt
        .iter()
        .map(|part| estimate_tokens(part))
        .fold(0u32, u32::saturating_add);
    TokenUsage::new(input, estimate_tokens(completion))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_based_counting() {
        assert_eq!(estimate_tokens("hello"), 2); // 5 chars = 2 tokens
        assert_eq!(estimate_tokens("hi"), 1);
        assert_eq!(estimate_tokens("hello world"), 3);
        assert_eq!(estimate_tokens(""), 0);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert_eq!(estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_estimate_usage() {
        let usage = estimate_usage(&["system text", "user"], "12345678");
        assert_eq!(usage.input_tokens, 3 + 1);
        assert_eq!(usage.output_tokens, 2);
    }
}
