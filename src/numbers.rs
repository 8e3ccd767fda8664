//! Best-effort extraction of numeric and currency-like tokens.
//!
//! This is a heuristic, not a parser: it recognizes an optional `$`, a digit
//! followed by digits, commas and dots, and an optional magnitude word
//! (`billion`, `million`, `thousand`, `trillion`). Other currency symbols
//! are not recognized.

use std::sync::LazyLock;

use regex::Regex;

/// Maximum number of tokens returned.
pub const MAX_NUMBERS: usize = 3;

/// Returned alone when no token qualifies.
pub const NO_NUMBER_FOUND: &str = "No clear number found";

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$?\d[\d,.]*\s?(?:billion|million|thousand|trillion)?")
        .unwrap_or_else(|e| panic!("invalid number pattern: {e}"))
});

/// Extract up to [`MAX_NUMBERS`] distinct numeric tokens in order of first
/// appearance.
///
/// Bare tokens of one or two characters (`"9"`, `"42"`) are skipped unless
/// they carry a `$`. If nothing qualifies, the result is the single
/// [`NO_NUMBER_FOUND`] sentinel.
///
/// # Examples
///
/// ```
/// use docvec::numbers::{extract_numbers, NO_NUMBER_FOUND};
///
/// assert_eq!(
///     extract_numbers("Revenue was $198.27 billion, up from $51 million."),
///     vec!["$198.27 billion", "$51 million"]
/// );
/// assert_eq!(extract_numbers("no figures here"), vec![NO_NUMBER_FOUND]);
/// ```
pub fn extract_numbers(text: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for m in NUMBER_PATTERN.find_iter(text) {
        let token = m.as_str().trim();
        if token.chars().count() <= 2 && !token.starts_with('$') {
            continue;
        }
        if found.iter().any(|f| f == token) {
            continue;
        }
        found.push(token.to_string());
        if found.len() == MAX_NUMBERS {
            break;
        }
    }

    if found.is_empty() {
        found.push(NO_NUMBER_FOUND.to_string());
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_with_magnitude() {
        assert_eq!(
            extract_numbers("Revenue was $198.27 billion, up from $51 million."),
            vec!["$198.27 billion", "$51 million"]
        );
    }

    #[test]
    fn sentinel_when_nothing_qualifies() {
        assert_eq!(extract_numbers(""), vec![NO_NUMBER_FOUND]);
        assert_eq!(
            extract_numbers("Item 7 of 10 risk factors"),
            vec![NO_NUMBER_FOUND]
        );
    }

    #[test]
    fn short_tokens_need_a_dollar_sign() {
        assert_eq!(extract_numbers("paid $5 for 9 items"), vec!["$5"]);
    }

    #[test]
    fn duplicates_removed_keeping_first_appearance() {
        assert_eq!(
            extract_numbers("$100 then 2023 then $100 again and 2023"),
            vec!["$100", "2023"]
        );
    }

    #[test]
    fn capped_at_three() {
        assert_eq!(
            extract_numbers("100 200 300 400 500"),
            vec!["100", "200", "300"]
        );
    }

    #[test]
    fn magnitude_is_case_insensitive() {
        assert_eq!(
            extract_numbers("about 200 Billion dollars and 3.5 MILLION users"),
            vec!["200 Billion", "3.5 MILLION"]
        );
    }

    #[test]
    fn trailing_punctuation_inside_number_is_kept() {
        // Commas and dots are consumed greedily.
        assert_eq!(extract_numbers("In 2024, sales rose."), vec!["2024,"]);
    }
}
