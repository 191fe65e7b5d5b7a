//! Canonical text keys.
//!
//! `normalize_text` is the only key derivation used for cache entries, store
//! lookups and candidate deduplication, so every layer must go through it.

use once_cell::sync::Lazy;
use regex::Regex;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").expect("valid regex"));

/// Lowercases, strips punctuation and collapses whitespace.
///
/// Word characters are Unicode-aware, so combining marks in scripts such as
/// Thai survive while symbols and punctuation are dropped.
pub fn normalize_text(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let stripped = PUNCTUATION.replace_all(&lowered, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_collapses() {
        assert_eq!(normalize_text("  Coffee   at\tSTARBUCKS \n"), "coffee at starbucks");
    }

    #[test]
    fn test_strips_punctuation() {
        assert_eq!(normalize_text("Uber Trip, #4411!"), "uber trip 4411");
        assert_eq!(normalize_text("7-Eleven"), "7eleven");
        assert_eq!(normalize_text("(.*)+$"), "");
    }

    #[test]
    fn test_keeps_thai_marks() {
        assert_eq!(normalize_text("ร้านอาหาร!"), "ร้านอาหาร");
        assert_eq!(normalize_text("กาแฟ  ดี"), "กาแฟ ดี");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_text("McDonald's -- Drive Thru");
        assert_eq!(normalize_text(&once), once);
        assert_eq!(once, "mcdonalds drive thru");
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   "), "");
    }
}
