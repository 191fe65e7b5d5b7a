use std::hash::Hasher;

use twox_hash::XxHash64;

/// Cache key for a normalized text scoped to a language.
pub fn cache_key(normalized: &str, language: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(normalized.as_bytes());
    hasher.write_u8(0x1f);
    hasher.write(language.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key_is_language_scoped() {
        assert_eq!(cache_key("coffee", "en"), cache_key("coffee", "en"));
        assert_ne!(cache_key("coffee", "en"), cache_key("coffee", "th"));
        assert_ne!(cache_key("ab", "c"), cache_key("a", "bc"));
    }
}
