//! Store-backed matching: exact key, then scored candidates, then fuzzy similarity.

use crate::domain::{
    CategoryMapping, MappingResult, MappingStore, MatchKind, ResultSource, StoreResult,
};
use similar::{DiffOp, TextDiff};

/// Character-level similarity in `0.0..=1.0`: `2 * matched / (len_a + len_b)`.
///
/// Matched characters are the equal runs of a minimal diff, so the ratio is
/// the longest-common-subsequence ratio.
pub fn similarity(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }
    let diff = TextDiff::from_chars(a, b);
    let matched: usize = diff
        .ops()
        .iter()
        .map(|op| match op {
            DiffOp::Equal { len, .. } => *len,
            _ => 0,
        })
        .sum();
    (2 * matched) as f64 / total as f64
}

pub struct MatchingCascade {
    fuzzy_threshold: f64,
    text_search_limit: usize,
}

impl MatchingCascade {
    pub fn new(fuzzy_threshold: f64, text_search_limit: usize) -> Self {
        Self {
            fuzzy_threshold,
            text_search_limit,
        }
    }

    /// Runs every stage in order and returns the first acceptable hit, or an
    /// empty result. Store failures propagate so the caller can retry.
    pub async fn run(
        &self,
        store: &dyn MappingStore,
        normalized: &str,
        original: &str,
        language: &str,
    ) -> StoreResult<MappingResult> {
        if let Some(mapping) = store.find_by_key(normalized, language).await?
            && mapping.is_active()
        {
            return Ok(MappingResult::matched(
                mapping.target_category,
                mapping.confidence * MatchKind::Key.weight(),
                ResultSource::ExactMatch,
                Some(mapping.id),
            ));
        }

        let found = store
            .find_by_text(original, language, self.text_search_limit)
            .await?;
        if let Some(result) = best_scored(&found, normalized, original) {
            return Ok(result);
        }

        if normalized.is_empty() {
            return Ok(MappingResult::empty());
        }
        let all = store.get_all_active_mappings(Some(language)).await?;
        Ok(self
            .best_fuzzy(&all, normalized)
            .unwrap_or_else(MappingResult::empty))
    }

    fn best_fuzzy(&self, mappings: &[CategoryMapping], normalized: &str) -> Option<MappingResult> {
        let mut best: Option<(&CategoryMapping, f64)> = None;
        for mapping in mappings.iter().filter(|m| m.is_active()) {
            for term in std::iter::once(&mapping.key).chain(mapping.aliases.iter()) {
                let ratio = similarity(normalized, term);
                if best.is_none_or(|(_, top)| ratio > top) {
                    best = Some((mapping, ratio));
                }
            }
        }

        let (mapping, ratio) = best?;
        if ratio < self.fuzzy_threshold {
            return None;
        }
        log::debug!(
            "Fuzzy match {:?} -> {:?} (ratio {:.3})",
            normalized,
            mapping.key,
            ratio
        );
        Some(MappingResult::matched(
            mapping.target_category.clone(),
            mapping.confidence * ratio,
            ResultSource::FuzzyMatch,
            Some(mapping.id.clone()),
        ))
    }
}

/// Scores store candidates and picks the highest confidence.
/// Ties keep the store's ordering.
fn best_scored(
    mappings: &[CategoryMapping],
    normalized: &str,
    original: &str,
) -> Option<MappingResult> {
    let mut best: Option<(&CategoryMapping, MatchKind, f64)> = None;
    for mapping in mappings.iter().filter(|m| m.is_active()) {
        let Some((kind, confidence)) = mapping.match_confidence(normalized, original) else {
            continue;
        };
        if confidence <= 0.0 {
            continue;
        }
        if best.is_none_or(|(_, _, top)| confidence > top) {
            best = Some((mapping, kind, confidence));
        }
    }

    best.map(|(mapping, kind, confidence)| {
        MappingResult::matched(
            mapping.target_category.clone(),
            confidence,
            ResultSource::from(kind),
            Some(mapping.id.clone()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::SqliteMappingStore;

    #[test]
    fn test_similarity_ratio() {
        assert_eq!(similarity("house", "horse"), 0.8);
        assert_eq!(similarity("coffee", "coffee"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_best_scored_prefers_higher_confidence_then_store_order() {
        let alias = CategoryMapping::new("coffee", "en", "Food & Dining", 0.9)
            .with_aliases(["starbucks"]);
        let pattern = CategoryMapping::new("cafe", "en", "Shopping", 1.0)
            .with_patterns(["starbucks"]);
        let result = best_scored(
            &[pattern.clone(), alias.clone()],
            "starbucks reserve",
            "Starbucks Reserve",
        )
        .unwrap();
        // alias 0.9 * 0.9 = 0.81 beats pattern 1.0 * 0.8 = 0.8
        assert_eq!(result.source, ResultSource::AliasMatch);
        assert_eq!(result.mapping_id, Some(alias.id.clone()));

        let twin = CategoryMapping::new("latte", "en", "Groceries", 0.9).with_aliases(["starbucks"]);
        let result = best_scored(&[twin.clone(), alias], "starbucks", "starbucks").unwrap();
        assert_eq!(result.mapping_id, Some(twin.id));
    }

    #[tokio::test]
    async fn test_exact_key_beats_other_stages() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        store
            .save_mapping(&CategoryMapping::new("taxi", "en", "Transportation", 0.7))
            .await
            .unwrap();
        store
            .save_mapping(
                &CategoryMapping::new("cab", "en", "Travel", 1.0).with_aliases(["taxi"]),
            )
            .await
            .unwrap();

        let cascade = MatchingCascade::new(0.8, 10);
        let result = cascade.run(&store, "taxi", "Taxi", "en").await.unwrap();
        assert_eq!(result.source, ResultSource::ExactMatch);
        assert_eq!(result.category.as_deref(), Some("Transportation"));
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_fuzzy_threshold_is_inclusive() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        store
            .save_mapping(&CategoryMapping::new("house", "en", "Housing", 0.9))
            .await
            .unwrap();

        let accepted = MatchingCascade::new(0.8, 10)
            .run(&store, "horse", "horse", "en")
            .await
            .unwrap();
        assert_eq!(accepted.source, ResultSource::FuzzyMatch);
        assert!((accepted.confidence - 0.72).abs() < 1e-9);

        let rejected = MatchingCascade::new(0.801, 10)
            .run(&store, "horse", "horse", "en")
            .await
            .unwrap();
        assert!(!rejected.is_successful());
    }

    #[tokio::test]
    async fn test_empty_store_yields_empty_result() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let result = MatchingCascade::new(0.8, 10)
            .run(&store, "", "", "en")
            .await
            .unwrap();
        assert_eq!(result, MappingResult::empty());
    }
}
