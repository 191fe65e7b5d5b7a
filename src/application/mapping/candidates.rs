//! Tracking of unmapped inputs and their promotion into mappings.

use super::heuristic::suggest_category;
use crate::domain::{
    AUTO_LEARNED_PRIORITY, CategoryMapping, MappingCandidate, MappingResult, MappingSource,
    MappingStore, ResultSource, StoreError, StoreResult,
};
use tokio::sync::{Mutex, MutexGuard};

/// Reviewer recorded on candidates promoted without a human.
pub const AUTO_LEARN_REVIEWER: &str = "auto_learn_system";

/// Per-request context carried onto new candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestContext<'a> {
    pub user_id: Option<&'a str>,
    pub session_id: Option<&'a str>,
}

pub struct CandidatePipeline {
    auto_learn_threshold: i64,
    min_confidence: f64,
    search_limit: usize,
    /// Serializes find-then-write so concurrent requests for one text share a candidate.
    gate: Mutex<()>,
}

impl CandidatePipeline {
    pub fn new(auto_learn_threshold: i64, min_confidence: f64, search_limit: usize) -> Self {
        Self {
            auto_learn_threshold,
            min_confidence,
            search_limit,
            gate: Mutex::new(()),
        }
    }

    /// Holds off the pipeline while a reviewer changes a candidate.
    pub async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().await
    }

    /// Records an unmapped occurrence.
    ///
    /// Returns a result only when the occurrence promoted the candidate into a
    /// mapping. Store failures are logged and swallowed.
    pub async fn handle_unmapped(
        &self,
        store: &dyn MappingStore,
        original: &str,
        normalized: &str,
        language: &str,
        context: RequestContext<'_>,
    ) -> Option<MappingResult> {
        if normalized.is_empty() {
            return None;
        }
        let _guard = self.gate.lock().await;

        let candidate = match self
            .observe(store, original, normalized, language, context)
            .await
        {
            Ok(Some(candidate)) => candidate,
            Ok(None) => return None,
            Err(err) => {
                log::error!("Failed to record unmapped text {:?}: {}", original, err);
                return None;
            }
        };

        if !candidate.ready_for_auto_learn(self.auto_learn_threshold, self.min_confidence) {
            return None;
        }
        self.auto_learn(store, candidate).await
    }

    /// Creates or bumps the pending candidate for this text.
    ///
    /// A write that loses a race against another writer is retried once as an
    /// increment of the winner's candidate.
    async fn observe(
        &self,
        store: &dyn MappingStore,
        original: &str,
        normalized: &str,
        language: &str,
        context: RequestContext<'_>,
    ) -> StoreResult<Option<MappingCandidate>> {
        let mut raced = false;
        loop {
            let existing = self.find_existing(store, normalized, language).await?;
            let candidate = match existing {
                Some(mut candidate) if candidate.is_pending() => {
                    candidate.increment_attempts();
                    candidate
                }
                Some(candidate) if candidate.status.is_active() => {
                    // Approved earlier but its mapping no longer resolves.
                    self.new_candidate(original, normalized, language, context)
                }
                Some(candidate) => {
                    log::debug!(
                        "Text {:?} was rejected by {:?}, not tracking again",
                        normalized,
                        candidate.reviewed_by
                    );
                    return Ok(None);
                }
                None => self.new_candidate(original, normalized, language, context),
            };

            match store.save_candidate(&candidate).await {
                Ok(()) => {
                    if candidate.attempt_count == 1 {
                        log::info!("Created mapping candidate for unmapped text {:?}", original);
                    } else {
                        log::debug!(
                            "Candidate {:?} seen {} times",
                            normalized,
                            candidate.attempt_count
                        );
                    }
                    return Ok(Some(candidate));
                }
                Err(StoreError::Conflict(reason)) if !raced => {
                    log::debug!("Candidate write raced ({}), retrying", reason);
                    raced = true;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn find_existing(
        &self,
        store: &dyn MappingStore,
        normalized: &str,
        language: &str,
    ) -> StoreResult<Option<MappingCandidate>> {
        let similar = store
            .find_similar_candidates(normalized, language, self.search_limit)
            .await?;
        let mut exact = similar
            .into_iter()
            .filter(|c| c.normalized_text == normalized && c.language == language);
        let first = exact.next();
        // Prefer a live candidate over terminal ones for the same text.
        if first.as_ref().is_some_and(|c| !c.is_pending())
            && let Some(pending) = exact.find(|c| c.is_pending())
        {
            return Ok(Some(pending));
        }
        Ok(first)
    }

    fn new_candidate(
        &self,
        original: &str,
        normalized: &str,
        language: &str,
        context: RequestContext<'_>,
    ) -> MappingCandidate {
        let candidate = MappingCandidate::new(original, normalized, language).with_context(
            context.user_id.map(str::to_string),
            context.session_id.map(str::to_string),
        );
        match suggest_category(normalized, language) {
            Some(suggestion) => candidate.with_suggestion(suggestion),
            None => candidate,
        }
    }

    /// Promotes a candidate into an auto-learned mapping, atomically where the store allows.
    async fn auto_learn(
        &self,
        store: &dyn MappingStore,
        mut candidate: MappingCandidate,
    ) -> Option<MappingResult> {
        let category = candidate.suggested_category.clone()?;
        let confidence = candidate.suggested_confidence;
        let mapping = CategoryMapping::new(
            &candidate.normalized_text,
            candidate.language.clone(),
            category.clone(),
            confidence,
        )
        .with_source(MappingSource::AutoLearned)
        .with_priority(AUTO_LEARNED_PRIORITY)
        .with_created_by(Some(AUTO_LEARN_REVIEWER.to_string()));

        candidate.approve(category.clone(), Some(AUTO_LEARN_REVIEWER.to_string()));
        if let Err(err) = store.promote_candidate(&candidate, &mapping).await {
            log::error!(
                "Failed to auto-learn mapping for {:?}: {}",
                candidate.normalized_text,
                err
            );
            return None;
        }

        log::info!(
            "Auto-learned mapping {:?} -> {} after {} occurrences",
            candidate.normalized_text,
            category,
            candidate.attempt_count
        );
        Some(MappingResult::matched(
            category,
            confidence,
            ResultSource::AutoLearned,
            Some(mapping.id),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MappingStatus, normalize_text};
    use crate::infra::db::SqliteMappingStore;

    async fn observe_n(
        pipeline: &CandidatePipeline,
        store: &SqliteMappingStore,
        text: &str,
        n: usize,
    ) -> Vec<Option<MappingResult>> {
        let mut results = Vec::new();
        for _ in 0..n {
            let normalized = normalize_text(text);
            let result = pipeline
                .handle_unmapped(store, text, &normalized, "en", RequestContext::default())
                .await;
            results.push(result);
        }
        results
    }

    #[tokio::test]
    async fn test_repeated_text_bumps_single_candidate() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let pipeline = CandidatePipeline::new(10, 0.5, 5);
        observe_n(&pipeline, &store, "Zorblax Emporium", 4).await;

        let pending = store.get_pending_candidates(10, 0).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempt_count, 4);
        assert!(pending[0].suggested_category.is_none());
    }

    #[tokio::test]
    async fn test_third_occurrence_auto_learns() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let pipeline = CandidatePipeline::new(3, 0.5, 5);
        let results = observe_n(&pipeline, &store, "Corner Coffee Stand", 3).await;

        assert!(results[0].is_none());
        assert!(results[1].is_none());
        let learned = results[2].clone().expect("auto-learned result");
        assert_eq!(learned.source, ResultSource::AutoLearned);
        assert_eq!(learned.category.as_deref(), Some("Food & Dining"));

        let mapping = store
            .find_by_key("corner coffee stand", "en")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(mapping.source, MappingSource::AutoLearned);
        assert_eq!(mapping.priority, AUTO_LEARNED_PRIORITY);
        assert!((mapping.confidence - 0.6).abs() < 1e-9);

        assert!(store.get_pending_candidates(10, 0).await.unwrap().is_empty());
        let stats = store.candidate_stats().await.unwrap();
        assert_eq!(stats.active, 1);
    }

    #[tokio::test]
    async fn test_rejected_text_is_not_tracked_again() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let pipeline = CandidatePipeline::new(3, 0.5, 5);
        observe_n(&pipeline, &store, "spam text", 1).await;

        let mut candidate = store.get_pending_candidates(1, 0).await.unwrap().remove(0);
        candidate.reject("noise", Some("admin".into()));
        store.save_candidate(&candidate).await.unwrap();

        observe_n(&pipeline, &store, "spam text", 2).await;
        let stored = store.find_candidate_by_id(&candidate.id).await.unwrap().unwrap();
        assert_eq!(stored.status, MappingStatus::Rejected);
        assert_eq!(stored.attempt_count, 1);
        assert_eq!(store.candidate_stats().await.unwrap().total, 1);
    }

    #[tokio::test]
    async fn test_empty_text_is_ignored() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let pipeline = CandidatePipeline::new(1, 0.5, 5);
        assert!(observe_n(&pipeline, &store, "?!", 1).await[0].is_none());
        assert_eq!(store.candidate_stats().await.unwrap().total, 0);
    }
}
