//! Adaptive category mapping engine.
//!
//! `map_category` resolves free-form text in stages: the versioned cache, then
//! the store-backed matching cascade under a retry policy, then the candidate
//! pipeline (which may auto-learn a mapping), and finally the static fallback
//! table. It never returns an error; degraded answers carry `fallback_used`.

pub mod admin;
pub mod cache;
pub mod candidates;
pub mod cascade;
pub mod fallback;
pub mod heuristic;
pub mod retry;
pub mod stats;

pub use admin::{MappingStats, MappingUpdate, NewMapping};
pub use cache::VersionedCache;
pub use candidates::{AUTO_LEARN_REVIEWER, CandidatePipeline, RequestContext};
pub use cascade::{MatchingCascade, similarity};
pub use fallback::fallback_result;
pub use heuristic::suggest_category;
pub use retry::RetryPolicy;
pub use stats::UsageStatsRecorder;

use crate::domain::{MappingError, MappingResult, MappingStore, normalize_text};
use crate::infra::app_config::EngineConfig;
use std::sync::Arc;

pub struct MappingEngine {
    store: Arc<dyn MappingStore>,
    config: EngineConfig,
    cache: VersionedCache,
    cascade: MatchingCascade,
    retry: RetryPolicy,
    candidates: CandidatePipeline,
    stats: UsageStatsRecorder,
}

impl MappingEngine {
    /// Builds an engine over `store` and starts its usage-stat worker.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(store: Arc<dyn MappingStore>, config: EngineConfig) -> Result<Self, MappingError> {
        config.validate()?;
        let stats = UsageStatsRecorder::spawn(store.clone(), config.stats_queue_capacity);
        Ok(Self {
            cache: VersionedCache::new(config.cache_ttl()),
            cascade: MatchingCascade::new(config.fuzzy_threshold, config.text_search_limit),
            retry: RetryPolicy::new(config.max_retries, config.retry_base_delay()),
            candidates: CandidatePipeline::new(
                config.auto_learn_threshold,
                config.auto_learn_min_confidence,
                config.candidate_search_limit,
            ),
            stats,
            store,
            config,
        })
    }

    /// Loads the first cache snapshot. Fails if the store cannot be read.
    pub async fn initialize(&self) -> Result<(), MappingError> {
        self.cache.refresh(self.store.as_ref()).await?;
        log::info!("Mapping engine initialized with {} cached mappings", self.cache.len());
        Ok(())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn MappingStore> {
        &self.store
    }

    pub fn cache(&self) -> &VersionedCache {
        &self.cache
    }

    /// Classifies `text` for `language`. Always returns a result.
    pub async fn map_category(
        &self,
        text: &str,
        language: &str,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> MappingResult {
        let normalized = normalize_text(text);

        if let Some(hit) = self.cache.lookup(&normalized, language) {
            log::debug!("Cache hit for {:?} -> {:?}", text, hit.category);
            self.record_usage(&hit);
            return hit;
        }

        for attempt in 0..self.retry.max_attempts() {
            if attempt > 0
                && let Some(hit) = self.cache.lookup(&normalized, language)
            {
                self.record_usage(&hit);
                return hit;
            }

            match self
                .cascade
                .run(self.store.as_ref(), &normalized, text, language)
                .await
            {
                Ok(result) if result.is_successful() => {
                    self.cache.store(&normalized, language, &result);
                    self.record_usage(&result);
                    return result;
                }
                Ok(_) => {
                    if self.retry.is_last(attempt) {
                        break;
                    }
                    if attempt == 0 {
                        self.refresh_cache().await;
                    }
                }
                Err(err) => {
                    log::warn!(
                        "Mapping attempt {} for {:?} failed: {}",
                        attempt + 1,
                        text,
                        err
                    );
                    if !err.is_transient() || self.retry.is_last(attempt) {
                        break;
                    }
                    if attempt == 0 {
                        self.refresh_cache().await;
                    }
                    tokio::time::sleep(self.retry.delay_after(attempt)).await;
                }
            }
        }

        let context = RequestContext {
            user_id,
            session_id,
        };
        if let Some(learned) = self
            .candidates
            .handle_unmapped(self.store.as_ref(), text, &normalized, language, context)
            .await
        {
            self.refresh_cache().await;
            return learned;
        }

        fallback_result(&normalized, language)
    }

    /// Refreshes the cache snapshot if stale. Failures are logged, not returned.
    pub async fn refresh_cache(&self) -> bool {
        match self.cache.refresh(self.store.as_ref()).await {
            Ok(swapped) => swapped,
            Err(err) => {
                log::error!("Failed to refresh mapping cache: {}", err);
                false
            }
        }
    }

    /// Stops accepting usage events and waits for queued ones to be written.
    pub async fn shutdown(&self) {
        self.stats.shutdown().await;
        log::info!("Mapping engine shut down");
    }

    fn record_usage(&self, result: &MappingResult) {
        if let Some(id) = &result.mapping_id {
            self.stats.record(id, result.is_successful());
        }
    }
}
