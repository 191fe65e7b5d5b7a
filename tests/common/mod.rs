//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use catmap::application::mapping::MappingEngine;
use catmap::domain::{
    CacheVersion, CandidateId, CandidateStats, CategoryCount, CategoryMapping, MappingAnalytics,
    MappingCandidate, MappingId, MappingStore, StoreError, StoreResult,
};
use catmap::infra::app_config::EngineConfig;
use catmap::infra::db::SqliteMappingStore;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

pub fn fast_config() -> EngineConfig {
    EngineConfig {
        retry_base_delay_ms: 1,
        ..EngineConfig::default()
    }
}

pub fn engine(store: Arc<dyn MappingStore>) -> MappingEngine {
    MappingEngine::new(store, fast_config()).expect("valid config")
}

/// A store whose every call fails as if the database were unreachable.
pub struct FailingStore;

fn down<T>() -> StoreResult<T> {
    Err(StoreError::Unavailable("database is down".into()))
}

#[async_trait]
impl MappingStore for FailingStore {
    async fn find_by_key(&self, _: &str, _: &str) -> StoreResult<Option<CategoryMapping>> {
        down()
    }

    async fn find_by_text(&self, _: &str, _: &str, _: usize) -> StoreResult<Vec<CategoryMapping>> {
        down()
    }

    async fn get_all_active_mappings(&self, _: Option<&str>) -> StoreResult<Vec<CategoryMapping>> {
        down()
    }

    async fn find_mapping_by_id(&self, _: &MappingId) -> StoreResult<Option<CategoryMapping>> {
        down()
    }

    async fn save_mapping(&self, _: &CategoryMapping) -> StoreResult<()> {
        down()
    }

    async fn update_usage_stats(&self, _: &MappingId, _: bool) -> StoreResult<()> {
        down()
    }

    async fn save_candidate(&self, _: &MappingCandidate) -> StoreResult<()> {
        down()
    }

    async fn find_candidate_by_id(&self, _: &CandidateId) -> StoreResult<Option<MappingCandidate>> {
        down()
    }

    async fn find_similar_candidates(
        &self,
        _: &str,
        _: &str,
        _: usize,
    ) -> StoreResult<Vec<MappingCandidate>> {
        down()
    }

    async fn get_pending_candidates(&self, _: usize, _: usize) -> StoreResult<Vec<MappingCandidate>> {
        down()
    }

    async fn mapping_analytics(&self) -> StoreResult<MappingAnalytics> {
        down()
    }

    async fn candidate_stats(&self) -> StoreResult<CandidateStats> {
        down()
    }

    async fn category_distribution(&self, _: Option<&str>) -> StoreResult<Vec<CategoryCount>> {
        down()
    }

    async fn popular_mappings(&self, _: usize, _: Option<&str>) -> StoreResult<Vec<CategoryMapping>> {
        down()
    }

    async fn cleanup_rejected_candidates(&self, _: i64) -> StoreResult<usize> {
        down()
    }

    async fn get_cache_version(&self) -> StoreResult<CacheVersion> {
        down()
    }
}

fn timed_out() -> StoreError {
    StoreError::Timeout("lookup timed out".into())
}

/// Wraps a SQLite store and fails the first `failures` key lookups.
pub struct FlakyStore {
    inner: SqliteMappingStore,
    failures: usize,
    error: fn() -> StoreError,
    key_lookups: AtomicUsize,
}

impl FlakyStore {
    /// Key lookups time out `failures` times before reaching the database.
    pub fn new(inner: SqliteMappingStore, failures: usize) -> Self {
        Self::failing_with(inner, failures, timed_out)
    }

    pub fn failing_with(
        inner: SqliteMappingStore,
        failures: usize,
        error: fn() -> StoreError,
    ) -> Self {
        Self {
            inner,
            failures,
            error,
            key_lookups: AtomicUsize::new(0),
        }
    }

    pub fn key_lookups(&self) -> usize {
        self.key_lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingStore for FlakyStore {
    async fn find_by_key(&self, key: &str, language: &str) -> StoreResult<Option<CategoryMapping>> {
        let call = self.key_lookups.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err((self.error)());
        }
        self.inner.find_by_key(key, language).await
    }

    async fn find_by_text(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<CategoryMapping>> {
        self.inner.find_by_text(text, language, limit).await
    }

    async fn get_all_active_mappings(
        &self,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>> {
        self.inner.get_all_active_mappings(language).await
    }

    async fn find_mapping_by_id(&self, id: &MappingId) -> StoreResult<Option<CategoryMapping>> {
        self.inner.find_mapping_by_id(id).await
    }

    async fn save_mapping(&self, mapping: &CategoryMapping) -> StoreResult<()> {
        self.inner.save_mapping(mapping).await
    }

    async fn update_usage_stats(&self, id: &MappingId, success: bool) -> StoreResult<()> {
        self.inner.update_usage_stats(id, success).await
    }

    async fn save_candidate(&self, candidate: &MappingCandidate) -> StoreResult<()> {
        self.inner.save_candidate(candidate).await
    }

    async fn find_candidate_by_id(
        &self,
        id: &CandidateId,
    ) -> StoreResult<Option<MappingCandidate>> {
        self.inner.find_candidate_by_id(id).await
    }

    async fn find_similar_candidates(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<MappingCandidate>> {
        self.inner.find_similar_candidates(text, language, limit).await
    }

    async fn get_pending_candidates(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<MappingCandidate>> {
        self.inner.get_pending_candidates(limit, offset).await
    }

    async fn promote_candidate(
        &self,
        candidate: &MappingCandidate,
        mapping: &CategoryMapping,
    ) -> StoreResult<()> {
        self.inner.promote_candidate(candidate, mapping).await
    }

    async fn mapping_analytics(&self) -> StoreResult<MappingAnalytics> {
        self.inner.mapping_analytics().await
    }

    async fn candidate_stats(&self) -> StoreResult<CandidateStats> {
        self.inner.candidate_stats().await
    }

    async fn category_distribution(
        &self,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryCount>> {
        self.inner.category_distribution(language).await
    }

    async fn popular_mappings(
        &self,
        limit: usize,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>> {
        self.inner.popular_mappings(limit, language).await
    }

    async fn cleanup_rejected_candidates(&self, older_than_days: i64) -> StoreResult<usize> {
        self.inner.cleanup_rejected_candidates(older_than_days).await
    }

    async fn get_cache_version(&self) -> StoreResult<CacheVersion> {
        self.inner.get_cache_version().await
    }
}
