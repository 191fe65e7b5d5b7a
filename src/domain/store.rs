//! Abstract persistence contract consumed by the mapping engine.

use super::candidate::{CandidateId, MappingCandidate};
use super::error::StoreError;
use super::mapping::{CategoryMapping, MappingId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque token that changes whenever stored mappings change.
pub type CacheVersion = String;

/// Aggregate usage figures over active mappings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingAnalytics {
    pub total_mappings: i64,
    pub total_usage: i64,
    pub avg_confidence: f64,
    pub avg_success_rate: f64,
}

/// Candidate counts per review status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateStats {
    pub total: i64,
    pub pending_review: i64,
    pub active: i64,
    pub rejected: i64,
}

/// Number of active mappings targeting one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Repository of mappings and candidates.
///
/// Implementations own logical uniqueness of `(key, language, mapping_type)`
/// and of pending candidates per `(normalized_text, language)`.
#[async_trait]
pub trait MappingStore: Send + Sync {
    /// Active mapping whose key equals `key` for `language`.
    async fn find_by_key(&self, key: &str, language: &str)
    -> StoreResult<Option<CategoryMapping>>;

    /// Bounded set of active mappings that may match `text` by key, alias,
    /// pattern or text search, in store priority order.
    async fn find_by_text(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<CategoryMapping>>;

    /// Every active mapping, optionally limited to one language.
    async fn get_all_active_mappings(
        &self,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>>;

    async fn find_mapping_by_id(&self, id: &MappingId) -> StoreResult<Option<CategoryMapping>>;

    async fn save_mapping(&self, mapping: &CategoryMapping) -> StoreResult<()>;

    async fn bulk_create_mappings(&self, mappings: &[CategoryMapping]) -> StoreResult<usize> {
        for mapping in mappings {
            self.save_mapping(mapping).await?;
        }
        Ok(mappings.len())
    }

    async fn update_usage_stats(&self, id: &MappingId, success: bool) -> StoreResult<()>;

    async fn save_candidate(&self, candidate: &MappingCandidate) -> StoreResult<()>;

    async fn find_candidate_by_id(
        &self,
        id: &CandidateId,
    ) -> StoreResult<Option<MappingCandidate>>;

    async fn find_similar_candidates(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<MappingCandidate>>;

    async fn get_pending_candidates(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<MappingCandidate>>;

    /// Persists a new mapping together with the candidate it resolves.
    ///
    /// Stores that support transactions should override this so both writes
    /// land or neither does.
    async fn promote_candidate(
        &self,
        candidate: &MappingCandidate,
        mapping: &CategoryMapping,
    ) -> StoreResult<()> {
        self.save_mapping(mapping).await?;
        self.save_candidate(candidate).await
    }

    async fn mapping_analytics(&self) -> StoreResult<MappingAnalytics>;

    async fn candidate_stats(&self) -> StoreResult<CandidateStats>;

    async fn category_distribution(&self, language: Option<&str>)
    -> StoreResult<Vec<CategoryCount>>;

    async fn popular_mappings(
        &self,
        limit: usize,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>>;

    /// Deletes rejected candidates last touched more than `older_than_days` ago.
    async fn cleanup_rejected_candidates(&self, older_than_days: i64) -> StoreResult<usize>;

    async fn get_cache_version(&self) -> StoreResult<CacheVersion>;
}
