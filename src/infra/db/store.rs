//! `MappingStore` backed by the SQLite repositories.
//!
//! Repository calls are synchronous, so each one runs on the blocking pool.

use super::Database;
use super::repository::{
    CandidateRepository, DbConn, MappingRepository, lock, upsert_candidate, upsert_mapping,
};
use crate::domain::{
    CacheVersion, CandidateId, CandidateStats, CategoryCount, CategoryMapping, MappingAnalytics,
    MappingCandidate, MappingId, MappingStore, StoreError, StoreResult, normalize_text,
};
use async_trait::async_trait;
use rusqlite::ErrorCode;

#[derive(Clone)]
pub struct SqliteMappingStore {
    conn: DbConn,
}

impl SqliteMappingStore {
    pub fn new(db: &Database) -> Self {
        Self {
            conn: db.connection(),
        }
    }

    pub fn open_in_memory() -> anyhow::Result<Self> {
        Ok(Self::new(&Database::open_in_memory()?))
    }

    fn mappings(&self) -> MappingRepository {
        MappingRepository::new(self.conn.clone())
    }

    fn candidates(&self) -> CandidateRepository {
        CandidateRepository::new(self.conn.clone())
    }
}

async fn blocking<T, F>(op: F) -> StoreResult<T>
where
    F: FnOnce() -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::Unavailable(format!("store task aborted: {e}")))?
        .map_err(classify)
}

/// Maps SQLite failure codes onto the store error taxonomy.
fn classify(err: anyhow::Error) -> StoreError {
    let err = match err.downcast::<StoreError>() {
        Ok(store_err) => return store_err,
        Err(err) => err,
    };
    if let Some(rusqlite::Error::SqliteFailure(failure, message)) =
        err.downcast_ref::<rusqlite::Error>()
    {
        let detail = message.clone().unwrap_or_else(|| failure.to_string());
        match failure.code {
            ErrorCode::ConstraintViolation => return StoreError::Conflict(detail),
            // Busy is only reported once the connection's busy timeout has elapsed.
            ErrorCode::DatabaseBusy => return StoreError::Timeout(detail),
            ErrorCode::DatabaseLocked => return StoreError::Unavailable(detail),
            _ => {}
        }
    }
    StoreError::OperationFailed(err)
}

#[async_trait]
impl MappingStore for SqliteMappingStore {
    async fn find_by_key(
        &self,
        key: &str,
        language: &str,
    ) -> StoreResult<Option<CategoryMapping>> {
        let repo = self.mappings();
        let (key, language) = (key.to_string(), language.to_string());
        blocking(move || repo.find_by_key(&key, &language)).await
    }

    async fn find_by_text(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<CategoryMapping>> {
        let repo = self.mappings();
        let (text, language) = (text.to_string(), language.to_string());
        blocking(move || repo.find_by_text(&text, &language, limit)).await
    }

    async fn get_all_active_mappings(
        &self,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>> {
        let repo = self.mappings();
        let language = language.map(str::to_string);
        blocking(move || repo.find_all_active(language.as_deref())).await
    }

    async fn find_mapping_by_id(&self, id: &MappingId) -> StoreResult<Option<CategoryMapping>> {
        let repo = self.mappings();
        let id = id.clone();
        blocking(move || repo.find_by_id(&id)).await
    }

    async fn save_mapping(&self, mapping: &CategoryMapping) -> StoreResult<()> {
        let repo = self.mappings();
        let mapping = mapping.clone();
        blocking(move || repo.save(&mapping)).await
    }

    async fn bulk_create_mappings(&self, mappings: &[CategoryMapping]) -> StoreResult<usize> {
        let repo = self.mappings();
        let mappings = mappings.to_vec();
        blocking(move || repo.save_all(&mappings)).await
    }

    async fn update_usage_stats(&self, id: &MappingId, success: bool) -> StoreResult<()> {
        let repo = self.mappings();
        let id = id.clone();
        let updated = {
            let id = id.clone();
            blocking(move || repo.update_usage_stats(&id, success)).await?
        };
        if !updated {
            log::debug!("Usage update for unknown mapping {}", id);
        }
        Ok(())
    }

    async fn save_candidate(&self, candidate: &MappingCandidate) -> StoreResult<()> {
        let repo = self.candidates();
        let candidate = candidate.clone();
        blocking(move || repo.save(&candidate)).await
    }

    async fn find_candidate_by_id(
        &self,
        id: &CandidateId,
    ) -> StoreResult<Option<MappingCandidate>> {
        let repo = self.candidates();
        let id = id.clone();
        blocking(move || repo.find_by_id(&id)).await
    }

    async fn find_similar_candidates(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> StoreResult<Vec<MappingCandidate>> {
        let repo = self.candidates();
        let (normalized, language) = (normalize_text(text), language.to_string());
        blocking(move || repo.find_similar(&normalized, &language, limit)).await
    }

    async fn get_pending_candidates(
        &self,
        limit: usize,
        offset: usize,
    ) -> StoreResult<Vec<MappingCandidate>> {
        let repo = self.candidates();
        blocking(move || repo.find_pending(limit, offset)).await
    }

    async fn promote_candidate(
        &self,
        candidate: &MappingCandidate,
        mapping: &CategoryMapping,
    ) -> StoreResult<()> {
        let conn = self.conn.clone();
        let (candidate, mapping) = (candidate.clone(), mapping.clone());
        blocking(move || {
            let mut conn = lock(&conn)?;
            let tx = conn.transaction()?;
            upsert_mapping(&tx, &mapping)?;
            upsert_candidate(&tx, &candidate)?;
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn mapping_analytics(&self) -> StoreResult<MappingAnalytics> {
        let repo = self.mappings();
        blocking(move || repo.analytics()).await
    }

    async fn candidate_stats(&self) -> StoreResult<CandidateStats> {
        let repo = self.candidates();
        blocking(move || repo.stats()).await
    }

    async fn category_distribution(
        &self,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryCount>> {
        let repo = self.mappings();
        let language = language.map(str::to_string);
        blocking(move || repo.category_distribution(language.as_deref())).await
    }

    async fn popular_mappings(
        &self,
        limit: usize,
        language: Option<&str>,
    ) -> StoreResult<Vec<CategoryMapping>> {
        let repo = self.mappings();
        let language = language.map(str::to_string);
        blocking(move || repo.popular(limit, language.as_deref())).await
    }

    async fn cleanup_rejected_candidates(&self, older_than_days: i64) -> StoreResult<usize> {
        let repo = self.candidates();
        blocking(move || repo.delete_rejected_before(older_than_days)).await
    }

    async fn get_cache_version(&self) -> StoreResult<CacheVersion> {
        let repo = self.mappings();
        blocking(move || repo.cache_version().map(|v| v.to_string())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MappingStatus;

    #[tokio::test]
    async fn test_duplicate_active_key_is_conflict() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        store
            .save_mapping(&CategoryMapping::new("taxi", "en", "Transportation", 0.9))
            .await
            .unwrap();
        let err = store
            .save_mapping(&CategoryMapping::new("taxi", "en", "Travel", 0.9))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
    }

    #[test]
    fn test_sqlite_failures_are_classified() {
        let failure = |code| {
            anyhow::Error::from(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(code),
                None,
            ))
        };
        assert!(matches!(
            classify(failure(rusqlite::ffi::SQLITE_BUSY)),
            StoreError::Timeout(_)
        ));
        assert!(matches!(
            classify(failure(rusqlite::ffi::SQLITE_LOCKED)),
            StoreError::Unavailable(_)
        ));
        assert!(matches!(
            classify(failure(rusqlite::ffi::SQLITE_CONSTRAINT)),
            StoreError::Conflict(_)
        ));
        assert!(matches!(
            classify(anyhow::anyhow!("no such column: key")),
            StoreError::OperationFailed(_)
        ));
    }

    #[tokio::test]
    async fn test_corrupt_row_surfaces_as_corrupt_record() {
        let db = Database::open_in_memory().unwrap();
        let store = SqliteMappingStore::new(&db);
        let mapping = CategoryMapping::new("taxi", "en", "Transportation", 0.9);
        store.save_mapping(&mapping).await.unwrap();
        db.connection()
            .lock()
            .unwrap()
            .execute("UPDATE category_mappings SET status = 'archived'", [])
            .unwrap();

        let err = store.find_mapping_by_id(&mapping.id).await.unwrap_err();
        assert!(
            matches!(&err, StoreError::Corrupt { id, .. } if id == &mapping.id),
            "got {err:?}"
        );
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_promote_candidate_is_atomic() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        store
            .save_mapping(&CategoryMapping::new("blue bottle", "en", "Food & Dining", 0.9))
            .await
            .unwrap();

        let mut candidate = MappingCandidate::new("Blue Bottle", "blue bottle", "en");
        store.save_candidate(&candidate).await.unwrap();
        candidate.approve("Food & Dining", None);

        // Same active key already exists, so the mapping insert fails and the
        // candidate update must roll back with it.
        let mapping = CategoryMapping::new("blue bottle", "en", "Food & Dining", 0.8);
        assert!(store.promote_candidate(&candidate, &mapping).await.is_err());
        let stored = store
            .find_candidate_by_id(&candidate.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, MappingStatus::PendingReview);
    }

    #[tokio::test]
    async fn test_cache_version_changes_on_write() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        let before = store.get_cache_version().await.unwrap();
        store
            .bulk_create_mappings(&[
                CategoryMapping::new("taxi", "en", "Transportation", 0.9),
                CategoryMapping::new("hotel", "en", "Travel", 0.9),
            ])
            .await
            .unwrap();
        assert_ne!(store.get_cache_version().await.unwrap(), before);
        assert_eq!(store.get_all_active_mappings(Some("en")).await.unwrap().len(), 2);
    }
}
