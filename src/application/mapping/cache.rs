//! Versioned in-memory snapshot of resolved lookups.
//!
//! A refresh builds a complete table from the store's active mappings without
//! holding the lock, then swaps it in under a short write lock. Readers only
//! ever see a whole snapshot. Individual inserts land in the current table and
//! are discarded by the next swap.

use crate::domain::{
    CacheVersion, CategoryMapping, MappingId, MappingResult, MappingStore, ResultSource,
    StoreError,
};
use crate::infra::hash::cache_key;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct CachedEntry {
    text: String,
    language: String,
    category: String,
    confidence: f64,
    source: ResultSource,
    mapping_id: Option<MappingId>,
    expires_at: Instant,
}

impl CachedEntry {
    fn is_for(&self, normalized: &str, language: &str) -> bool {
        self.text == normalized && self.language == language
    }

    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    fn to_result(&self) -> MappingResult {
        MappingResult {
            cached: true,
            ..MappingResult::matched(
                self.category.clone(),
                self.confidence,
                self.source,
                self.mapping_id.clone(),
            )
        }
    }
}

#[derive(Default)]
struct Table {
    entries: HashMap<u64, CachedEntry>,
    version: Option<CacheVersion>,
    refreshed_at: Option<Instant>,
}

pub struct VersionedCache {
    ttl: Duration,
    table: RwLock<Table>,
}

impl VersionedCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            table: RwLock::new(Table::default()),
        }
    }

    /// Returns the cached result for a normalized text, evicting it if expired.
    pub fn lookup(&self, normalized: &str, language: &str) -> Option<MappingResult> {
        let key = cache_key(normalized, language);
        let now = Instant::now();
        {
            let table = self.table.read();
            let entry = table
                .entries
                .get(&key)
                .filter(|entry| entry.is_for(normalized, language))?;
            if !entry.is_expired(now) {
                return Some(entry.to_result());
            }
        }

        let mut table = self.table.write();
        if table
            .entries
            .get(&key)
            .is_some_and(|entry| entry.is_expired(now))
        {
            table.entries.remove(&key);
        }
        None
    }

    /// Caches a successful result. Results without a category are ignored.
    pub fn store(&self, normalized: &str, language: &str, result: &MappingResult) {
        let Some(category) = result.category.clone() else {
            return;
        };
        let entry = CachedEntry {
            text: normalized.to_string(),
            language: language.to_string(),
            category,
            confidence: result.confidence,
            source: result.source,
            mapping_id: result.mapping_id.clone(),
            expires_at: Instant::now() + self.ttl,
        };
        self.table
            .write()
            .entries
            .insert(cache_key(normalized, language), entry);
    }

    /// Rebuilds the table if the store's version moved or the snapshot outlived the TTL.
    ///
    /// Returns whether a new snapshot was swapped in.
    pub async fn refresh(&self, store: &dyn MappingStore) -> Result<bool, StoreError> {
        let version = store.get_cache_version().await?;
        if !self.is_stale(&version) {
            return Ok(false);
        }

        let mappings = store.get_all_active_mappings(None).await?;
        let fresh = self.build_table(&mappings, version);
        let count = fresh.entries.len();
        let version = fresh.version.clone().unwrap_or_default();
        *self.table.write() = fresh;

        log::info!("Cache refreshed with {} mappings (version {})", count, version);
        Ok(true)
    }

    fn is_stale(&self, version: &CacheVersion) -> bool {
        let table = self.table.read();
        table.version.as_ref() != Some(version)
            || table
                .refreshed_at
                .is_none_or(|at| at.elapsed() >= self.ttl)
    }

    fn build_table(&self, mappings: &[CategoryMapping], version: CacheVersion) -> Table {
        let now = Instant::now();
        let mut entries = HashMap::with_capacity(mappings.len());
        for mapping in mappings.iter().filter(|m| m.is_active()) {
            // Mappings arrive in key lookup order, so the first one per key matches find_by_key.
            entries
                .entry(cache_key(&mapping.key, &mapping.language))
                .or_insert_with(|| CachedEntry {
                    text: mapping.key.clone(),
                    language: mapping.language.clone(),
                    category: mapping.target_category.clone(),
                    confidence: mapping.confidence,
                    source: ResultSource::Database,
                    mapping_id: Some(mapping.id.clone()),
                    expires_at: now + self.ttl,
                });
        }
        Table {
            entries,
            version: Some(version),
            refreshed_at: Some(now),
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn version(&self) -> Option<CacheVersion> {
        self.table.read().version.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::db::SqliteMappingStore;

    fn hit(category: &str) -> MappingResult {
        MappingResult::matched(category, 0.81, ResultSource::AliasMatch, Some("m1".into()))
    }

    #[test]
    fn test_store_and_lookup_marks_cached() {
        let cache = VersionedCache::new(Duration::from_secs(60));
        cache.store("coffee at starbucks", "en", &hit("Food & Dining"));

        let result = cache.lookup("coffee at starbucks", "en").unwrap();
        assert!(result.cached);
        assert_eq!(result.source, ResultSource::AliasMatch);
        assert_eq!(result.confidence, 0.81);
        assert!(cache.lookup("coffee at starbucks", "th").is_none());
    }

    #[test]
    fn test_unsuccessful_results_are_not_cached() {
        let cache = VersionedCache::new(Duration::from_secs(60));
        cache.store("nothing", "en", &MappingResult::empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_evicted_on_read() {
        let cache = VersionedCache::new(Duration::ZERO);
        cache.store("coffee", "en", &hit("Food & Dining"));
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup("coffee", "en").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[tokio::test]
    async fn test_refresh_swaps_on_version_change_only() {
        let store = SqliteMappingStore::open_in_memory().unwrap();
        store
            .save_mapping(&CategoryMapping::new("taxi", "en", "Transportation", 0.9))
            .await
            .unwrap();

        let cache = VersionedCache::new(Duration::from_secs(3600));
        assert!(cache.refresh(&store).await.unwrap());
        assert!(!cache.refresh(&store).await.unwrap());

        let result = cache.lookup("taxi", "en").unwrap();
        assert_eq!(result.source, ResultSource::Database);
        assert_eq!(result.category.as_deref(), Some("Transportation"));

        cache.store("uber ride", "en", &hit("Transportation"));
        store
            .save_mapping(&CategoryMapping::new("hotel", "en", "Travel", 0.9))
            .await
            .unwrap();
        assert!(cache.refresh(&store).await.unwrap());
        assert!(cache.lookup("hotel", "en").is_some());
        assert!(cache.lookup("uber ride", "en").is_none());
        assert_eq!(cache.len(), 2);
    }
}
