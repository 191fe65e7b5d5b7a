//! SQLite database setup and connection management for the mapping store
//! Handles database initialization, schema creation, and connection management.

use anyhow::Result;
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use super::repository::{CandidateRepository, DbConn, MappingRepository, lock};

const SCHEMA_VERSION: i32 = 1;

/// Database wrapper that manages SQLite connections
pub struct Database {
    conn: DbConn,
}

impl Database {
    /// Create or open the database at the default location
    pub fn open() -> Result<Self> {
        let path = Self::default_path();
        Self::open_at(path)
    }

    /// Create an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        Ok(db)
    }

    /// Create or open the database at a specific path
    pub fn open_at(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(&path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init()?;
        log::debug!("Opened mapping database at {}", path.display());
        Ok(db)
    }

    /// Get the default database path
    pub fn default_path() -> PathBuf {
        if let Ok(path) = std::env::var("CATMAP_DB_PATH") {
            return PathBuf::from(path);
        }
        crate::infra::app_config::app_data_dir().join("catmap.sqlite")
    }

    /// Initialize database schema
    fn init(&self) -> Result<()> {
        let conn = lock(&self.conn)?;

        let existing_version: i32 =
            conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

        if existing_version == 0 {
            Self::create_schema(&conn)?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
        } else if existing_version > SCHEMA_VERSION {
            return Err(anyhow::anyhow!(
                "Database schema version {} is newer than supported version {}",
                existing_version,
                SCHEMA_VERSION
            ));
        }

        Ok(())
    }

    /// Get a reference to the connection
    pub fn connection(&self) -> DbConn {
        self.conn.clone()
    }

    pub fn mapping_repo(&self) -> MappingRepository {
        MappingRepository::new(self.connection())
    }

    pub fn candidate_repo(&self) -> CandidateRepository {
        CandidateRepository::new(self.connection())
    }

    fn create_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS category_mappings (
                id TEXT PRIMARY KEY,
                key TEXT NOT NULL,
                mapping_type TEXT NOT NULL DEFAULT 'category',
                language TEXT NOT NULL,
                target_category TEXT NOT NULL,
                aliases TEXT NOT NULL DEFAULT '[]',
                patterns TEXT NOT NULL DEFAULT '[]',
                priority INTEGER NOT NULL DEFAULT 10,
                confidence REAL NOT NULL CHECK (confidence >= 0.0 AND confidence <= 1.0),
                source TEXT NOT NULL,
                status TEXT NOT NULL,
                usage_count INTEGER NOT NULL DEFAULT 0,
                success_rate REAL NOT NULL DEFAULT 0.0
                    CHECK (success_rate >= 0.0 AND success_rate <= 1.0),
                last_used TEXT,
                version INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                created_by TEXT,
                updated_by TEXT
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_mappings_active_key
                ON category_mappings(key, language, mapping_type)
                WHERE status = 'active';
            CREATE INDEX IF NOT EXISTS idx_mappings_lookup
                ON category_mappings(language, status, priority DESC);

            CREATE TABLE IF NOT EXISTS mapping_candidates (
                id TEXT PRIMARY KEY,
                original_text TEXT NOT NULL,
                normalized_text TEXT NOT NULL,
                language TEXT NOT NULL,
                suggested_category TEXT,
                suggested_confidence REAL NOT NULL DEFAULT 0.0,
                suggestion_source TEXT,
                user_id TEXT,
                session_id TEXT,
                attempt_count INTEGER NOT NULL DEFAULT 1,
                status TEXT NOT NULL,
                reviewed_by TEXT,
                reviewed_at TEXT,
                approved_mapping TEXT,
                rejection_reason TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_pending_text
                ON mapping_candidates(normalized_text, language)
                WHERE status = 'pending_review';
            CREATE INDEX IF NOT EXISTS idx_candidates_status_created
                ON mapping_candidates(status, created_at);

            CREATE TABLE IF NOT EXISTS store_meta (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            );

            INSERT OR IGNORE INTO store_meta (name, value) VALUES ('cache_version', 0);
            "#,
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_default_path() {
        let path = Database::default_path();
        assert!(path.to_string_lossy().contains("catmap"));
    }

    #[test]
    fn test_database_open_in_memory() {
        let db = Database::open_in_memory().unwrap();
        let conn = db.connection();
        let guard = conn.lock().unwrap();
        let version: i32 = guard
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
        let cache_version: i64 = guard
            .query_row(
                "SELECT value FROM store_meta WHERE name = 'cache_version'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(cache_version, 0);
    }

    #[test]
    fn test_reopening_file_database_keeps_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catmap.sqlite");
        {
            let db = Database::open_at(path.clone()).unwrap();
            db.mapping_repo()
                .save(&crate::domain::CategoryMapping::new(
                    "taxi",
                    "en",
                    "Transportation",
                    0.9,
                ))
                .unwrap();
        }
        let db = Database::open_at(path).unwrap();
        assert_eq!(db.mapping_repo().find_all_active(None).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_newer_schema() {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "user_version", SCHEMA_VERSION + 1)
            .unwrap();
        let db = Database {
            conn: Arc::new(Mutex::new(conn)),
        };
        assert!(db.init().is_err());
    }
}
