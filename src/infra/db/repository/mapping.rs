use super::{
    DbConn, bump_cache_version, collect_valid, lock, parse_enum, parse_optional_timestamp,
    parse_string_list, parse_timestamp, read_cache_version, surface_corrupt,
};
use crate::domain::{
    CategoryCount, CategoryMapping, MappingAnalytics, MappingId, normalize_text,
};
use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::HashSet;

const MAPPING_COLUMNS: &str = "id, key, mapping_type, language, target_category, aliases, patterns, \
     priority, confidence, source, status, usage_count, success_rate, last_used, version, \
     created_at, updated_at, created_by, updated_by";

/// Repository for category mapping operations.
pub struct MappingRepository {
    conn: DbConn,
}

impl MappingRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    /// Inserts or replaces a mapping by id and advances the cache version.
    pub fn save(&self, mapping: &CategoryMapping) -> Result<()> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        upsert_mapping(&tx, mapping)
            .with_context(|| format!("failed to save mapping {}", mapping.key))?;
        tx.commit()?;
        Ok(())
    }

    /// Saves every mapping in one transaction. Nothing is written if any row fails.
    pub fn save_all(&self, mappings: &[CategoryMapping]) -> Result<usize> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        for mapping in mappings {
            upsert_mapping(&tx, mapping)?;
        }
        tx.commit()?;
        Ok(mappings.len())
    }

    pub fn find_by_id(&self, id: &MappingId) -> Result<Option<CategoryMapping>> {
        let conn = lock(&self.conn)?;
        let sql = format!("SELECT {MAPPING_COLUMNS} FROM category_mappings WHERE id = ?1");
        conn.query_row(&sql, [id], row_to_mapping)
            .optional()
            .map_err(|e| surface_corrupt(id, e))
    }

    pub fn find_by_key(&self, key: &str, language: &str) -> Result<Option<CategoryMapping>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            r#"
            SELECT {MAPPING_COLUMNS} FROM category_mappings
            WHERE key = ?1 AND language = ?2 AND status = 'active'
            ORDER BY (mapping_type = 'category') DESC, priority DESC, usage_count DESC
            LIMIT 1
            "#
        );
        let mapping = conn
            .query_row(&sql, [key, language], row_to_mapping)
            .optional()?;
        Ok(mapping)
    }

    /// Active mappings that match `text` by key, alias or pattern.
    ///
    /// SQL narrows by key and alias; pattern mappings are tested in process
    /// since SQLite has no regex operator. Rows are scored before `limit` applies.
    pub fn find_by_text(
        &self,
        text: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<CategoryMapping>> {
        let normalized = normalize_text(text);
        let conn = lock(&self.conn)?;

        let sql = format!(
            r#"
            SELECT {MAPPING_COLUMNS} FROM category_mappings m
            WHERE m.status = 'active' AND m.language = ?1 AND (
                m.key = ?2
                OR EXISTS (
                    SELECT 1 FROM json_each(m.aliases) a
                    WHERE a.value = ?2 OR instr(' ' || ?2 || ' ', ' ' || a.value || ' ') > 0
                )
            )
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query(params![language, normalized])?;
        let mut found = collect_valid(rows, row_to_mapping)?;

        let sql = format!(
            r#"
            SELECT {MAPPING_COLUMNS} FROM category_mappings
            WHERE status = 'active' AND language = ?1 AND patterns != '[]'
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query([language])?;
        let seen: HashSet<MappingId> = found.iter().map(|m| m.id.clone()).collect();
        found.extend(
            collect_valid(rows, row_to_mapping)?
                .into_iter()
                .filter(|m| !seen.contains(&m.id)),
        );

        found.retain(|m| m.match_confidence(&normalized, text).is_some());
        sort_by_rank(&mut found);
        found.truncate(limit);
        Ok(found)
    }

    pub fn find_all_active(&self, language: Option<&str>) -> Result<Vec<CategoryMapping>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            r#"
            SELECT {MAPPING_COLUMNS} FROM category_mappings
            WHERE status = 'active' AND (?1 IS NULL OR language = ?1)
            ORDER BY (mapping_type = 'category') DESC, priority DESC, usage_count DESC
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query([language])?;
        collect_valid(rows, row_to_mapping)
    }

    /// Folds one usage outcome into the stored mapping. Returns false if the id is unknown.
    pub fn update_usage_stats(&self, id: &MappingId, success: bool) -> Result<bool> {
        let mut conn = lock(&self.conn)?;
        let tx = conn.transaction()?;
        let sql = format!("SELECT {MAPPING_COLUMNS} FROM category_mappings WHERE id = ?1");
        let Some(mut mapping) = tx.query_row(&sql, [id], row_to_mapping).optional()? else {
            return Ok(false);
        };
        mapping.record_usage(success);
        tx.execute(
            r#"
            UPDATE category_mappings
            SET usage_count = ?1, success_rate = ?2, last_used = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
            params![
                mapping.usage_count,
                mapping.success_rate,
                mapping.last_used.map(|ts| ts.to_rfc3339()),
                mapping.updated_at.to_rfc3339(),
                id,
            ],
        )?;
        bump_cache_version(&tx)?;
        tx.commit()?;
        Ok(true)
    }

    pub fn analytics(&self) -> Result<MappingAnalytics> {
        let conn = lock(&self.conn)?;
        let analytics = conn.query_row(
            r#"
            SELECT COUNT(*), COALESCE(SUM(usage_count), 0),
                   COALESCE(AVG(confidence), 0.0), COALESCE(AVG(success_rate), 0.0)
            FROM category_mappings WHERE status = 'active'
            "#,
            [],
            |row| {
                Ok(MappingAnalytics {
                    total_mappings: row.get(0)?,
                    total_usage: row.get(1)?,
                    avg_confidence: row.get(2)?,
                    avg_success_rate: row.get(3)?,
                })
            },
        )?;
        Ok(analytics)
    }

    pub fn category_distribution(&self, language: Option<&str>) -> Result<Vec<CategoryCount>> {
        let conn = lock(&self.conn)?;
        let mut stmt = conn.prepare(
            r#"
            SELECT target_category, COUNT(*) AS n FROM category_mappings
            WHERE status = 'active' AND (?1 IS NULL OR language = ?1)
            GROUP BY target_category
            ORDER BY n DESC, target_category ASC
            "#,
        )?;
        let rows = stmt.query_map([language], |row| {
            Ok(CategoryCount {
                category: row.get(0)?,
                count: row.get(1)?,
            })
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn popular(&self, limit: usize, language: Option<&str>) -> Result<Vec<CategoryMapping>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            r#"
            SELECT {MAPPING_COLUMNS} FROM category_mappings
            WHERE status = 'active' AND usage_count > 0 AND (?1 IS NULL OR language = ?1)
            ORDER BY usage_count DESC, success_rate DESC
            LIMIT ?2
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query(params![language, limit as i64])?;
        collect_valid(rows, row_to_mapping)
    }

    pub fn cache_version(&self) -> Result<i64> {
        let conn = lock(&self.conn)?;
        Ok(read_cache_version(&conn)?)
    }
}

/// Writes a mapping on an existing connection or transaction.
pub(crate) fn upsert_mapping(conn: &Connection, mapping: &CategoryMapping) -> rusqlite::Result<()> {
    let aliases = serde_json::to_string(&mapping.aliases)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    let patterns = serde_json::to_string(&mapping.patterns)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        r#"
        INSERT INTO category_mappings (
            id, key, mapping_type, language, target_category, aliases, patterns,
            priority, confidence, source, status, usage_count, success_rate, last_used,
            version, created_at, updated_at, created_by, updated_by
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
        ON CONFLICT(id) DO UPDATE SET
            key = excluded.key,
            mapping_type = excluded.mapping_type,
            language = excluded.language,
            target_category = excluded.target_category,
            aliases = excluded.aliases,
            patterns = excluded.patterns,
            priority = excluded.priority,
            confidence = excluded.confidence,
            source = excluded.source,
            status = excluded.status,
            usage_count = excluded.usage_count,
            success_rate = excluded.success_rate,
            last_used = excluded.last_used,
            version = excluded.version,
            updated_at = excluded.updated_at,
            updated_by = excluded.updated_by
        "#,
        params![
            mapping.id,
            mapping.key,
            mapping.mapping_type.to_string(),
            mapping.language,
            mapping.target_category,
            aliases,
            patterns,
            mapping.priority,
            mapping.confidence,
            mapping.source.to_string(),
            mapping.status.to_string(),
            mapping.usage_count,
            mapping.success_rate,
            mapping.last_used.map(|ts| ts.to_rfc3339()),
            mapping.version,
            mapping.created_at.to_rfc3339(),
            mapping.updated_at.to_rfc3339(),
            mapping.created_by,
            mapping.updated_by,
        ],
    )?;
    bump_cache_version(conn)
}

fn row_to_mapping(row: &Row<'_>) -> rusqlite::Result<CategoryMapping> {
    Ok(CategoryMapping {
        id: row.get(0)?,
        key: row.get(1)?,
        mapping_type: parse_enum(2, &row.get::<_, String>(2)?)?,
        language: row.get(3)?,
        target_category: row.get(4)?,
        aliases: parse_string_list(5, &row.get::<_, String>(5)?)?,
        patterns: parse_string_list(6, &row.get::<_, String>(6)?)?,
        priority: row.get(7)?,
        confidence: row.get(8)?,
        source: parse_enum(9, &row.get::<_, String>(9)?)?,
        status: parse_enum(10, &row.get::<_, String>(10)?)?,
        usage_count: row.get(11)?,
        success_rate: row.get(12)?,
        last_used: parse_optional_timestamp(13, row.get(13)?)?,
        version: row.get(14)?,
        created_at: parse_timestamp(15, &row.get::<_, String>(15)?)?,
        updated_at: parse_timestamp(16, &row.get::<_, String>(16)?)?,
        created_by: row.get(17)?,
        updated_by: row.get(18)?,
    })
}

fn sort_by_rank(mappings: &mut [CategoryMapping]) {
    mappings.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(b.usage_count.cmp(&a.usage_count))
    });
}
