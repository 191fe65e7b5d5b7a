use super::{
    DbConn, collect_valid, lock, parse_enum, parse_optional_timestamp, parse_timestamp,
    surface_corrupt,
};
use crate::domain::{CandidateId, CandidateStats, MappingCandidate, SuggestionSource};
use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};

const CANDIDATE_COLUMNS: &str = "id, original_text, normalized_text, language, suggested_category, \
     suggested_confidence, suggestion_source, user_id, session_id, attempt_count, status, \
     reviewed_by, reviewed_at, approved_mapping, rejection_reason, created_at, updated_at";

/// Repository for mapping candidate operations.
pub struct CandidateRepository {
    conn: DbConn,
}

impl CandidateRepository {
    pub fn new(conn: DbConn) -> Self {
        Self { conn }
    }

    pub fn save(&self, candidate: &MappingCandidate) -> Result<()> {
        let conn = lock(&self.conn)?;
        upsert_candidate(&conn, candidate)
            .with_context(|| format!("failed to save candidate {}", candidate.id))?;
        Ok(())
    }

    pub fn find_by_id(&self, id: &CandidateId) -> Result<Option<MappingCandidate>> {
        let conn = lock(&self.conn)?;
        let sql = format!("SELECT {CANDIDATE_COLUMNS} FROM mapping_candidates WHERE id = ?1");
        conn.query_row(&sql, [id], row_to_candidate)
            .optional()
            .map_err(|e| surface_corrupt(id, e))
    }

    /// Candidates whose normalized or original text contains `normalized`.
    ///
    /// Exact matches sort first, then pending before reviewed, newest first.
    pub fn find_similar(
        &self,
        normalized: &str,
        language: &str,
        limit: usize,
    ) -> Result<Vec<MappingCandidate>> {
        if normalized.is_empty() {
            return Ok(Vec::new());
        }
        let conn = lock(&self.conn)?;
        let sql = format!(
            r#"
            SELECT {CANDIDATE_COLUMNS} FROM mapping_candidates
            WHERE language = ?1
              AND (instr(normalized_text, ?2) > 0 OR instr(lower(original_text), ?2) > 0)
            ORDER BY (normalized_text = ?2) DESC,
                     (status = 'pending_review') DESC,
                     updated_at DESC
            LIMIT ?3
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query(params![language, normalized, limit as i64])?;
        collect_valid(rows, row_to_candidate)
    }

    /// Pending candidates, most frequently seen first.
    pub fn find_pending(&self, limit: usize, offset: usize) -> Result<Vec<MappingCandidate>> {
        let conn = lock(&self.conn)?;
        let sql = format!(
            r#"
            SELECT {CANDIDATE_COLUMNS} FROM mapping_candidates
            WHERE status = 'pending_review'
            ORDER BY attempt_count DESC, created_at ASC
            LIMIT ?1 OFFSET ?2
            "#
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query(params![limit as i64, offset as i64])?;
        collect_valid(rows, row_to_candidate)
    }

    pub fn stats(&self) -> Result<CandidateStats> {
        let conn = lock(&self.conn)?;
        let stats = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(status = 'pending_review'), 0),
                   COALESCE(SUM(status = 'active'), 0),
                   COALESCE(SUM(status = 'rejected'), 0)
            FROM mapping_candidates
            "#,
            [],
            |row| {
                Ok(CandidateStats {
                    total: row.get(0)?,
                    pending_review: row.get(1)?,
                    active: row.get(2)?,
                    rejected: row.get(3)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Deletes rejected candidates not updated within `older_than_days`.
    pub fn delete_rejected_before(&self, older_than_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - Duration::days(older_than_days.max(0));
        let conn = lock(&self.conn)?;
        let deleted = conn.execute(
            "DELETE FROM mapping_candidates WHERE status = 'rejected' AND updated_at < ?1",
            [cutoff.to_rfc3339()],
        )?;
        Ok(deleted)
    }
}

/// Writes a candidate on an existing connection or transaction.
pub(crate) fn upsert_candidate(
    conn: &Connection,
    candidate: &MappingCandidate,
) -> rusqlite::Result<()> {
    conn.execute(
        r#"
        INSERT INTO mapping_candidates (
            id, original_text, normalized_text, language, suggested_category,
            suggested_confidence, suggestion_source, user_id, session_id, attempt_count,
            status, reviewed_by, reviewed_at, approved_mapping, rejection_reason,
            created_at, updated_at
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
        ON CONFLICT(id) DO UPDATE SET
            suggested_category = excluded.suggested_category,
            suggested_confidence = excluded.suggested_confidence,
            suggestion_source = excluded.suggestion_source,
            attempt_count = excluded.attempt_count,
            status = excluded.status,
            reviewed_by = excluded.reviewed_by,
            reviewed_at = excluded.reviewed_at,
            approved_mapping = excluded.approved_mapping,
            rejection_reason = excluded.rejection_reason,
            updated_at = excluded.updated_at
        "#,
        params![
            candidate.id,
            candidate.original_text,
            candidate.normalized_text,
            candidate.language,
            candidate.suggested_category,
            candidate.suggested_confidence,
            candidate.suggestion_source.map(|s| s.to_string()),
            candidate.user_id,
            candidate.session_id,
            candidate.attempt_count,
            candidate.status.to_string(),
            candidate.reviewed_by,
            candidate.reviewed_at.map(|ts| ts.to_rfc3339()),
            candidate.approved_mapping,
            candidate.rejection_reason,
            candidate.created_at.to_rfc3339(),
            candidate.updated_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

fn row_to_candidate(row: &Row<'_>) -> rusqlite::Result<MappingCandidate> {
    let suggestion_source = row
        .get::<_, Option<String>>(6)?
        .map(|raw| parse_enum::<SuggestionSource>(6, &raw))
        .transpose()?;
    Ok(MappingCandidate {
        id: row.get(0)?,
        original_text: row.get(1)?,
        normalized_text: row.get(2)?,
        language: row.get(3)?,
        suggested_category: row.get(4)?,
        suggested_confidence: row.get(5)?,
        suggestion_source,
        user_id: row.get(7)?,
        session_id: row.get(8)?,
        attempt_count: row.get(9)?,
        status: parse_enum(10, &row.get::<_, String>(10)?)?,
        reviewed_by: row.get(11)?,
        reviewed_at: parse_optional_timestamp(12, row.get(12)?)?,
        approved_mapping: row.get(13)?,
        rejection_reason: row.get(14)?,
        created_at: parse_timestamp(15, &row.get::<_, String>(15)?)?,
        updated_at: parse_timestamp(16, &row.get::<_, String>(16)?)?,
    })
}

