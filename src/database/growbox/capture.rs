//! Capture/analysis store
//!
//! Links image captures to classifier results. The combined write
//! [`CaptureStore::record_capture_with_analysis`] runs both inserts in one
//! transaction, so a capture recorded through it always has its result.

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::models::{
    AnalysisResult, AnalysisScores, CaptureAnalysis, ImageCapture, RecordedCapture,
};
use crate::database::core::{ConnectionProvider, StoreError, StoreErrorKind, StoreResult};

/// Store for `image_capture` and `ai_result` rows
#[derive(Debug, Clone)]
pub struct CaptureStore {
    provider: ConnectionProvider,
}

impl CaptureStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Record a capture without an analysis result
    ///
    /// Fails with `DuplicateCapture` if the path was recorded before.
    pub fn record_capture(&self, path: &str) -> StoreResult<i64> {
        let db = self.provider.acquire()?;
        insert_capture(&db.conn, path)
    }

    /// Record a result for an existing capture
    ///
    /// Fails with `UnknownCapture` when `capture_id` does not exist.
    pub fn record_analysis(&self, capture_id: i64, scores: &AnalysisScores) -> StoreResult<i64> {
        let db = self.provider.acquire()?;
        insert_analysis(&db.conn, capture_id, scores)
    }

    /// Record a capture and its result as one unit of work
    ///
    /// Either both rows are committed or neither is.
    pub fn record_capture_with_analysis(
        &self,
        path: &str,
        scores: &AnalysisScores,
    ) -> StoreResult<RecordedCapture> {
        // validate before taking the write lock
        check_path(path)?;
        scores.validate()?;

        let mut db = self.provider.acquire()?;
        let tx = db.transaction()?;

        let capture_id = insert_capture(&tx, path)?;
        let result_id = match insert_analysis(&tx, capture_id, scores) {
            Ok(id) => id,
            Err(e) => {
                warn!("Rolling back capture '{}': {}", path, e);
                return Err(e);
            }
        };

        tx.commit().map_err(|e| {
            StoreError::from_sqlite(e, "Failed to commit capture and analysis")
        })?;

        debug!(
            "Recorded capture {} with analysis {} for '{}'",
            capture_id, result_id, path
        );
        Ok(RecordedCapture {
            capture_id,
            result_id,
        })
    }

    /// Id of the capture recorded for exactly `path`, if any
    pub fn find_capture_id_by_path(&self, path: &str) -> StoreResult<Option<i64>> {
        let db = self.provider.acquire()?;
        db.conn
            .query_row(
                "SELECT id FROM image_capture WHERE file_path = ?1",
                [path],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to look up capture by path"))
    }

    /// Fetch a capture by id
    pub fn get_capture(&self, capture_id: i64) -> StoreResult<Option<ImageCapture>> {
        let db = self.provider.acquire()?;
        db.conn
            .query_row(
                "SELECT id, timestamp, file_path FROM image_capture WHERE id = ?1",
                [capture_id],
                ImageCapture::from_row,
            )
            .optional()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read capture"))
    }

    /// Results recorded for one capture, newest first
    pub fn analyses_for_capture(&self, capture_id: i64) -> StoreResult<Vec<AnalysisResult>> {
        let db = self.provider.acquire()?;
        let mut stmt = db
            .conn
            .prepare(
                "SELECT id, image_id, created_at, ripeness_score, ripeness_text,
                        flower_count, flower_text
                 FROM ai_result WHERE image_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to prepare analysis query"))?;

        let results = stmt
            .query_map([capture_id], AnalysisResult::from_row)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to query analyses"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read analysis"))?;
        Ok(results)
    }

    /// Up to `limit` captures joined with their results, most recent first
    ///
    /// Captures without a result are left out.
    pub fn recent_analyses(&self, limit: i64) -> StoreResult<Vec<CaptureAnalysis>> {
        if limit <= 0 {
            return Err(StoreError::invalid_argument(format!(
                "limit must be a positive integer, got {}",
                limit
            )));
        }

        let db = self.provider.acquire()?;
        let mut stmt = db
            .conn
            .prepare(
                "SELECT c.id, c.timestamp, c.file_path,
                        r.id, r.image_id, r.created_at, r.ripeness_score, r.ripeness_text,
                        r.flower_count, r.flower_text
                 FROM image_capture c
                 INNER JOIN ai_result r ON r.image_id = c.id
                 ORDER BY c.timestamp DESC, c.id DESC, r.id DESC
                 LIMIT ?1",
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to prepare analysis query"))?;

        let rows = stmt
            .query_map([limit], |row| {
                let capture = ImageCapture::from_row(row)?;
                let created_at: String = row.get(5)?;
                let result = AnalysisResult {
                    id: row.get(3)?,
                    image_id: row.get(4)?,
                    created_at: super::models::parse_timestamp(5, &created_at)?,
                    scores: AnalysisScores {
                        ripeness_score: row.get(6)?,
                        ripeness_text: row.get(7)?,
                        flower_count: row.get(8)?,
                        flower_text: row.get(9)?,
                    },
                };
                Ok(CaptureAnalysis { capture, result })
            })
            .map_err(|e| StoreError::from_sqlite(e, "Failed to query analyses"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read analysis"))?;
        Ok(rows)
    }
}

fn check_path(path: &str) -> StoreResult<()> {
    if path.trim().is_empty() {
        return Err(StoreError::invalid_argument("Image path must not be empty"));
    }
    Ok(())
}

/// Insert one `image_capture` row on an existing connection or transaction
pub(crate) fn insert_capture(conn: &Connection, path: &str) -> StoreResult<i64> {
    check_path(path)?;

    conn.execute("INSERT INTO image_capture (file_path) VALUES (?1)", [path])
        .map_err(|e| match StoreError::from_sqlite(e, "Failed to insert capture") {
            err if err.is(StoreErrorKind::DuplicateCapture) => StoreError::duplicate_capture(path),
            err => err,
        })?;

    let id = conn.last_insert_rowid();
    debug!("Recorded capture {} for '{}'", id, path);
    Ok(id)
}

/// Insert one `ai_result` row on an existing connection or transaction
pub(crate) fn insert_analysis(
    conn: &Connection,
    capture_id: i64,
    scores: &AnalysisScores,
) -> StoreResult<i64> {
    scores.validate()?;

    conn.execute(
        "INSERT INTO ai_result (image_id, ripeness_score, ripeness_text, flower_count, flower_text)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            capture_id,
            scores.ripeness_score,
            scores.ripeness_text,
            scores.flower_count,
            scores.flower_text
        ],
    )
    .map_err(|e| match StoreError::from_sqlite(e, "Failed to insert analysis") {
        err if err.is(StoreErrorKind::UnknownCapture) => StoreError::unknown_capture(capture_id),
        err => err,
    })?;

    let id = conn.last_insert_rowid();
    debug!("Recorded analysis {} for capture {}", id, capture_id);
    Ok(id)
}
