//! Processing log repository — append-only audit trail per project.
//!
//! The dashboard reads this table as its live-activity feed while a run is
//! in flight, and as the audit trail afterwards.

use rusqlite::{params, Row};
use serde::Serialize;

use super::{Database, DatabaseError};

/// One log entry. `details` is an arbitrary structured payload.
#[derive(Debug, Clone, Serialize)]
pub struct LogRow {
    pub id: String,
    pub project_id: String,
    pub phase: String,
    pub message: String,
    pub details: serde_json::Value,
    pub created_at: String,
}

impl LogRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let details_json: String = row.get("details")?;
        let details = serde_json::from_str(&details_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            phase: row.get("phase")?,
            message: row.get("message")?,
            details,
            created_at: row.get("created_at")?,
        })
    }
}

/// Appends one log entry.
pub fn append(db: &Database, entry: &LogRow) -> Result<(), DatabaseError> {
    let details_json =
        serde_json::to_string(&entry.details).map_err(|e| DatabaseError::CorruptColumn {
            column: "details",
            reason: e.to_string(),
        })?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO processing_logs (id, project_id, phase, message, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                entry.id,
                entry.project_id,
                entry.phase,
                entry.message,
                details_json,
                entry.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists a project's log entries in creation order.
pub fn list_by_project(db: &Database, project_id: &str) -> Result<Vec<LogRow>, DatabaseError> {
    db.with_conn(|conn| {
        // Timestamps can collide within a second; rowid breaks the tie in
        // insertion order.
        let mut stmt = conn.prepare(
            "SELECT * FROM processing_logs WHERE project_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;
        let rows: Vec<LogRow> = stmt
            .query_map(params![project_id], LogRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
