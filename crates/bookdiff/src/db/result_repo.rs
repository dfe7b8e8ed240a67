//! Comparison result repository — insert-only rows, one per page.

use rusqlite::{params, Row};
use serde::Serialize;

use crate::model::{Classification, ExtractedQuestion};

use super::{Database, DatabaseError};

/// One persisted page comparison.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub id: String,
    pub project_id: String,
    pub page_number: u32,
    pub old_page_path: Option<String>,
    pub new_page_path: Option<String>,
    pub comparison_type: Classification,
    /// Similarity in [0, 1]; 0 when either side is absent.
    pub similarity_score: f64,
    pub ocr_text_old: Option<String>,
    pub ocr_text_new: Option<String>,
    pub questions_extracted: Vec<ExtractedQuestion>,
    pub created_at: String,
}

impl ResultRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let questions_json: String = row.get("questions_extracted")?;
        let questions_extracted = serde_json::from_str(&questions_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            project_id: row.get("project_id")?,
            page_number: row.get("page_number")?,
            old_page_path: row.get("old_page_path")?,
            new_page_path: row.get("new_page_path")?,
            comparison_type: row.get("comparison_type")?,
            similarity_score: row.get("similarity_score")?,
            ocr_text_old: row.get("ocr_text_old")?,
            ocr_text_new: row.get("ocr_text_new")?,
            questions_extracted,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts one result row.
pub fn insert(db: &Database, result: &ResultRow) -> Result<(), DatabaseError> {
    let questions_json = serde_json::to_string(&result.questions_extracted).map_err(|e| {
        DatabaseError::CorruptColumn {
            column: "questions_extracted",
            reason: e.to_string(),
        }
    })?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO comparison_results (id, project_id, page_number, old_page_path,
             new_page_path, comparison_type, similarity_score, ocr_text_old, ocr_text_new,
             questions_extracted, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                result.id,
                result.project_id,
                result.page_number,
                result.old_page_path,
                result.new_page_path,
                result.comparison_type,
                result.similarity_score,
                result.ocr_text_old,
                result.ocr_text_new,
                questions_json,
                result.created_at,
            ],
        )?;
        Ok(())
    })
}

/// Lists a project's results in page order.
pub fn list_by_project(db: &Database, project_id: &str) -> Result<Vec<ResultRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM comparison_results WHERE project_id = ?1 ORDER BY page_number ASC",
        )?;
        let rows: Vec<ResultRow> = stmt
            .query_map(params![project_id], ResultRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Counts a project's results with the given classification.
pub fn count_by_classification(
    db: &Database,
    project_id: &str,
    classification: Classification,
) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM comparison_results
             WHERE project_id = ?1 AND comparison_type = ?2",
            params![project_id, classification],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}

/// Deletes all results of a project. A fresh run replaces prior results
/// rather than appending to them.
pub fn delete_by_project(db: &Database, project_id: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "DELETE FROM comparison_results WHERE project_id = ?1",
            params![project_id],
        )?;
        Ok(())
    })
}
