//! Project repository — CRUD and lifecycle transitions for the `projects` table.

use rusqlite::{params, Row};
use serde::Serialize;

use crate::model::{ComparisonSettings, ProjectStatus};

use super::{Database, DatabaseError};

/// A project row from the database.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub old_folder_path: String,
    pub new_folder_path: String,
    pub settings: ComparisonSettings,
    pub status: ProjectStatus,
    pub progress: u8,
    pub created_by: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl ProjectRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let settings_json: String = row.get("settings")?;
        let settings = serde_json::from_str(&settings_json).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?;

        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            old_folder_path: row.get("old_folder_path")?,
            new_folder_path: row.get("new_folder_path")?,
            settings,
            status: row.get("status")?,
            progress: row.get("progress")?,
            created_by: row.get("created_by")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Inserts a new project row.
pub fn insert(db: &Database, project: &ProjectRow) -> Result<(), DatabaseError> {
    let settings_json =
        serde_json::to_string(&project.settings).map_err(|e| DatabaseError::CorruptColumn {
            column: "settings",
            reason: e.to_string(),
        })?;
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO projects (id, name, description, old_folder_path, new_folder_path,
             settings, status, progress, created_by, created_at, updated_at, completed_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                project.id,
                project.name,
                project.description,
                project.old_folder_path,
                project.new_folder_path,
                settings_json,
                project.status,
                project.progress,
                project.created_by,
                project.created_at,
                project.updated_at,
                project.completed_at,
            ],
        )?;
        Ok(())
    })
}

/// Finds a project by its ID.
pub fn find_by_id(db: &Database, id: &str) -> Result<Option<ProjectRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM projects WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], ProjectRow::from_row)?;
        match rows.next() {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Lists all projects, newest first.
pub fn list_all(db: &Database) -> Result<Vec<ProjectRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at DESC, rowid DESC")?;
        let rows: Vec<ProjectRow> = stmt
            .query_map([], ProjectRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

/// Reads only the current status of a project. Cheap; the orchestrator polls
/// this between pages to observe pause requests.
pub fn status(db: &Database, id: &str) -> Result<Option<ProjectStatus>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare("SELECT status FROM projects WHERE id = ?1")?;
        let mut rows = stmt.query_map(params![id], |row| row.get::<_, ProjectStatus>(0))?;
        match rows.next() {
            Some(Ok(status)) => Ok(Some(status)),
            Some(Err(e)) => Err(DatabaseError::Sqlite(e)),
            None => Ok(None),
        }
    })
}

/// Transitions a project into a fresh run: status `processing`, progress 0.
pub fn start_run(db: &Database, id: &str, updated_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE projects SET status = ?2, progress = 0, completed_at = NULL, updated_at = ?3
             WHERE id = ?1",
            params![id, ProjectStatus::Processing, updated_at],
        )?;
        Ok(())
    })
}

/// Updates only the progress percentage of a project.
pub fn set_progress(
    db: &Database,
    id: &str,
    progress: u8,
    updated_at: &str,
) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE projects SET progress = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, progress, updated_at],
        )?;
        Ok(())
    })
}

/// Marks a project completed: progress forced to 100, completion stamp set.
pub fn mark_completed(db: &Database, id: &str, completed_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE projects SET status = ?2, progress = 100, completed_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![id, ProjectStatus::Completed, completed_at],
        )?;
        Ok(())
    })
}

/// Marks a project failed. Progress is left at its last successful value.
pub fn mark_failed(db: &Database, id: &str, updated_at: &str) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "UPDATE projects SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, ProjectStatus::Failed, updated_at],
        )?;
        Ok(())
    })
}

/// Requests a pause: transitions to `paused` only if a run is active.
/// Returns whether the transition happened.
pub fn pause_if_processing(
    db: &Database,
    id: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE projects SET status = ?2, updated_at = ?3
             WHERE id = ?1 AND status = ?4",
            params![
                id,
                ProjectStatus::Paused,
                updated_at,
                ProjectStatus::Processing
            ],
        )?;
        Ok(changed > 0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> Database {
        Database::open_in_memory().expect("Failed to create test database")
    }

    fn sample_project(id: &str) -> ProjectRow {
        ProjectRow {
            id: id.to_string(),
            name: "Grade 9 Algebra".to_string(),
            description: Some("2025 vs 2026 edition".to_string()),
            old_folder_path: "algebra-2025".to_string(),
            new_folder_path: "algebra-2026".to_string(),
            settings: ComparisonSettings::default(),
            status: ProjectStatus::Pending,
            progress: 0,
            created_by: Some("user-1".to_string()),
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
            completed_at: None,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let db = test_db();
        insert(&db, &sample_project("proj-1")).unwrap();

        let found = find_by_id(&db, "proj-1").unwrap().unwrap();
        assert_eq!(found.name, "Grade 9 Algebra");
        assert_eq!(found.status, ProjectStatus::Pending);
        assert_eq!(found.progress, 0);
        assert_eq!(found.settings, ComparisonSettings::default());
    }

    #[test]
    fn test_find_nonexistent() {
        let db = test_db();
        assert!(find_by_id(&db, "nope").unwrap().is_none());
    }

    #[test]
    fn test_list_all_newest_first() {
        let db = test_db();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            let mut p = sample_project(id);
            p.created_at = format!("2026-01-{:02}T00:00:00Z", i + 1);
            insert(&db, &p).unwrap();
        }

        let rows = list_all(&db).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, "c");
        assert_eq!(rows[2].id, "a");
    }

    #[test]
    fn test_run_lifecycle() {
        let db = test_db();
        insert(&db, &sample_project("proj-2")).unwrap();

        start_run(&db, "proj-2", "2026-01-01T01:00:00Z").unwrap();
        let p = find_by_id(&db, "proj-2").unwrap().unwrap();
        assert_eq!(p.status, ProjectStatus::Processing);
        assert_eq!(p.progress, 0);

        set_progress(&db, "proj-2", 34, "2026-01-01T01:00:01Z").unwrap();
        assert_eq!(find_by_id(&db, "proj-2").unwrap().unwrap().progress, 34);

        mark_completed(&db, "proj-2", "2026-01-01T01:00:02Z").unwrap();
        let p = find_by_id(&db, "proj-2").unwrap().unwrap();
        assert_eq!(p.status, ProjectStatus::Completed);
        assert_eq!(p.progress, 100);
        assert_eq!(p.completed_at.as_deref(), Some("2026-01-01T01:00:02Z"));
    }

    #[test]
    fn test_start_run_clears_completion_stamp() {
        let db = test_db();
        insert(&db, &sample_project("proj-3")).unwrap();
        mark_completed(&db, "proj-3", "2026-01-01T01:00:00Z").unwrap();

        start_run(&db, "proj-3", "2026-01-02T00:00:00Z").unwrap();
        let p = find_by_id(&db, "proj-3").unwrap().unwrap();
        assert_eq!(p.status, ProjectStatus::Processing);
        assert_eq!(p.progress, 0);
        assert!(p.completed_at.is_none());
    }

    #[test]
    fn test_mark_failed_keeps_progress() {
        let db = test_db();
        insert(&db, &sample_project("proj-4")).unwrap();
        start_run(&db, "proj-4", "2026-01-01T01:00:00Z").unwrap();
        set_progress(&db, "proj-4", 67, "2026-01-01T01:00:01Z").unwrap();

        mark_failed(&db, "proj-4", "2026-01-01T01:00:02Z").unwrap();
        let p = find_by_id(&db, "proj-4").unwrap().unwrap();
        assert_eq!(p.status, ProjectStatus::Failed);
        assert_eq!(p.progress, 67);
    }

    #[test]
    fn test_pause_only_while_processing() {
        let db = test_db();
        insert(&db, &sample_project("proj-5")).unwrap();

        // Pending project: pause refused.
        assert!(!pause_if_processing(&db, "proj-5", "2026-01-01T01:00:00Z").unwrap());

        start_run(&db, "proj-5", "2026-01-01T01:00:00Z").unwrap();
        assert!(pause_if_processing(&db, "proj-5", "2026-01-01T01:00:01Z").unwrap());
        assert_eq!(
            status(&db, "proj-5").unwrap(),
            Some(ProjectStatus::Paused)
        );

        // Already paused: no second transition.
        assert!(!pause_if_processing(&db, "proj-5", "2026-01-01T01:00:02Z").unwrap());
    }

    #[test]
    fn test_status_of_missing_project() {
        let db = test_db();
        assert!(status(&db, "ghost").unwrap().is_none());
    }
}
