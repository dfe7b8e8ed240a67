//! Test harness for isolated comparison runs.
//!
//! The `TestHarness` struct provides a complete isolated environment:
//! - an in-memory database with the full schema
//! - a tempdir-backed image store
//! - a scripted judge double
//! - a progress broadcaster for observing run events

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use bookdiff::broadcast::RunProgressBroadcaster;
use bookdiff::compare::BatchPolicy;
use bookdiff::db::project_repo::ProjectRow;
use bookdiff::db::Database;
use bookdiff::judge::PageJudge;
use bookdiff::model::ComparisonSettings;
use bookdiff::service::{ComparisonService, NewProject};
use bookdiff::storage::{FolderRole, ImageStore};

use super::judge::ScriptedJudge;

pub struct TestHarness {
    /// Holds the store root alive for the harness lifetime.
    _temp_dir: TempDir,
    pub db: Database,
    pub store: ImageStore,
    pub judge: Arc<ScriptedJudge>,
    pub broadcaster: RunProgressBroadcaster,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db = Database::open_in_memory().expect("Failed to open in-memory database");
        let store = ImageStore::new(temp_dir.path());

        Self {
            _temp_dir: temp_dir,
            db,
            store,
            judge: Arc::new(ScriptedJudge::new()),
            broadcaster: RunProgressBroadcaster::new(256),
        }
    }

    /// Builds a service over the harness components. Batch pauses are
    /// disabled so tests do not sleep.
    pub fn service(&self) -> ComparisonService {
        ComparisonService::new(
            self.db.clone(),
            self.store.clone(),
            self.judge.clone() as Arc<dyn PageJudge>,
        )
        .with_batch_policy(BatchPolicy {
            batch_size: 5,
            batch_pause: Duration::ZERO,
        })
        .with_broadcaster(self.broadcaster.clone())
    }

    /// Creates a project with the given settings.
    pub fn create_project(&self, settings: ComparisonSettings) -> ProjectRow {
        self.service()
            .create_project(NewProject {
                name: "Harness project".to_string(),
                description: None,
                old_folder_path: "old-edition".to_string(),
                new_folder_path: "new-edition".to_string(),
                settings,
                created_by: Some("tester".to_string()),
            })
            .expect("Failed to create project")
    }

    /// Uploads `count` dummy page images for one side of a project and
    /// returns their path references in page order.
    pub fn seed_pages(&self, project_id: &str, role: FolderRole, count: usize) -> Vec<String> {
        (0..count)
            .map(|i| {
                self.store
                    .upload(
                        project_id,
                        role,
                        &format!("{:04}_page.jpg", i + 1),
                        format!("{} page {} bytes", role, i + 1).as_bytes(),
                    )
                    .expect("Failed to seed page image")
            })
            .collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Settings with question extraction and OCR both off; tests enable what
/// they exercise.
pub fn bare_settings() -> ComparisonSettings {
    ComparisonSettings {
        quick_comparison: false,
        extract_questions: false,
        ocr_analysis: false,
        detailed_report: true,
    }
}
