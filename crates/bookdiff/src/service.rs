//! Service surface consumed by the dashboard.
//!
//! One struct owns the stores and the judge and exposes the operations the
//! UI invokes: the `run_comparison` wire contract, project CRUD, the
//! polling reads (project row, results, logs), pause requests, and bulk
//! folder import.

use std::path::Path;
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::broadcast::RunProgressBroadcaster;
use crate::compare::{
    BatchPolicy, BroadcastProgress, ComparisonRunner, NoopProgress, ProgressReporter, RunOutcome,
};
use crate::db::log_repo::{self, LogRow};
use crate::db::project_repo::{self, ProjectRow};
use crate::db::result_repo::{self, ResultRow};
use crate::db::Database;
use crate::error::{BookdiffError, Result};
use crate::judge::PageJudge;
use crate::model::ComparisonSettings;
use crate::storage::{FolderRole, ImageStore};

/// Response wrapper for API calls.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Fields supplied by the UI when a project is created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewProject {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub old_folder_path: String,
    #[serde(default)]
    pub new_folder_path: String,
    #[serde(default)]
    pub settings: ComparisonSettings,
    pub created_by: Option<String>,
}

/// The wire request starting one comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunComparisonRequest {
    pub project_id: String,
    pub old_image_paths: Vec<String>,
    pub new_image_paths: Vec<String>,
}

/// The wire response of a finished run. `success` is false when the run was
/// paused before its last page; `results` then holds the pages processed so
/// far.
#[derive(Debug, Serialize)]
pub struct RunComparisonResponse {
    pub success: bool,
    pub results: Vec<ResultRow>,
}

pub struct ComparisonService {
    db: Database,
    store: ImageStore,
    judge: Arc<dyn PageJudge>,
    batch: BatchPolicy,
    broadcaster: Option<RunProgressBroadcaster>,
}

impl ComparisonService {
    pub fn new(db: Database, store: ImageStore, judge: Arc<dyn PageJudge>) -> Self {
        Self {
            db,
            store,
            judge,
            batch: BatchPolicy::default(),
            broadcaster: None,
        }
    }

    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    /// Attaches a broadcaster; runs then stream progress events in addition
    /// to the persisted progress the UI polls.
    pub fn with_broadcaster(mut self, broadcaster: RunProgressBroadcaster) -> Self {
        self.broadcaster = Some(broadcaster);
        self
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    /// Creates a project in `pending` with progress 0.
    pub fn create_project(&self, new: NewProject) -> Result<ProjectRow> {
        let name = new.name.trim();
        if name.is_empty() {
            return Err(BookdiffError::InvalidInput(
                "project name must not be empty".to_string(),
            ));
        }

        let now = now_rfc3339();
        let row = ProjectRow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            description: new.description,
            old_folder_path: new.old_folder_path,
            new_folder_path: new.new_folder_path,
            settings: new.settings,
            status: crate::model::ProjectStatus::Pending,
            progress: 0,
            created_by: new.created_by,
            created_at: now.clone(),
            updated_at: now,
            completed_at: None,
        };
        project_repo::insert(&self.db, &row)?;
        Ok(row)
    }

    /// Lists all projects, newest first.
    pub fn list_projects(&self) -> Result<Vec<ProjectRow>> {
        Ok(project_repo::list_all(&self.db)?)
    }

    pub fn get_project(&self, id: &str) -> Result<Option<ProjectRow>> {
        Ok(project_repo::find_by_id(&self.db, id)?)
    }

    /// A project's results in page order.
    pub fn get_results(&self, project_id: &str) -> Result<Vec<ResultRow>> {
        Ok(result_repo::list_by_project(&self.db, project_id)?)
    }

    /// A project's processing log in creation order.
    pub fn get_logs(&self, project_id: &str) -> Result<Vec<LogRow>> {
        Ok(log_repo::list_by_project(&self.db, project_id)?)
    }

    /// Requests a pause of the active run. Takes effect between pages.
    /// Returns whether a run was actually paused.
    pub fn request_pause(&self, project_id: &str) -> Result<bool> {
        Ok(project_repo::pause_if_processing(
            &self.db,
            project_id,
            &now_rfc3339(),
        )?)
    }

    /// Bulk-uploads one side's page images from a local directory, in
    /// filename order.
    pub fn import_project_folder(
        &self,
        project_id: &str,
        role: FolderRole,
        dir: &Path,
    ) -> Result<Vec<String>> {
        Ok(self.store.import_folder(project_id, role, dir)?)
    }

    /// Runs one comparison pass. Synchronous for the duration of the run;
    /// re-invocation starts a fresh pass over the same project.
    pub async fn run_comparison(
        &self,
        request: RunComparisonRequest,
    ) -> Result<RunComparisonResponse> {
        let total = request
            .old_image_paths
            .len()
            .max(request.new_image_paths.len()) as u32;

        let runner = ComparisonRunner::new(
            self.db.clone(),
            self.store.clone(),
            Arc::clone(&self.judge),
        )
        .with_batch_policy(self.batch);

        let reporter: Box<dyn ProgressReporter> = match &self.broadcaster {
            Some(broadcaster) => Box::new(BroadcastProgress::new(
                &request.project_id,
                total,
                broadcaster.sender(),
            )),
            None => Box::new(NoopProgress),
        };

        let summary = runner
            .run(
                &request.project_id,
                &request.old_image_paths,
                &request.new_image_paths,
                reporter.as_ref(),
            )
            .await?;

        Ok(RunComparisonResponse {
            success: summary.outcome == RunOutcome::Completed,
            results: summary.results,
        })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::judge::{JudgeError, PageImage};
    use crate::model::{ExtractedQuestion, PageJudgment, ProjectStatus};
    use async_trait::async_trait;
    use tempfile::TempDir;

    /// Judge that reports every pair identical. CRUD tests never reach it.
    struct IdenticalJudge;

    #[async_trait]
    impl PageJudge for IdenticalJudge {
        async fn compare_pages(
            &self,
            _old: PageImage<'_>,
            _new: PageImage<'_>,
        ) -> std::result::Result<PageJudgment, JudgeError> {
            Ok(PageJudgment {
                similarity: 1.0,
                is_identical: true,
                differences: vec![],
            })
        }

        async fn extract_text(
            &self,
            _image: PageImage<'_>,
        ) -> std::result::Result<String, JudgeError> {
            Ok(String::new())
        }

        async fn extract_questions(
            &self,
            _image: PageImage<'_>,
        ) -> std::result::Result<Vec<ExtractedQuestion>, JudgeError> {
            Ok(vec![])
        }
    }

    fn test_service() -> (TempDir, ComparisonService) {
        let tmp = TempDir::new().unwrap();
        let service = ComparisonService::new(
            Database::open_in_memory().unwrap(),
            ImageStore::new(tmp.path()),
            Arc::new(IdenticalJudge),
        );
        (tmp, service)
    }

    #[test]
    fn test_create_project_defaults() {
        let (_tmp, service) = test_service();
        let project = service
            .create_project(NewProject {
                name: "  Physics 11  ".to_string(),
                description: Some("old vs new print".to_string()),
                ..NewProject::default()
            })
            .unwrap();

        assert_eq!(project.name, "Physics 11");
        assert_eq!(project.status, ProjectStatus::Pending);
        assert_eq!(project.progress, 0);
        assert!(!project.id.is_empty());

        let fetched = service.get_project(&project.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Physics 11");
    }

    #[test]
    fn test_create_project_rejects_blank_name() {
        let (_tmp, service) = test_service();
        let err = service
            .create_project(NewProject {
                name: "   ".to_string(),
                ..NewProject::default()
            })
            .unwrap_err();
        assert!(matches!(err, BookdiffError::InvalidInput(_)));
        assert!(service.list_projects().unwrap().is_empty());
    }

    #[test]
    fn test_list_projects_newest_first() {
        let (_tmp, service) = test_service();
        let first = service
            .create_project(NewProject {
                name: "first".to_string(),
                ..NewProject::default()
            })
            .unwrap();
        let second = service
            .create_project(NewProject {
                name: "second".to_string(),
                ..NewProject::default()
            })
            .unwrap();

        let listed = service.list_projects().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn test_pause_requires_active_run() {
        let (_tmp, service) = test_service();
        let project = service
            .create_project(NewProject {
                name: "pausable".to_string(),
                ..NewProject::default()
            })
            .unwrap();

        assert!(!service.request_pause(&project.id).unwrap());
    }

    #[test]
    fn test_reads_for_fresh_project_are_empty() {
        let (_tmp, service) = test_service();
        let project = service
            .create_project(NewProject {
                name: "fresh".to_string(),
                ..NewProject::default()
            })
            .unwrap();

        assert!(service.get_results(&project.id).unwrap().is_empty());
        assert!(service.get_logs(&project.id).unwrap().is_empty());
    }

    #[test]
    fn test_api_response_envelope() {
        let ok = ApiResponse::ok(vec![1, 2, 3]);
        assert!(ok.success);
        assert_eq!(ok.data.unwrap().len(), 3);
        assert!(ok.error.is_none());

        let err: ApiResponse<()> = ApiResponse::err("database unreachable");
        assert!(!err.success);
        assert!(err.data.is_none());
        assert_eq!(err.error.as_deref(), Some("database unreachable"));
    }
}
