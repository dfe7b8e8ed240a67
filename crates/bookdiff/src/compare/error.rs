use thiserror::Error;

use crate::model::ProjectStatus;

#[derive(Error, Debug)]
pub enum CompareError {
    /// Rejected before any state change; nothing is persisted.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// A run is already active; concurrent runs against one project are
    /// refused.
    #[error("Project {project_id} already has an active run (status: {status})")]
    RunActive {
        project_id: String,
        status: ProjectStatus,
    },

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::error::StorageError),

    #[error("Judge call failed: {0}")]
    Judge(#[from] crate::judge::JudgeError),
}
