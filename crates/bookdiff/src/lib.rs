pub mod broadcast;
pub mod compare;
pub mod config;
pub mod db;
pub mod error;
pub mod judge;
pub mod logging;
pub mod model;
pub mod service;
pub mod storage;

pub use broadcast::{RunPhase, RunProgressBroadcaster, RunProgressEvent, RunProgressTracker};
pub use compare::{
    BatchPolicy, BroadcastProgress, CompareError, ComparisonRunner, NoopProgress, ProgressEvent,
    ProgressReporter, RunOutcome, RunSummary,
};
pub use config::{load_config, BatchConfig, Config, JudgeConfig};
pub use db::Database;
pub use error::{BookdiffError, ConfigError, Result, StorageError};
pub use judge::{GeminiJudge, JudgeError, PageImage, PageJudge};
pub use model::{
    Classification, ComparisonSettings, ExtractedQuestion, PageJudgment, ProjectStatus,
    QuestionType,
};
pub use service::{
    ApiResponse, ComparisonService, NewProject, RunComparisonRequest, RunComparisonResponse,
};
pub use storage::{FolderRole, ImageStore};
