//! Run progress broadcaster for real-time comparison status streaming.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::model::{Classification, ProjectStatus};

/// Phase of a comparison run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Started,
    Page,
    Completed,
    Failed,
    Paused,
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunPhase::Started => write!(f, "Started"),
            RunPhase::Page => write!(f, "Page processed"),
            RunPhase::Completed => write!(f, "Completed"),
            RunPhase::Failed => write!(f, "Failed"),
            RunPhase::Paused => write!(f, "Paused"),
        }
    }
}

/// Progress event for a comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgressEvent {
    /// Project the run belongs to.
    pub project_id: String,
    /// Current phase of the run.
    pub phase: RunPhase,
    /// Project status implied by the phase.
    pub status: ProjectStatus,
    /// Human-readable message describing current activity.
    pub message: String,
    /// Progress percentage in [0, 100].
    pub progress: u8,
    /// Page the event refers to (page events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,
    /// Total pages in the run.
    pub total_pages: u32,
    /// Classification of the page (page events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    /// Error message (failure events only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Timestamp of this event.
    pub timestamp: DateTime<Utc>,
}

impl RunProgressEvent {
    fn base(
        project_id: &str,
        phase: RunPhase,
        status: ProjectStatus,
        message: String,
        progress: u8,
        total_pages: u32,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            phase,
            status,
            message,
            progress,
            page_number: None,
            total_pages,
            classification: None,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Creates a run-started event.
    pub fn started(project_id: &str, total_pages: u32) -> Self {
        Self::base(
            project_id,
            RunPhase::Started,
            ProjectStatus::Processing,
            format!("Comparing {} pages", total_pages),
            0,
            total_pages,
        )
    }

    /// Creates a page-processed event.
    pub fn page(
        project_id: &str,
        page_number: u32,
        total_pages: u32,
        progress: u8,
        classification: Classification,
    ) -> Self {
        let mut event = Self::base(
            project_id,
            RunPhase::Page,
            ProjectStatus::Processing,
            format!("Page {}/{}: {}", page_number, total_pages, classification),
            progress,
            total_pages,
        );
        event.page_number = Some(page_number);
        event.classification = Some(classification);
        event
    }

    /// Creates a completion event.
    pub fn completed(project_id: &str, total_pages: u32) -> Self {
        Self::base(
            project_id,
            RunPhase::Completed,
            ProjectStatus::Completed,
            "Comparison completed successfully".to_string(),
            100,
            total_pages,
        )
    }

    /// Creates a failure event.
    pub fn failed(project_id: &str, total_pages: u32, progress: u8, error: &str) -> Self {
        let mut event = Self::base(
            project_id,
            RunPhase::Failed,
            ProjectStatus::Failed,
            "Comparison failed".to_string(),
            progress,
            total_pages,
        );
        event.error = Some(error.to_string());
        event
    }

    /// Creates a pause event.
    pub fn paused(project_id: &str, total_pages: u32, progress: u8) -> Self {
        Self::base(
            project_id,
            RunPhase::Paused,
            ProjectStatus::Paused,
            "Comparison paused before next page".to_string(),
            progress,
            total_pages,
        )
    }
}

/// Broadcasts run progress events for streaming.
#[derive(Clone)]
pub struct RunProgressBroadcaster {
    sender: Arc<broadcast::Sender<RunProgressEvent>>,
}

impl RunProgressBroadcaster {
    /// Creates a new broadcaster with the specified channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Sends a progress event to all subscribers.
    pub fn send(&self, event: RunProgressEvent) {
        // Ignore errors - no active receivers is fine
        let _ = self.sender.send(event);
    }

    /// Creates a new subscriber for progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<RunProgressEvent> {
        self.sender.subscribe()
    }

    /// Creates a tracker for one run and announces the run start.
    pub fn start_run(&self, project_id: &str, total_pages: u32) -> RunProgressTracker {
        let tracker = RunProgressTracker::new(project_id, total_pages, Arc::clone(&self.sender));
        tracker.started();
        tracker
    }

    /// Gets the inner sender for creating trackers.
    pub fn sender(&self) -> Arc<broadcast::Sender<RunProgressEvent>> {
        Arc::clone(&self.sender)
    }
}

impl Default for RunProgressBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

/// Tracks progress for a single comparison run.
pub struct RunProgressTracker {
    project_id: String,
    total_pages: u32,
    sender: Arc<broadcast::Sender<RunProgressEvent>>,
}

impl RunProgressTracker {
    /// Creates a new run progress tracker.
    pub fn new(
        project_id: &str,
        total_pages: u32,
        sender: Arc<broadcast::Sender<RunProgressEvent>>,
    ) -> Self {
        Self {
            project_id: project_id.to_string(),
            total_pages,
            sender,
        }
    }

    /// Announces the run start.
    pub fn started(&self) {
        let _ = self
            .sender
            .send(RunProgressEvent::started(&self.project_id, self.total_pages));
    }

    /// Announces one processed page.
    pub fn page(&self, page_number: u32, progress: u8, classification: Classification) {
        let _ = self.sender.send(RunProgressEvent::page(
            &self.project_id,
            page_number,
            self.total_pages,
            progress,
            classification,
        ));
    }

    /// Marks the run as completed.
    pub fn completed(&self) {
        let _ = self
            .sender
            .send(RunProgressEvent::completed(&self.project_id, self.total_pages));
    }

    /// Marks the run as failed with an error message.
    pub fn failed(&self, progress: u8, error: &str) {
        let _ = self.sender.send(RunProgressEvent::failed(
            &self.project_id,
            self.total_pages,
            progress,
            error,
        ));
    }

    /// Marks the run as paused.
    pub fn paused(&self, progress: u8) {
        let _ = self.sender.send(RunProgressEvent::paused(
            &self.project_id,
            self.total_pages,
            progress,
        ));
    }
}
