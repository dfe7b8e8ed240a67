use std::sync::Arc;

use tokio::sync::broadcast;

use crate::broadcast::run_progress::{RunProgressEvent, RunProgressTracker};
use crate::model::Classification;

/// Events emitted by the orchestrator while a run proceeds.
pub enum ProgressEvent {
    Started {
        total_pages: u32,
    },
    Page {
        page_number: u32,
        progress: u8,
        classification: Classification,
    },
    Completed,
    Failed {
        progress: u8,
        error: String,
    },
    Paused {
        progress: u8,
    },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// No-op reporter for unit tests.
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// Bridges orchestrator events onto the run progress broadcast channel.
pub struct BroadcastProgress {
    tracker: RunProgressTracker,
}

impl BroadcastProgress {
    pub fn new(
        project_id: &str,
        total_pages: u32,
        sender: Arc<broadcast::Sender<RunProgressEvent>>,
    ) -> Self {
        Self {
            tracker: RunProgressTracker::new(project_id, total_pages, sender),
        }
    }
}

impl ProgressReporter for BroadcastProgress {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Started { .. } => self.tracker.started(),
            ProgressEvent::Page {
                page_number,
                progress,
                classification,
            } => self.tracker.page(page_number, progress, classification),
            ProgressEvent::Completed => self.tracker.completed(),
            ProgressEvent::Failed { progress, error } => self.tracker.failed(progress, &error),
            ProgressEvent::Paused { progress } => self.tracker.paused(progress),
        }
    }
}
