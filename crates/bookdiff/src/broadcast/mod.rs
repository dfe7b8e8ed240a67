//! Broadcasting modules for real-time event streaming.
//!
//! The project row and log table remain the polling source of truth; the
//! broadcast channel is an optional push feed for embedding applications.

pub mod run_progress;

pub use run_progress::{
    RunPhase, RunProgressBroadcaster, RunProgressEvent, RunProgressTracker,
};
