//! Batch comparison orchestration: the page-by-page walk over two ordered
//! image sequences.

pub mod error;
pub mod progress;
pub mod runner;

pub use error::CompareError;
pub use progress::{BroadcastProgress, NoopProgress, ProgressEvent, ProgressReporter};
pub use runner::{BatchPolicy, ComparisonRunner, RunOutcome, RunSummary};
