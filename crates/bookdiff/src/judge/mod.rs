//! Page judgment capability: the external vision-model call abstraction.
//!
//! The orchestrator never talks to a vendor API directly; it goes through
//! the [`PageJudge`] trait so the comparison loop stays testable with a
//! deterministic stub. The production implementation is [`GeminiJudge`].

pub mod gemini;

pub use gemini::GeminiJudge;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{ExtractedQuestion, PageJudgment};

/// An image handed to the judge: raw bytes plus MIME type.
#[derive(Debug, Clone, Copy)]
pub struct PageImage<'a> {
    pub bytes: &'a [u8],
    pub mime_type: &'a str,
}

/// Errors from judgment calls.
///
/// `Unparseable` means the model replied but not in the expected shape;
/// callers substitute a conservative fallback and keep going. Every other
/// variant is a transport-level failure and aborts the run.
#[derive(Debug, Error)]
pub enum JudgeError {
    #[error("Judge request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Judge returned HTTP {status}: {body}")]
    BadStatus { status: u16, body: String },

    #[error("Judge response could not be parsed: {reason}")]
    Unparseable { reason: String },
}

impl JudgeError {
    /// Whether a caller may substitute a fallback judgment and continue.
    pub fn is_unparseable(&self) -> bool {
        matches!(self, JudgeError::Unparseable { .. })
    }
}

/// The external vision-model capability, one call per image (pair).
#[async_trait]
pub trait PageJudge: Send + Sync {
    /// Compares two page images and returns a similarity verdict.
    async fn compare_pages(
        &self,
        old: PageImage<'_>,
        new: PageImage<'_>,
    ) -> Result<PageJudgment, JudgeError>;

    /// Extracts the full text of one page image.
    async fn extract_text(&self, image: PageImage<'_>) -> Result<String, JudgeError>;

    /// Extracts exam questions found on one page image.
    async fn extract_questions(
        &self,
        image: PageImage<'_>,
    ) -> Result<Vec<ExtractedQuestion>, JudgeError>;
}
