//! Core domain types shared across the crate.
//!
//! Every value that used to travel as an untyped JSON blob in the dashboard
//! (status strings, comparison verdicts, question payloads, settings maps)
//! is a closed type here, so the database rows and the wire responses agree
//! on the allowed vocabulary.

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a comparison project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Paused,
}

impl ProjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectStatus::Pending => "pending",
            ProjectStatus::Processing => "processing",
            ProjectStatus::Completed => "completed",
            ProjectStatus::Failed => "failed",
            ProjectStatus::Paused => "paused",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ProjectStatus::Pending),
            "processing" => Some(ProjectStatus::Processing),
            "completed" => Some(ProjectStatus::Completed),
            "failed" => Some(ProjectStatus::Failed),
            "paused" => Some(ProjectStatus::Paused),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for ProjectStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for ProjectStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        ProjectStatus::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// Four-way verdict for a page pair.
///
/// `New` and `Removed` are determined purely by which side of the pair is
/// present; `Identical`/`Different` follow the judgment function's verdict.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    Identical,
    Different,
    New,
    Removed,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Identical => "identical",
            Classification::Different => "different",
            Classification::New => "new",
            Classification::Removed => "removed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "identical" => Some(Classification::Identical),
            "different" => Some(Classification::Different),
            "new" => Some(Classification::New),
            "removed" => Some(Classification::Removed),
            _ => None,
        }
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ToSql for Classification {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Classification {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        Classification::parse(value.as_str()?).ok_or(FromSqlError::InvalidType)
    }
}

/// Kind of an extracted exam question.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    TrueFalse,
    Essay,
    FillBlank,
}

/// A single exam question extracted from a page image by the vision model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExtractedQuestion {
    /// The question text as it appears on the page.
    pub question: String,
    /// Question kind as reported by the model.
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    /// Answer choices, present for multiple-choice questions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
}

/// Per-project feature flags chosen in the dashboard when the project is
/// created. Stored as JSON in the project row.
///
/// `quick_comparison` and `detailed_report` are persisted and echoed back to
/// the client but do not change how pages are processed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonSettings {
    #[serde(default)]
    pub quick_comparison: bool,
    #[serde(default = "default_true")]
    pub extract_questions: bool,
    #[serde(default = "default_true")]
    pub ocr_analysis: bool,
    #[serde(default = "default_true")]
    pub detailed_report: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ComparisonSettings {
    fn default() -> Self {
        Self {
            quick_comparison: false,
            extract_questions: true,
            ocr_analysis: true,
            detailed_report: true,
        }
    }
}

/// Verdict returned by the judgment function for a page pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PageJudgment {
    /// Self-reported confidence in [0, 1]. Not normalized further.
    pub similarity: f64,
    pub is_identical: bool,
    /// Textual difference notes. Kept for the processing log; not part of
    /// the persisted result row.
    #[serde(default)]
    pub differences: Vec<String>,
}

impl PageJudgment {
    /// Conservative judgment substituted when the vision model's reply
    /// arrives but cannot be parsed. The run continues with this verdict.
    pub fn fallback() -> Self {
        Self {
            similarity: 0.5,
            is_identical: false,
            differences: vec!["could not analyze differences".to_string()],
        }
    }
}
