//! The batch comparison orchestrator.
//!
//! One run walks the two ordered page-image sequences pairwise, classifies
//! each page, invokes the judge where needed, and persists one result row
//! plus a progress update per page before moving to the next. Rows and
//! progress for page `i` are committed before page `i+1` starts, so a
//! polling reader never observes a later page's effect first.

use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::db::log_repo::{self, LogRow};
use crate::db::project_repo;
use crate::db::result_repo::{self, ResultRow};
use crate::db::Database;
use crate::judge::{PageImage, PageJudge};
use crate::model::{Classification, ComparisonSettings, PageJudgment, ProjectStatus};
use crate::storage::ImageStore;

use super::error::CompareError;
use super::progress::{ProgressEvent, ProgressReporter};

/// Rate-limit batching: pages are processed in fixed-size batches with a
/// short pause between batches. Purely to respect the judge's rate limits,
/// not for correctness.
#[derive(Debug, Clone, Copy)]
pub struct BatchPolicy {
    pub batch_size: usize,
    pub batch_pause: Duration,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self {
            batch_size: 5,
            batch_pause: Duration::from_millis(1000),
        }
    }
}

/// How a run ended when it did not error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    /// A pause request was observed between pages; the pages processed so
    /// far are persisted and the project is left in `paused`.
    Paused,
}

/// Terminal result of a run: outcome plus the rows persisted during it.
#[derive(Debug)]
pub struct RunSummary {
    pub outcome: RunOutcome,
    pub results: Vec<ResultRow>,
}

/// Per-classification counters for the completion log entry.
#[derive(Debug, Default)]
struct Tally {
    identical: u32,
    different: u32,
    new: u32,
    removed: u32,
    questions: usize,
}

impl Tally {
    fn bump(&mut self, row: &ResultRow) {
        match row.comparison_type {
            Classification::Identical => self.identical += 1,
            Classification::Different => self.different += 1,
            Classification::New => self.new += 1,
            Classification::Removed => self.removed += 1,
        }
        self.questions += row.questions_extracted.len();
    }
}

/// Outcome of the page loop before terminal transitions are applied.
struct PageLoop {
    results: Vec<ResultRow>,
    tally: Tally,
    paused: bool,
}

/// A page image pulled from the store, ready to hand to the judge.
struct LoadedImage {
    bytes: Vec<u8>,
    mime_type: String,
}

impl LoadedImage {
    fn as_page(&self) -> PageImage<'_> {
        PageImage {
            bytes: &self.bytes,
            mime_type: &self.mime_type,
        }
    }
}

pub struct ComparisonRunner {
    db: Database,
    store: ImageStore,
    judge: Arc<dyn PageJudge>,
    batch: BatchPolicy,
}

impl ComparisonRunner {
    pub fn new(db: Database, store: ImageStore, judge: Arc<dyn PageJudge>) -> Self {
        Self {
            db,
            store,
            judge,
            batch: BatchPolicy::default(),
        }
    }

    pub fn with_batch_policy(mut self, batch: BatchPolicy) -> Self {
        self.batch = batch;
        self
    }

    /// Runs one full comparison pass for a project.
    ///
    /// Pre-flight rejections (empty input, unknown project, active run)
    /// leave no persisted trace. Once started, the run ends in `completed`,
    /// `paused`, or `failed`; rows written before a failure remain.
    #[instrument(skip_all, fields(project_id = %project_id, old = old_paths.len(), new = new_paths.len()))]
    pub async fn run(
        &self,
        project_id: &str,
        old_paths: &[String],
        new_paths: &[String],
        progress: &dyn ProgressReporter,
    ) -> Result<RunSummary, CompareError> {
        if old_paths.is_empty() && new_paths.is_empty() {
            return Err(CompareError::InvalidInput(
                "no page images to compare".to_string(),
            ));
        }

        let project = project_repo::find_by_id(&self.db, project_id)?
            .ok_or_else(|| CompareError::ProjectNotFound(project_id.to_string()))?;
        if project.status == ProjectStatus::Processing {
            return Err(CompareError::RunActive {
                project_id: project_id.to_string(),
                status: project.status,
            });
        }

        let settings = project.settings;
        let total = old_paths.len().max(new_paths.len()) as u32;

        self.append_log(
            project_id,
            "image_comparison",
            "Comparison run started",
            json!({
                "old_images": old_paths.len(),
                "new_images": new_paths.len(),
            }),
        )?;
        // A fresh pass replaces any prior report for this project.
        result_repo::delete_by_project(&self.db, project_id)?;
        project_repo::start_run(&self.db, project_id, &now_rfc3339())?;
        progress.report(ProgressEvent::Started { total_pages: total });
        info!(total, "comparison run started");

        match self
            .process_pages(project_id, &settings, old_paths, new_paths, total, progress)
            .await
        {
            Ok(outcome) if !outcome.paused => {
                let PageLoop { results, tally, .. } = outcome;
                project_repo::mark_completed(&self.db, project_id, &now_rfc3339())?;
                self.append_log(
                    project_id,
                    "completion",
                    "Comparison completed successfully",
                    json!({
                        "total_results": results.len(),
                        "identical": tally.identical,
                        "different": tally.different,
                        "new": tally.new,
                        "removed": tally.removed,
                        "extracted_questions": tally.questions,
                    }),
                )?;
                progress.report(ProgressEvent::Completed);
                info!(results = results.len(), "comparison run completed");
                Ok(RunSummary {
                    outcome: RunOutcome::Completed,
                    results,
                })
            }
            Ok(outcome) => {
                let PageLoop { results, .. } = outcome;
                let frozen = percent(results.len() as u32, total);
                self.append_log(
                    project_id,
                    "pause",
                    "Comparison paused by request",
                    json!({
                        "completed_pages": results.len(),
                        "total_pages": total,
                    }),
                )?;
                progress.report(ProgressEvent::Paused { progress: frozen });
                warn!(completed = results.len(), "comparison run paused");
                Ok(RunSummary {
                    outcome: RunOutcome::Paused,
                    results,
                })
            }
            Err(e) => {
                // Remaining pages are abandoned; rows already written stay.
                if let Err(db_err) = project_repo::mark_failed(&self.db, project_id, &now_rfc3339())
                {
                    error!(error = %db_err, "could not mark project failed");
                }
                if let Err(log_err) = self.append_log(
                    project_id,
                    "failure",
                    "Comparison run failed",
                    json!({ "error": e.to_string() }),
                ) {
                    error!(error = %log_err, "could not write failure log entry");
                }
                let frozen = project_repo::find_by_id(&self.db, project_id)
                    .ok()
                    .flatten()
                    .map(|p| p.progress)
                    .unwrap_or(0);
                progress.report(ProgressEvent::Failed {
                    progress: frozen,
                    error: e.to_string(),
                });
                error!(error = %e, "comparison run failed");
                Err(e)
            }
        }
    }

    async fn process_pages(
        &self,
        project_id: &str,
        settings: &ComparisonSettings,
        old_paths: &[String],
        new_paths: &[String],
        total: u32,
        progress: &dyn ProgressReporter,
    ) -> Result<PageLoop, CompareError> {
        let mut results: Vec<ResultRow> = Vec::with_capacity(total as usize);
        let mut tally = Tally::default();
        let batch_size = self.batch.batch_size.max(1);

        for index in 0..total as usize {
            if index > 0 {
                // Pause requests take effect between pages, never mid-page.
                if project_repo::status(&self.db, project_id)? == Some(ProjectStatus::Paused) {
                    return Ok(PageLoop {
                        results,
                        tally,
                        paused: true,
                    });
                }
                if index % batch_size == 0 && !self.batch.batch_pause.is_zero() {
                    tokio::time::sleep(self.batch.batch_pause).await;
                }
            }

            let page_number = index as u32 + 1;
            let row = self
                .process_page(
                    project_id,
                    settings,
                    page_number,
                    old_paths.get(index),
                    new_paths.get(index),
                )
                .await?;

            tally.bump(&row);
            result_repo::insert(&self.db, &row)?;

            let pct = percent(page_number, total);
            project_repo::set_progress(&self.db, project_id, pct, &now_rfc3339())?;
            progress.report(ProgressEvent::Page {
                page_number,
                progress: pct,
                classification: row.comparison_type,
            });
            results.push(row);
        }

        Ok(PageLoop {
            results,
            tally,
            paused: false,
        })
    }

    /// Classifies and judges one page, returning the assembled (not yet
    /// persisted) result row.
    async fn process_page(
        &self,
        project_id: &str,
        settings: &ComparisonSettings,
        page_number: u32,
        old_ref: Option<&String>,
        new_ref: Option<&String>,
    ) -> Result<ResultRow, CompareError> {
        let old_image = old_ref.map(|r| self.load(r)).transpose()?;
        let new_image = new_ref.map(|r| self.load(r)).transpose()?;

        let (classification, similarity, judgment) = match (&old_image, &new_image) {
            (None, Some(_)) => (Classification::New, 0.0, None),
            (Some(_), None) => (Classification::Removed, 0.0, None),
            (Some(old), Some(new)) => {
                let judgment = match self.judge.compare_pages(old.as_page(), new.as_page()).await {
                    Ok(judgment) => judgment,
                    Err(e) if e.is_unparseable() => {
                        warn!(page = page_number, error = %e, "judgment unparseable, using fallback");
                        PageJudgment::fallback()
                    }
                    Err(e) => return Err(e.into()),
                };
                let classification = if judgment.is_identical {
                    Classification::Identical
                } else {
                    Classification::Different
                };
                (classification, judgment.similarity, Some(judgment))
            }
            (None, None) => unreachable!("page index bounded by max(old, new)"),
        };

        // Newly introduced questions live on the new side: extract for new
        // pages and for changed pages.
        let questions = if settings.extract_questions
            && matches!(
                classification,
                Classification::New | Classification::Different
            ) {
            match &new_image {
                Some(new) => match self.judge.extract_questions(new.as_page()).await {
                    Ok(questions) => questions,
                    Err(e) if e.is_unparseable() => {
                        warn!(page = page_number, error = %e, "question extraction unparseable, skipping");
                        Vec::new()
                    }
                    Err(e) => return Err(e.into()),
                },
                None => Vec::new(),
            }
        } else {
            Vec::new()
        };

        let (ocr_text_old, ocr_text_new) = if settings.ocr_analysis {
            (
                self.extract_text_opt(&old_image, page_number).await?,
                self.extract_text_opt(&new_image, page_number).await?,
            )
        } else {
            (None, None)
        };

        // Difference notes are not part of the result row; changed pages get
        // a log entry so they survive for the audit trail.
        if let Some(judgment) = &judgment {
            if !judgment.is_identical {
                self.append_log(
                    project_id,
                    "page",
                    &format!("Page {} differs", page_number),
                    json!({
                        "page_number": page_number,
                        "similarity": judgment.similarity,
                        "differences": judgment.differences,
                    }),
                )?;
            }
        }

        Ok(ResultRow {
            id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            page_number,
            old_page_path: old_ref.cloned(),
            new_page_path: new_ref.cloned(),
            comparison_type: classification,
            similarity_score: similarity,
            ocr_text_old,
            ocr_text_new,
            questions_extracted: questions,
            created_at: now_rfc3339(),
        })
    }

    async fn extract_text_opt(
        &self,
        image: &Option<LoadedImage>,
        page_number: u32,
    ) -> Result<Option<String>, CompareError> {
        match image {
            Some(image) => match self.judge.extract_text(image.as_page()).await {
                Ok(text) => Ok(Some(text)),
                Err(e) if e.is_unparseable() => {
                    warn!(page = page_number, error = %e, "text extraction unparseable, leaving text absent");
                    Ok(None)
                }
                Err(e) => Err(e.into()),
            },
            None => Ok(None),
        }
    }

    fn load(&self, path_ref: &str) -> Result<LoadedImage, CompareError> {
        let bytes = self.store.download(path_ref)?;
        let mime_type = mime_guess::from_path(path_ref)
            .first()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "image/jpeg".to_string());
        Ok(LoadedImage { bytes, mime_type })
    }

    fn append_log(
        &self,
        project_id: &str,
        phase: &str,
        message: &str,
        details: serde_json::Value,
    ) -> Result<(), CompareError> {
        log_repo::append(
            &self.db,
            &LogRow {
                id: Uuid::new_v4().to_string(),
                project_id: project_id.to_string(),
                phase: phase.to_string(),
                message: message.to_string(),
                details,
                created_at: now_rfc3339(),
            },
        )?;
        Ok(())
    }
}

/// Integer progress percentage after `done` of `total` pages, rounded
/// half-up. Monotonic in `done`.
fn percent(done: u32, total: u32) -> u8 {
    ((done as f64 / total as f64) * 100.0).round() as u8
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
