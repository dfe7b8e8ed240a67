//! Deterministic judge double for integration tests.
//!
//! Each method pops the next scripted reply; when the script runs dry the
//! method falls back to a benign default (identical pages, empty question
//! list, fixed text). Call counters let tests assert which pages actually
//! reached the judge.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use bookdiff::judge::{JudgeError, PageImage, PageJudge};
use bookdiff::model::{ExtractedQuestion, PageJudgment};

type CompareHook = Box<dyn Fn(usize) + Send + Sync>;

#[derive(Default)]
pub struct ScriptedJudge {
    compare_script: Mutex<VecDeque<Result<PageJudgment, JudgeError>>>,
    questions_script: Mutex<VecDeque<Result<Vec<ExtractedQuestion>, JudgeError>>>,
    text_script: Mutex<VecDeque<Result<String, JudgeError>>>,
    pub compare_calls: AtomicUsize,
    pub text_calls: AtomicUsize,
    pub questions_calls: AtomicUsize,
    compare_hook: Mutex<Option<CompareHook>>,
}

impl ScriptedJudge {
    pub fn new() -> Self {
        Self::default()
    }

    /// A judgment declaring the pair identical.
    pub fn identical(similarity: f64) -> PageJudgment {
        PageJudgment {
            similarity,
            is_identical: true,
            differences: vec![],
        }
    }

    /// A judgment declaring the pair different, with difference notes.
    pub fn different(similarity: f64, notes: &[&str]) -> PageJudgment {
        PageJudgment {
            similarity,
            is_identical: false,
            differences: notes.iter().map(|n| n.to_string()).collect(),
        }
    }

    pub fn push_compare(&self, reply: Result<PageJudgment, JudgeError>) {
        self.compare_script.lock().unwrap().push_back(reply);
    }

    pub fn push_questions(&self, reply: Result<Vec<ExtractedQuestion>, JudgeError>) {
        self.questions_script.lock().unwrap().push_back(reply);
    }

    pub fn push_text(&self, reply: Result<String, JudgeError>) {
        self.text_script.lock().unwrap().push_back(reply);
    }

    /// Registers a hook invoked with the (1-based) compare call number
    /// before the scripted reply is returned. Used to inject pause requests
    /// mid-run.
    pub fn on_compare(&self, hook: impl Fn(usize) + Send + Sync + 'static) {
        *self.compare_hook.lock().unwrap() = Some(Box::new(hook));
    }
}

#[async_trait]
impl PageJudge for ScriptedJudge {
    async fn compare_pages(
        &self,
        _old: PageImage<'_>,
        _new: PageImage<'_>,
    ) -> Result<PageJudgment, JudgeError> {
        let call = self.compare_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(hook) = self.compare_hook.lock().unwrap().as_ref() {
            hook(call);
        }
        self.compare_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Self::identical(0.98)))
    }

    async fn extract_text(&self, _image: PageImage<'_>) -> Result<String, JudgeError> {
        self.text_calls.fetch_add(1, Ordering::SeqCst);
        self.text_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("extracted page text".to_string()))
    }

    async fn extract_questions(
        &self,
        _image: PageImage<'_>,
    ) -> Result<Vec<ExtractedQuestion>, JudgeError> {
        self.questions_calls.fetch_add(1, Ordering::SeqCst);
        self.questions_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(vec![]))
    }
}
