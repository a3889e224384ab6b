//! Progress-callback trait for per-job conversion events.
//!
//! Pass an [`Arc<dyn JobProgressCallback>`] to
//! [`crate::orchestrator::Orchestrator::run`] to observe a job as it moves
//! through its stages. The web handler uses [`FlashCollector`] to turn the
//! events into the step messages shown on the result page.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2html::{JobId, JobProgressCallback, JobStage};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//!
//! struct StageCounter(AtomicUsize);
//!
//! impl JobProgressCallback for StageCounter {
//!     fn on_stage(&self, _job: &JobId, _stage: JobStage) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//! ```

use crate::job::{JobId, JobStage};
use crate::language::Language;
use serde::Serialize;
use std::sync::{Arc, Mutex};

/// Shared handle to a progress callback.
pub type ProgressCallback = Arc<dyn JobProgressCallback>;

/// Called by the orchestrator as a job advances.
///
/// All methods have default no-op implementations so callers only override
/// what they care about.
pub trait JobProgressCallback: Send + Sync {
    /// Called after every stage transition, including the initial `Received`.
    fn on_stage(&self, job: &JobId, stage: JobStage) {
        let _ = (job, stage);
    }

    /// Called after each image description.
    ///
    /// # Arguments
    /// * `index` — 1-based position of the image
    /// * `total` — number of extracted images
    fn on_image_described(&self, job: &JobId, index: usize, total: usize) {
        let _ = (job, index, total);
    }

    /// Called after the HTML for one language has been generated.
    fn on_language_complete(&self, job: &JobId, language: Language, index: usize, total: usize) {
        let _ = (job, language, index, total);
    }

    /// Called once when the job fails, with the error message.
    fn on_failure(&self, job: &JobId, error: &str) {
        let _ = (job, error);
    }
}

/// Severity of a flashed message; doubles as the CSS class on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashLevel {
    Info,
    Success,
    Warning,
    Danger,
}

/// A one-off message shown to the user on the next rendered page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn new(level: FlashLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

/// Collects job events as user-facing step messages.
#[derive(Debug, Default)]
pub struct FlashCollector {
    messages: Mutex<Vec<Flash>>,
    images: Mutex<usize>,
    failed_job: Mutex<Option<JobId>>,
}

impl FlashCollector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, level: FlashLevel, message: String) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(Flash::new(level, message));
        }
    }

    /// Messages collected so far, in emission order.
    pub fn messages(&self) -> Vec<Flash> {
        self.messages.lock().map(|m| m.clone()).unwrap_or_default()
    }

    /// Id of the job reported through `on_failure`, if any.
    pub fn failed_job(&self) -> Option<JobId> {
        self.failed_job.lock().ok().and_then(|job| *job)
    }
}

impl JobProgressCallback for FlashCollector {
    fn on_stage(&self, _job: &JobId, stage: JobStage) {
        match stage {
            JobStage::Received => self.push(
                FlashLevel::Info,
                "Step 1: Extracting images and generating alt tags...".into(),
            ),
            JobStage::AltTextGenerated => {
                let count = self.images.lock().map(|n| *n).unwrap_or(0);
                self.push(
                    FlashLevel::Success,
                    format!("Successfully processed {} images.", count),
                );
                self.push(
                    FlashLevel::Info,
                    "Step 2: Generating HTML for each selected language...".into(),
                );
            }
            JobStage::ImagesExtracted | JobStage::HtmlGenerated(_) | JobStage::Assembled => {}
            JobStage::Stored => self.push(FlashLevel::Success, "Conversion complete!".into()),
        }
    }

    fn on_image_described(&self, _job: &JobId, index: usize, _total: usize) {
        if let Ok(mut n) = self.images.lock() {
            *n = index;
        }
    }

    fn on_language_complete(&self, _job: &JobId, language: Language, index: usize, total: usize) {
        self.push(
            FlashLevel::Success,
            format!("HTML generated in {} ({}/{}).", language.name, index, total),
        );
    }

    fn on_failure(&self, job: &JobId, error: &str) {
        if let Ok(mut failed) = self.failed_job.lock() {
            *failed = Some(*job);
        }
        self.push(FlashLevel::Danger, format!("An error occurred: {}", error));
    }
}
