//! Job model: identifiers, lifecycle stages and conversion results.

use crate::error::Pdf2HtmlError;
use crate::language::{Language, LanguageSelection};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier of a conversion job; also the name of its directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.hyphenated().fmt(f)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Lifecycle of a job. Transitions are strictly sequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobStage {
    Received,
    ImagesExtracted,
    AltTextGenerated,
    /// Number of languages whose HTML has been generated so far.
    HtmlGenerated(usize),
    Assembled,
    Stored,
}

impl JobStage {
    fn rank(&self) -> usize {
        match self {
            JobStage::Received => 0,
            JobStage::ImagesExtracted => 1,
            JobStage::AltTextGenerated => 2,
            JobStage::HtmlGenerated(_) => 3,
            JobStage::Assembled => 4,
            JobStage::Stored => 5,
        }
    }

    /// Short label used in logs and progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            JobStage::Received => "received",
            JobStage::ImagesExtracted => "images extracted",
            JobStage::AltTextGenerated => "alt text generated",
            JobStage::HtmlGenerated(_) => "html generated",
            JobStage::Assembled => "assembled",
            JobStage::Stored => "stored",
        }
    }
}

/// One user-submitted conversion request.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: JobId,
    pub upload_path: PathBuf,
    pub languages: LanguageSelection,
    stage: JobStage,
}

impl ConversionJob {
    /// A freshly received job whose upload has been stored at `upload_path`.
    pub fn new(id: JobId, upload_path: PathBuf, languages: LanguageSelection) -> Self {
        Self {
            id,
            upload_path,
            languages,
            stage: JobStage::Received,
        }
    }

    pub fn stage(&self) -> JobStage {
        self.stage
    }

    pub fn primary_language(&self) -> Language {
        self.languages.primary()
    }

    /// Move to the next stage.
    ///
    /// Allowed moves: to the immediately following stage, or
    /// `HtmlGenerated(n)` → `HtmlGenerated(n + 1)` while fewer than all
    /// languages are done. `HtmlGenerated` must cover every language before
    /// `Assembled`.
    pub fn advance(&mut self, to: JobStage) -> Result<(), Pdf2HtmlError> {
        let from = self.stage;
        let total = self.languages.len();
        let ok = match (from, to) {
            (JobStage::AltTextGenerated, JobStage::HtmlGenerated(1)) => true,
            (JobStage::HtmlGenerated(done), JobStage::HtmlGenerated(next)) => {
                next == done + 1 && next <= total
            }
            (JobStage::HtmlGenerated(done), JobStage::Assembled) => done == total,
            (_, JobStage::HtmlGenerated(_)) | (JobStage::HtmlGenerated(_), _) => false,
            _ => to.rank() == from.rank() + 1,
        };
        if !ok {
            return Err(Pdf2HtmlError::Internal(format!(
                "job {}: invalid stage transition {:?} → {:?}",
                self.id, from, to
            )));
        }
        self.stage = to;
        Ok(())
    }
}

/// An image extracted from the PDF and described by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageAsset {
    /// 1-based page number.
    pub pdf_page_num: usize,
    /// 1-based position of the image on its page.
    pub image_index_on_page: usize,
    /// 1-based position across the whole document.
    #[serde(skip)]
    pub global_index: usize,
    #[serde(skip)]
    pub file_name: String,
    /// Path relative to the generated HTML documents.
    pub html_src_path: String,
    pub alt_text: String,
}

/// One stored HTML document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LanguageOutput {
    pub language: Language,
    /// File name inside the job directory, e.g. `fr.html`.
    pub file_name: String,
    #[serde(skip)]
    pub path: PathBuf,
}

/// Everything a finished job produced.
#[derive(Debug, Clone, Serialize)]
pub struct ConversionResult {
    pub job_id: JobId,
    pub primary_language: Language,
    /// One entry per selected language, in selection order.
    pub outputs: Vec<LanguageOutput>,
    pub images: Vec<ImageAsset>,
    pub page_count: usize,
    pub duration_ms: u64,
}

impl ConversionResult {
    /// The output written for the primary language.
    pub fn primary_output(&self) -> Option<&LanguageOutput> {
        self.outputs
            .iter()
            .find(|o| o.language == self.primary_language)
    }
}
