//! Conversion orchestrator: drives one job through its stages.
//!
//! ```text
//! Received ──▶ ImagesExtracted ──▶ AltTextGenerated ──▶ HtmlGenerated(1..=n)
//!    │              │                    │                     │
//!  store PDF   extract + save      one describe_image     one generate_html
//!               PNG images          call per image         call per language
//!                                                                │
//!                                    Stored ◀── Assembled ◀──────┘
//!                                  <code>.html   finalize each document
//! ```
//!
//! Every stage is awaited before the next begins. The first error aborts
//! the job and is returned as-is; whatever was already written stays in the
//! job directory until the storage sweep removes it.

use crate::client::ModelClient;
use crate::config::ServiceConfig;
use crate::error::Pdf2HtmlError;
use crate::job::{ConversionJob, ConversionResult, ImageAsset, JobId, JobStage, LanguageOutput};
use crate::pipeline::document::DocumentReader;
use crate::pipeline::finalize::{clean_alt_text, document_head, finalize_document};
use crate::progress::ProgressCallback;
use crate::prompts::HtmlRequest;
use crate::storage::{StorageManager, IMAGES_DIR};
use crate::upload::ValidatedUpload;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Explicit context of a conversion: storage, PDF access, model client.
pub struct Orchestrator {
    storage: StorageManager,
    reader: Arc<dyn DocumentReader>,
    client: Arc<dyn ModelClient>,
    alt_text_fallback: Option<String>,
    request_spacing: Duration,
}

impl Orchestrator {
    pub fn new(
        storage: StorageManager,
        reader: Arc<dyn DocumentReader>,
        client: Arc<dyn ModelClient>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            storage,
            reader,
            client,
            alt_text_fallback: config.alt_text_fallback.clone(),
            request_spacing: Duration::from_millis(config.request_spacing_ms),
        }
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Run a validated upload through the whole pipeline.
    ///
    /// Returns the stored result, or the first error. On error the job id
    /// is reported to `progress` via `on_failure` and artifacts are kept.
    pub async fn run(
        &self,
        upload: ValidatedUpload,
        progress: Option<ProgressCallback>,
    ) -> Result<ConversionResult, Pdf2HtmlError> {
        let job_id = JobId::new();
        info!(
            "Starting job {} for '{}' → {}",
            job_id,
            upload.file_name,
            upload.languages.display_names()
        );

        let result = self.run_job(job_id, upload, progress.as_ref()).await;

        if let Err(ref e) = result {
            warn!("Job {} failed: {}", job_id, e);
            if let Some(cb) = progress.as_ref() {
                cb.on_failure(&job_id, &e.to_string());
            }
        }
        result
    }

    async fn run_job(
        &self,
        job_id: JobId,
        upload: ValidatedUpload,
        progress: Option<&ProgressCallback>,
    ) -> Result<ConversionResult, Pdf2HtmlError> {
        let start = Instant::now();
        let emit = |job: &ConversionJob| {
            if let Some(cb) = progress {
                cb.on_stage(&job.id, job.stage());
            }
        };

        // ── Received ─────────────────────────────────────────────────────
        self.storage.allocate(&job_id).await?;
        let upload_path = self
            .storage
            .write_upload(&job_id, &upload.file_name, &upload.bytes)
            .await?;
        let mut job = ConversionJob::new(job_id, upload_path, upload.languages);
        emit(&job);

        // ── ImagesExtracted ──────────────────────────────────────────────
        let extracted = self.reader.extract_images(&job.upload_path).await?;
        let mut images = Vec::with_capacity(extracted.len());
        let mut png_data = Vec::with_capacity(extracted.len());
        for (i, image) in extracted.into_iter().enumerate() {
            let global_index = i + 1;
            let file_name = format!(
                "page_{}_idx_{}_gidx_{}.png",
                image.page_num, image.index_on_page, global_index
            );
            self.storage.write_image(&job.id, &file_name, &image.png).await?;
            images.push(ImageAsset {
                pdf_page_num: image.page_num,
                image_index_on_page: image.index_on_page,
                global_index,
                html_src_path: format!("{}/{}", IMAGES_DIR, file_name),
                file_name,
                alt_text: String::new(),
            });
            png_data.push(image.png);
        }
        job.advance(JobStage::ImagesExtracted)?;
        emit(&job);
        info!("Job {}: extracted {} images", job.id, images.len());

        // ── AltTextGenerated ─────────────────────────────────────────────
        let primary = job.primary_language();
        let total_images = images.len();
        for (i, (asset, png)) in images.iter_mut().zip(&png_data).enumerate() {
            if i > 0 && !self.request_spacing.is_zero() {
                tokio::time::sleep(self.request_spacing).await;
            }
            asset.alt_text = match self.client.describe_image(png, primary).await {
                Ok(raw) => clean_alt_text(&raw),
                Err(e) => match self.alt_text_fallback {
                    Some(ref fallback) => {
                        warn!("Job {}: alt text for {} failed, using fallback: {}", job.id, asset.file_name, e);
                        fallback.clone()
                    }
                    None => return Err(e),
                },
            };
            debug!("Job {}: alt text for {}: '{}'", job.id, asset.file_name, asset.alt_text);
            if let Some(cb) = progress {
                cb.on_image_described(&job.id, i + 1, total_images);
            }
        }
        drop(png_data);
        job.advance(JobStage::AltTextGenerated)?;
        emit(&job);

        // ── HtmlGenerated(per language) ──────────────────────────────────
        let pages = self.reader.read_pages(&job.upload_path).await?;
        let languages = job.languages.languages().to_vec();
        let total_languages = languages.len();
        let mut fragments = Vec::with_capacity(total_languages);
        for (i, language) in languages.iter().copied().enumerate() {
            let head = document_head(&format!("PDF Content ({})", language.name));
            let request = HtmlRequest {
                language,
                primary,
                pages: &pages,
                images: &images,
                head: &head,
            };
            let raw = self.client.generate_html(&request).await?;
            info!("Job {}: generated {} HTML ({} chars)", job.id, language.name, raw.len());
            fragments.push((language, head, raw));
            job.advance(JobStage::HtmlGenerated(i + 1))?;
            emit(&job);
            if let Some(cb) = progress {
                cb.on_language_complete(&job.id, language, i + 1, total_languages);
            }
        }

        // ── Assembled ────────────────────────────────────────────────────
        let documents: Vec<_> = fragments
            .into_iter()
            .map(|(language, head, raw)| (language, finalize_document(&raw, &head, language.code)))
            .collect();
        job.advance(JobStage::Assembled)?;
        emit(&job);

        // ── Stored ───────────────────────────────────────────────────────
        let mut outputs = Vec::with_capacity(documents.len());
        for (language, html) in documents {
            let file_name = format!("{}.html", language.code);
            let path = self.storage.write_output(&job.id, &file_name, &html).await?;
            outputs.push(LanguageOutput {
                language,
                file_name,
                path,
            });
        }
        job.advance(JobStage::Stored)?;
        emit(&job);

        let duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Job {} complete: {} outputs, {} images, {} pages, {}ms",
            job.id,
            outputs.len(),
            images.len(),
            pages.len(),
            duration_ms
        );

        Ok(ConversionResult {
            job_id: job.id,
            primary_language: primary,
            outputs,
            images,
            page_count: pages.len(),
            duration_ms,
        })
    }
}
