//! # edgequake-pdf2html
//!
//! Web front-end that converts an uploaded PDF into accessible, multilingual
//! HTML documents using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! A PDF is hard to read on a phone, opaque to screen readers and locked to
//! one language. This crate turns it into one HTML file per selected
//! language: text, tables and equations are re-laid out by a VLM that sees
//! both the page renders and the extracted text, and every embedded image
//! gets a generated alt text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! POST /process
//!  │
//!  ├─ 1. Validate   .pdf name, %PDF magic, ≥ 1 target language
//!  ├─ 2. Admit      concurrency permit, cleanup sweep, storage guard
//!  ├─ 3. Store      <root>/<job-uuid>/upload/<name>.pdf
//!  ├─ 4. Images     pdfium image extraction (spawn_blocking) → PNG files
//!  ├─ 5. Alt text   one VLM call per image, primary language
//!  ├─ 6. HTML       one VLM call per language (page text + renders)
//!  ├─ 7. Finalize   fences, doctype, <head>, lang attribute
//!  └─ 8. Output     <code>.html per language, linked from the result page
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2html::{
//!     router, AppState, LlmModelClient, Orchestrator, PdfiumReader, ServiceConfig,
//!     StorageManager,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from GEMINI_API_KEY / OPENAI_API_KEY / …
//!     let config = ServiceConfig::default();
//!     let storage = StorageManager::new(&config.storage_root, config.retention);
//!     storage.initialize().await?;
//!
//!     let reader = Arc::new(PdfiumReader::new(None, config.render_max_pixels));
//!     let client = Arc::new(LlmModelClient::from_config(&config)?);
//!     let orchestrator = Orchestrator::new(storage, reader, client, &config);
//!
//!     let app = router(AppState::new(orchestrator, &config)?);
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2html-server` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod client;
pub mod config;
pub mod error;
pub mod job;
pub mod language;
pub mod orchestrator;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod storage;
pub mod upload;
pub mod views;
pub mod web;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::{LlmModelClient, ModelClient};
pub use config::{ServiceConfig, ServiceConfigBuilder};
pub use error::{ErrorKind, Pdf2HtmlError, ValidationError};
pub use job::{ConversionJob, ConversionResult, ImageAsset, JobId, JobStage, LanguageOutput};
pub use language::{find_language, Language, LanguageSelection, SUPPORTED_LANGUAGES};
pub use orchestrator::Orchestrator;
pub use pipeline::document::{DocumentReader, ExtractedImage, PageContent, PdfiumReader};
pub use progress::{Flash, FlashCollector, FlashLevel, JobProgressCallback, ProgressCallback};
pub use storage::{StorageManager, SweepReport};
pub use upload::{validate, UploadForm, ValidatedUpload};
pub use web::{router, AppState};
