//! Error types for the edgequake-pdf2html service.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`ValidationError`] — **User-facing**: the submitted form is unusable
//!   (no file, not a PDF, no language). Raised before any storage write or
//!   model call and shown to the user as a flashed message.
//!
//! * [`Pdf2HtmlError`] — **Job-fatal**: a conversion could not be completed.
//!   Returned as `Err(Pdf2HtmlError)` from the orchestrator. The web layer
//!   uses [`Pdf2HtmlError::kind`] to pick the response.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with a submitted upload form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The multipart body had no `pdf_file` part.
    #[error("No file part")]
    MissingFile,

    /// A file part was present but no file was chosen.
    #[error("No selected file")]
    EmptyFilename,

    /// The file name does not end in `.pdf`.
    #[error("Invalid file type '{filename}'. Only PDF files are allowed.")]
    UnsupportedFileType { filename: String },

    /// The uploaded file has zero bytes.
    #[error("The uploaded file '{filename}' is empty.")]
    EmptyFile { filename: String },

    /// The file claims to be a PDF but lacks the `%PDF` header.
    #[error("The uploaded file '{filename}' is not a valid PDF (first bytes: {magic:?}).")]
    NotAPdf { filename: String, magic: Vec<u8> },

    /// No `target_languages` value was submitted.
    #[error("Please select at least one target language.")]
    NoLanguageSelected,

    /// A submitted language code is not in the supported set.
    #[error("Unsupported target language '{code}'.")]
    UnsupportedLanguage { code: String },

    /// The multipart body could not be parsed.
    #[error("Malformed upload form: {0}")]
    MalformedForm(String),
}

/// Coarse classification of [`Pdf2HtmlError`] used by the web layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Document,
    ExternalService,
    Storage,
    Capacity,
    Internal,
}

/// All fatal errors of a conversion job.
#[derive(Debug, Error)]
pub enum Pdf2HtmlError {
    // ── Validation ────────────────────────────────────────────────────────
    #[error(transparent)]
    Validation(#[from] ValidationError),

    // ── Document errors ───────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password; uploads cannot carry one.
    #[error("PDF '{path}' is encrypted and requires a password.")]
    PasswordRequired { path: PathBuf },

    /// pdfium failed while extracting or rendering a page.
    #[error("Page {page}: extraction failed: {detail}")]
    ExtractionFailed { page: usize, detail: String },

    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\
Set PDFIUM_LIB_PATH to the directory containing libpdfium."
    )]
    PdfiumBindingFailed(String),

    // ── External service errors ───────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The model API failed after all retries.
    #[error("{stage} request failed after {retries} retries: {message}")]
    ExternalService {
        stage: &'static str,
        retries: u32,
        message: String,
    },

    /// The model API did not answer in time.
    #[error("{stage} request timed out after {secs}s")]
    ApiTimeout { stage: &'static str, secs: u64 },

    // ── Storage errors ────────────────────────────────────────────────────
    /// Could not create a directory or write a file.
    #[error("Failed to write '{path}': {source}")]
    StorageWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not read a stored file or directory.
    #[error("Failed to read '{path}': {source}")]
    StorageRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Capacity ──────────────────────────────────────────────────────────
    /// Too many conversions are already running.
    #[error("The server is busy with {limit} conversions. Please try again shortly.")]
    Busy { limit: usize },

    /// Storage root usage is above the configured ceiling even after a sweep.
    #[error("Storage might be low ({used_mb} MB used of {limit_mb} MB). Please wait a few minutes and try again, or use a smaller PDF.")]
    StorageFull { used_mb: u64, limit_mb: u64 },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2HtmlError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2HtmlError::Validation(_) => ErrorKind::Validation,
            Pdf2HtmlError::CorruptPdf { .. }
            | Pdf2HtmlError::PasswordRequired { .. }
            | Pdf2HtmlError::ExtractionFailed { .. }
            | Pdf2HtmlError::PdfiumBindingFailed(_) => ErrorKind::Document,
            Pdf2HtmlError::ProviderNotConfigured { .. }
            | Pdf2HtmlError::ExternalService { .. }
            | Pdf2HtmlError::ApiTimeout { .. } => ErrorKind::ExternalService,
            Pdf2HtmlError::StorageWrite { .. } | Pdf2HtmlError::StorageRead { .. } => {
                ErrorKind::Storage
            }
            Pdf2HtmlError::Busy { .. } | Pdf2HtmlError::StorageFull { .. } => ErrorKind::Capacity,
            Pdf2HtmlError::InvalidConfig(_) | Pdf2HtmlError::Internal(_) => ErrorKind::Internal,
        }
    }
}
