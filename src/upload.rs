//! Upload validation: turn a raw form submission into a [`ValidatedUpload`].
//!
//! Everything here runs on in-memory bytes, before the storage manager is
//! touched. The web layer only builds a `ValidatedUpload` through
//! [`validate`], so the orchestrator never sees a submission from it without
//! a PDF or without at least one language.

use crate::error::ValidationError;
use crate::language::LanguageSelection;
use tracing::debug;

/// The raw multipart submission as extracted by the web handler.
#[derive(Debug, Default, Clone)]
pub struct UploadForm {
    /// `None` when the form had no `pdf_file` part at all.
    pub file_name: Option<String>,
    pub bytes: Vec<u8>,
    /// Repeated `target_languages` values, in submission order.
    pub target_languages: Vec<String>,
}

/// A submission that passed validation.
#[derive(Debug, Clone)]
pub struct ValidatedUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub languages: LanguageSelection,
}

/// Check if a file name carries the `.pdf` extension.
pub fn has_pdf_extension(file_name: &str) -> bool {
    file_name
        .rsplit_once('.')
        .map(|(stem, ext)| !stem.is_empty() && ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// Validate an upload form.
///
/// Order matters for the messages users see: file problems are reported
/// before language problems, matching the field order of the form.
pub fn validate(form: UploadForm) -> Result<ValidatedUpload, ValidationError> {
    let file_name = form.file_name.ok_or(ValidationError::MissingFile)?;
    let file_name = file_name.trim().to_string();
    if file_name.is_empty() {
        return Err(ValidationError::EmptyFilename);
    }
    if !has_pdf_extension(&file_name) {
        return Err(ValidationError::UnsupportedFileType {
            filename: file_name,
        });
    }
    if form.bytes.is_empty() {
        return Err(ValidationError::EmptyFile {
            filename: file_name,
        });
    }
    if !form.bytes.starts_with(b"%PDF") {
        let magic = form.bytes.iter().take(4).copied().collect();
        return Err(ValidationError::NotAPdf {
            filename: file_name,
            magic,
        });
    }

    let languages = LanguageSelection::parse(&form.target_languages)?;

    debug!(
        "Validated upload '{}' ({} bytes) → {}",
        file_name,
        form.bytes.len(),
        languages.display_names()
    );

    Ok(ValidatedUpload {
        file_name,
        bytes: form.bytes,
        languages,
    })
}
