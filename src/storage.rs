//! Storage manager: per-job directories under a single root, TTL cleanup.
//!
//! ## Layout
//!
//! ```text
//! <root>/
//!  └─ <job-uuid>/
//!      ├─ upload/<sanitised-name>.pdf
//!      ├─ extracted_images/page_1_idx_1_gidx_1.png
//!      ├─ en.html
//!      └─ fr.html
//! ```
//!
//! Job directories never overlap, so no locking is needed. The sweep only
//! removes directories whose name is a UUID and whose age exceeds the
//! retention window; a job being written right now is always younger than
//! that window and therefore never touched.

use crate::error::Pdf2HtmlError;
use crate::job::JobId;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Sub-directory holding the original upload.
pub const UPLOAD_DIR: &str = "upload";
/// Sub-directory holding extracted images, referenced from the HTML.
pub const IMAGES_DIR: &str = "extracted_images";

/// Outcome of one cleanup pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub removed: Vec<String>,
    pub retained: usize,
    /// Entries that are not job directories.
    pub skipped: usize,
    /// Job directories that were due but could not be removed.
    pub failed: usize,
}

/// Owns the storage root.
#[derive(Debug, Clone)]
pub struct StorageManager {
    root: PathBuf,
    retention: Duration,
}

impl StorageManager {
    pub fn new(root: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            root: root.into(),
            retention,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// Create the storage root if it does not exist yet.
    pub async fn initialize(&self) -> Result<(), Pdf2HtmlError> {
        create_dir(&self.root).await
    }

    pub fn job_dir(&self, job_id: &JobId) -> PathBuf {
        self.root.join(job_id.to_string())
    }

    pub fn images_dir(&self, job_id: &JobId) -> PathBuf {
        self.job_dir(job_id).join(IMAGES_DIR)
    }

    /// Create the isolated directory of a new job.
    pub async fn allocate(&self, job_id: &JobId) -> Result<PathBuf, Pdf2HtmlError> {
        let dir = self.job_dir(job_id);
        create_dir(&dir.join(UPLOAD_DIR)).await?;
        debug!("Allocated job directory {}", dir.display());
        Ok(dir)
    }

    /// Persist the uploaded PDF; returns its path.
    pub async fn write_upload(
        &self,
        job_id: &JobId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, Pdf2HtmlError> {
        let name = sanitize_filename(file_name);
        let path = self.job_dir(job_id).join(UPLOAD_DIR).join(name);
        write_atomic(&path, bytes).await?;
        info!("Stored upload {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Persist one extracted image.
    pub async fn write_image(
        &self,
        job_id: &JobId,
        file_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf, Pdf2HtmlError> {
        let path = self.images_dir(job_id).join(sanitize_filename(file_name));
        write_atomic(&path, bytes).await?;
        Ok(path)
    }

    /// Persist one finished HTML document.
    pub async fn write_output(
        &self,
        job_id: &JobId,
        file_name: &str,
        html: &str,
    ) -> Result<PathBuf, Pdf2HtmlError> {
        let path = self.job_dir(job_id).join(sanitize_filename(file_name));
        write_atomic(&path, html.as_bytes()).await?;
        Ok(path)
    }

    /// Remove job directories older than the retention window.
    pub async fn sweep(&self) -> SweepReport {
        self.sweep_at(SystemTime::now()).await
    }

    /// Same as [`sweep`](Self::sweep) with an explicit notion of "now".
    ///
    /// Never fails: unreadable entries and deletion errors are logged and
    /// counted so the request that triggered the sweep can carry on.
    pub async fn sweep_at(&self, now: SystemTime) -> SweepReport {
        let mut report = SweepReport::default();

        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return report,
            Err(e) => {
                warn!("Cannot scan storage root {}: {}", self.root.display(), e);
                return report;
            }
        };

        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    warn!("Error while scanning {}: {}", self.root.display(), e);
                    break;
                }
            };

            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();

            let metadata = match entry.metadata().await {
                Ok(m) => m,
                Err(e) => {
                    warn!("Cannot stat {}: {}", path.display(), e);
                    report.skipped += 1;
                    continue;
                }
            };
            if !metadata.is_dir() || name.parse::<JobId>().is_err() {
                debug!("Skipping non-job entry {}", path.display());
                report.skipped += 1;
                continue;
            }

            let expired = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age > self.retention)
                .unwrap_or(false);

            if !expired {
                report.retained += 1;
                continue;
            }

            match tokio::fs::remove_dir_all(&path).await {
                Ok(()) => {
                    info!("Removed stale job directory {}", path.display());
                    report.removed.push(name);
                }
                Err(e) => {
                    warn!("Failed to remove {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        debug!(
            "Sweep complete: {} removed, {} retained, {} skipped, {} failed",
            report.removed.len(),
            report.retained,
            report.skipped,
            report.failed
        );
        report
    }

    /// Total size in bytes of all files under the root.
    pub async fn usage_bytes(&self) -> u64 {
        let root = self.root.clone();
        tokio::task::spawn_blocking(move || {
            WalkDir::new(&root)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .await
        .unwrap_or(0)
    }

    /// Map a request path onto a stored, publicly reachable artifact.
    ///
    /// Reachable: `<name>.html` at the job root and any file directly under
    /// `extracted_images/`. Returns `None` for anything else, including the
    /// uploaded PDF, traversal attempts, and files that no longer exist.
    pub fn resolve_artifact(&self, job_id: &str, relative: &str) -> Option<PathBuf> {
        let job_id: JobId = job_id.parse().ok()?;
        let rel = Path::new(relative);

        let parts: Vec<&str> = rel
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<Vec<_>>>()?;

        let allowed = match parts.as_slice() {
            [file] => file.ends_with(".html"),
            [dir, file] => *dir == IMAGES_DIR && !file.is_empty(),
            _ => false,
        };
        if !allowed {
            return None;
        }

        let path = self.job_dir(&job_id).join(rel);
        path.is_file().then_some(path)
    }
}

/// Reduce a user-supplied file name to a safe single path component.
///
/// Directory parts are dropped, characters outside `[A-Za-z0-9._-]` become
/// `_`, and leading dots are removed so the result can never be hidden or
/// refer to a parent directory.
pub fn sanitize_filename(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or("");
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.').to_string();
    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

async fn create_dir(path: &Path) -> Result<(), Pdf2HtmlError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|e| Pdf2HtmlError::StorageWrite {
            path: path.to_path_buf(),
            source: e,
        })
}

/// Write to a temp file next to `path`, then rename over it.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), Pdf2HtmlError> {
    if let Some(parent) = path.parent() {
        create_dir(parent).await?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, bytes)
        .await
        .map_err(|e| Pdf2HtmlError::StorageWrite {
            path: path.to_path_buf(),
            source: e,
        })?;

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Pdf2HtmlError::StorageWrite {
            path: path.to_path_buf(),
            source: e,
        })
}
