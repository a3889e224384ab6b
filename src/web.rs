//! HTTP surface: upload form, conversion endpoint and artifact serving.
//!
//! | Route | Purpose |
//! |-------|---------|
//! | `GET /` | upload form |
//! | `POST /process` | validate, admit, convert, render result |
//! | `GET /output/{job_id}/{*path}` | stored HTML output or extracted image |
//! | `GET /download/{job_id}/{file}` | stored HTML output as an attachment |
//! | `GET /health` | liveness probe |
//!
//! A conversion runs inside the request that submitted it. Admission is
//! bounded by a semaphore; excess submissions are refused immediately
//! rather than queued.

use crate::config::ServiceConfig;
use crate::error::{ErrorKind, Pdf2HtmlError, ValidationError};
use crate::orchestrator::Orchestrator;
use crate::progress::{Flash, FlashCollector, FlashLevel, ProgressCallback};
use crate::storage::{sanitize_filename, StorageManager};
use crate::upload::{validate, UploadForm};
use crate::views::Views;
use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Request, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

const CLEANED_UP: &str =
    "The requested file seems to have been cleaned up or does not exist. Please try converting again.";

/// Shared state of all handlers.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<Orchestrator>,
    views: Arc<Views>,
    jobs: Arc<Semaphore>,
    max_concurrent_jobs: usize,
    max_storage_bytes: Option<u64>,
    max_upload_bytes: usize,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: &ServiceConfig) -> Result<Self, Pdf2HtmlError> {
        let views = Views::new(config.max_upload_bytes, config.retention)
            .map_err(|e| Pdf2HtmlError::Internal(format!("Failed to load templates: {}", e)))?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            views: Arc::new(views),
            jobs: Arc::new(Semaphore::new(config.max_concurrent_jobs)),
            max_concurrent_jobs: config.max_concurrent_jobs,
            max_storage_bytes: config.max_storage_bytes,
            max_upload_bytes: config.max_upload_bytes,
        })
    }

    fn storage(&self) -> &StorageManager {
        self.orchestrator.storage()
    }

    /// The upload form with `flashes`, answered with `status`.
    fn form(&self, status: StatusCode, flashes: &[Flash]) -> Response {
        match self.views.index(flashes) {
            Ok(html) => (status, Html(html)).into_response(),
            Err(e) => template_failure(e),
        }
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;
    Router::new()
        .route("/", get(index))
        .route("/process", post(process))
        .route("/output/{job_id}/{*path}", get(output))
        .route("/download/{job_id}/{file}", get(download))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    state.form(StatusCode::OK, &[])
}

async fn health() -> &'static str {
    "ok"
}

async fn process(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err((status, e)) => {
            warn!("Rejected upload form: {}", e);
            return state.form(status, &[Flash::new(FlashLevel::Danger, e.to_string())]);
        }
    };

    let upload = match validate(form) {
        Ok(upload) => upload,
        Err(e) => {
            info!("Upload failed validation: {}", e);
            return state.form(
                StatusCode::BAD_REQUEST,
                &[Flash::new(FlashLevel::Danger, e.to_string())],
            );
        }
    };

    let _permit = match Arc::clone(&state.jobs).try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            return refuse(
                &state,
                Pdf2HtmlError::Busy {
                    limit: state.max_concurrent_jobs,
                },
            )
        }
    };

    let report = state.storage().sweep().await;
    if !report.removed.is_empty() {
        info!("Cleaned up {} stale job directories", report.removed.len());
    }
    if let Some(limit) = state.max_storage_bytes {
        let used = state.storage().usage_bytes().await;
        if used > limit {
            return refuse(
                &state,
                Pdf2HtmlError::StorageFull {
                    used_mb: used / (1024 * 1024),
                    limit_mb: limit / (1024 * 1024),
                },
            );
        }
    }

    let flashes = FlashCollector::new();
    let progress: ProgressCallback = flashes.clone();
    match state.orchestrator.run(upload, Some(progress)).await {
        Ok(result) => match state.views.result(&result, &flashes.messages()) {
            Ok(html) => Html(html).into_response(),
            Err(e) => template_failure(e),
        },
        Err(e) => match state.views.failure(flashes.failed_job(), &flashes.messages()) {
            Ok(html) => (status_for(&e), Html(html)).into_response(),
            Err(e) => template_failure(e),
        },
    }
}

async fn output(
    State(state): State<AppState>,
    Path((job_id, path)): Path<(String, String)>,
    request: Request,
) -> Response {
    serve_artifact(&state, &job_id, &path, request, false).await
}

async fn download(
    State(state): State<AppState>,
    Path((job_id, file)): Path<(String, String)>,
    request: Request,
) -> Response {
    serve_artifact(&state, &job_id, &file, request, true).await
}

async fn serve_artifact(
    state: &AppState,
    job_id: &str,
    relative: &str,
    request: Request,
    attachment: bool,
) -> Response {
    let Some(path) = state.storage().resolve_artifact(job_id, relative) else {
        warn!("Artifact not found: {}/{}", job_id, relative);
        if relative.ends_with(".html") {
            return state.form(
                StatusCode::NOT_FOUND,
                &[Flash::new(FlashLevel::Warning, CLEANED_UP)],
            );
        }
        return (StatusCode::NOT_FOUND, "File not found").into_response();
    };

    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    };

    if attachment {
        let name = format!("{}_{}", job_id, sanitize_filename(relative));
        if let Ok(value) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", name)) {
            response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
        }
    }
    response
}

/// Collect the multipart fields the form submits.
async fn read_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, (StatusCode, ValidationError)> {
    let mut multipart = multipart.map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            ValidationError::MalformedForm(e.body_text()),
        )
    })?;
    let mut form = UploadForm::default();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => return Err((e.status(), ValidationError::MalformedForm(e.body_text()))),
        };
        match field.name() {
            Some("pdf_file") => {
                form.file_name = Some(field.file_name().unwrap_or("").to_string());
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| (e.status(), ValidationError::MalformedForm(e.body_text())))?;
                form.bytes = bytes.to_vec();
            }
            Some("target_languages") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| (e.status(), ValidationError::MalformedForm(e.body_text())))?;
                form.target_languages.push(value);
            }
            _ => {}
        }
    }
    Ok(form)
}

/// Turn away a submission before any job is created.
fn refuse(state: &AppState, e: Pdf2HtmlError) -> Response {
    warn!("Refused submission: {}", e);
    state.form(status_for(&e), &[Flash::new(FlashLevel::Warning, e.to_string())])
}

/// HTTP status for a failed submission.
pub fn status_for(e: &Pdf2HtmlError) -> StatusCode {
    match (e, e.kind()) {
        (Pdf2HtmlError::StorageFull { .. }, _) => StatusCode::INSUFFICIENT_STORAGE,
        (_, ErrorKind::Capacity) => StatusCode::SERVICE_UNAVAILABLE,
        (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        (_, ErrorKind::Document) => StatusCode::UNPROCESSABLE_ENTITY,
        (_, ErrorKind::ExternalService) => StatusCode::BAD_GATEWAY,
        (_, ErrorKind::Storage) | (_, ErrorKind::Internal) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn template_failure(e: minijinja::Error) -> Response {
    error!("Template rendering failed: {}", e);
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
}
