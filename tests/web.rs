//! HTTP surface tests driven through `tower::ServiceExt::oneshot`.

mod common;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::{
    job_dirs, orchestrator, orchestrator_with, test_config, BlockingReader, FakeClient,
    FakeReader, PDF_BYTES,
};
use edgequake_pdf2html::{router, AppState, JobId, ServiceConfig};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

const BOUNDARY: &str = "pdf2html-test-boundary";

fn app(config: &ServiceConfig, client: Arc<FakeClient>) -> Router {
    let orch = orchestrator(
        config,
        FakeReader {
            pages: 1,
            images_per_page: 1,
        },
        client,
    );
    router(AppState::new(orch, config).unwrap())
}

/// Encode the upload form the way a browser does.
fn form_body(file: Option<(&str, &[u8])>, languages: &[&str]) -> Vec<u8> {
    let mut body = Vec::new();
    if let Some((name, bytes)) = file {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"pdf_file\"; filename=\"{name}\"\r\n\
Content-Type: application/pdf\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(b"\r\n");
    }
    for code in languages {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"target_languages\"\r\n\r\n{code}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn post_form(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_text(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).to_string()
}

#[tokio::test]
async fn index_lists_supported_languages() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let response = app(&config, Arc::new(FakeClient::default()))
        .oneshot(get("/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("name=\"pdf_file\""));
    assert!(html.contains("value=\"en\" checked"));
    assert!(html.contains("Marathi"));
    assert!(html.contains("Chinese"));
}

#[tokio::test]
async fn health_answers_ok() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let response = app(&config, Arc::new(FakeClient::default()))
        .oneshot(get("/health"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "ok");
}

#[tokio::test]
async fn zero_languages_never_reaches_orchestrator() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let client = Arc::new(FakeClient::default());

    let response = app(&config, client.clone())
        .oneshot(post_form(form_body(Some(("report.pdf", PDF_BYTES)), &[])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response)
        .await
        .contains("Please select at least one target language."));
    assert_eq!(client.total_calls(), 0);
    assert!(job_dirs(&config.storage_root).is_empty());
}

#[tokio::test]
async fn non_pdf_rejected_before_storage_write() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let client = Arc::new(FakeClient::default());

    let response = app(&config, client.clone())
        .oneshot(post_form(form_body(Some(("notes.txt", b"hello")), &["en"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("Invalid file type"));

    // Right extension, wrong content.
    let response = app(&config, client.clone())
        .oneshot(post_form(form_body(Some(("fake.pdf", b"GIF89a")), &["en"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("not a valid PDF"));

    assert_eq!(client.total_calls(), 0);
    assert!(job_dirs(&config.storage_root).is_empty());
}

#[tokio::test]
async fn missing_file_part_is_flashed() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let response = app(&config, Arc::new(FakeClient::default()))
        .oneshot(post_form(form_body(None, &["en"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_text(response).await.contains("No file part"));
}

#[tokio::test]
async fn conversion_result_links_are_served() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let client = Arc::new(FakeClient::default());
    let app = app(&config, client.clone());

    let response = app
        .clone()
        .oneshot(post_form(form_body(
            Some(("report.pdf", PDF_BYTES)),
            &["en", "fr"],
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("Conversion complete!"));
    assert!(html.contains("Successfully processed 1 images."));

    let dirs = job_dirs(&config.storage_root);
    assert_eq!(dirs.len(), 1);
    let job = &dirs[0];
    assert!(html.contains(&format!("/output/{job}/en.html")));
    assert!(html.contains(&format!("/download/{job}/fr.html")));

    let response = app
        .clone()
        .oneshot(get(&format!("/output/{job}/fr.html")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/html"));
    assert!(body_text(response).await.contains("<html lang=\"fr\">"));

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/output/{job}/extracted_images/page_1_idx_1_gidx_1.png"
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/download/{job}/en.html")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        format!("attachment; filename=\"{job}_en.html\"").as_str()
    );

    // The uploaded PDF is never reachable.
    let response = app
        .clone()
        .oneshot(get(&format!("/output/{job}/upload/report.pdf")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn cleaned_up_output_shows_warning() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let job = edgequake_pdf2html::JobId::new();

    let response = app(&config, Arc::new(FakeClient::default()))
        .oneshot(get(&format!("/output/{job}/en.html")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("cleaned up"));
}

#[tokio::test]
async fn full_storage_refuses_new_jobs() {
    let tmp = TempDir::new().unwrap();
    let config = ServiceConfig::builder()
        .storage_root(tmp.path().join("data"))
        .max_storage_bytes(Some(16))
        .build()
        .unwrap();
    std::fs::create_dir_all(&config.storage_root).unwrap();
    std::fs::write(config.storage_root.join("ballast.bin"), [0u8; 64]).unwrap();
    let client = Arc::new(FakeClient::default());

    let response = app(&config, client.clone())
        .oneshot(post_form(form_body(Some(("report.pdf", PDF_BYTES)), &["en"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INSUFFICIENT_STORAGE);
    assert!(body_text(response).await.contains("Storage might be low"));
    assert_eq!(client.total_calls(), 0);
    assert_eq!(job_dirs(&config.storage_root), ["ballast.bin"]);
}

#[tokio::test]
async fn model_failure_renders_error_flash() {
    let tmp = TempDir::new().unwrap();
    let config = test_config(&tmp);
    let client = Arc::new(FakeClient {
        fail_alt_text: true,
        ..Default::default()
    });

    let response = app(&config, client)
        .oneshot(post_form(form_body(Some(("report.pdf", PDF_BYTES)), &["en"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let html = body_text(response).await;
    assert!(html.contains("Conversion failed"));
    assert!(html.contains("Step 1: Extracting images"));
    assert!(html.contains("An error occurred:"));
    assert!(!html.contains("name=\"pdf_file\""), "failure must not re-render the form");

    let dirs = job_dirs(&config.storage_root);
    assert_eq!(dirs.len(), 1);
    assert!(html.contains(&format!("<code>{}</code>", dirs[0])));
}

#[tokio::test]
async fn second_submission_is_refused_while_busy() {
    let tmp = TempDir::new().unwrap();
    let config = ServiceConfig::builder()
        .storage_root(tmp.path().join("data"))
        .max_concurrent_jobs(1)
        .build()
        .unwrap();
    let client = Arc::new(FakeClient::default());
    let reader = Arc::new(BlockingReader::new(FakeReader {
        pages: 1,
        images_per_page: 1,
    }));
    let app = router(
        AppState::new(
            orchestrator_with(&config, reader.clone(), client.clone()),
            &config,
        )
        .unwrap(),
    );

    let first = tokio::spawn(
        app.clone()
            .oneshot(post_form(form_body(Some(("first.pdf", PDF_BYTES)), &["en"]))),
    );
    reader.started.notified().await;

    let response = app
        .oneshot(post_form(form_body(Some(("second.pdf", PDF_BYTES)), &["en"])))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let html = body_text(response).await;
    assert!(html.contains("server is busy"));
    assert_eq!(client.total_calls(), 0);

    reader.release.notify_one();
    let response = first.await.unwrap().unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Only the admitted job reached the model or the disk.
    assert_eq!(client.total_calls(), 2);
    assert_eq!(job_dirs(&config.storage_root).len(), 1);
}

#[tokio::test]
async fn expired_job_dirs_are_swept_on_submission() {
    let tmp = TempDir::new().unwrap();
    let config = ServiceConfig::builder()
        .storage_root(tmp.path().join("data"))
        .retention(Duration::from_millis(50))
        .build()
        .unwrap();
    let stale = JobId::new().to_string();
    std::fs::create_dir_all(config.storage_root.join(&stale).join("upload")).unwrap();
    std::fs::write(config.storage_root.join(&stale).join("en.html"), b"<html></html>").unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let response = app(&config, Arc::new(FakeClient::default()))
        .oneshot(post_form(form_body(Some(("report.pdf", PDF_BYTES)), &["en"])))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(!config.storage_root.join(&stale).exists());
    let dirs = job_dirs(&config.storage_root);
    assert_eq!(dirs.len(), 1);
    assert_ne!(dirs[0], stale);
}
