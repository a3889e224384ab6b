//! Scripted stand-ins for pdfium and the model, shared by integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use edgequake_pdf2html::prompts::HtmlRequest;
use edgequake_pdf2html::{
    DocumentReader, ExtractedImage, Language, LanguageSelection, ModelClient, Orchestrator,
    PageContent, Pdf2HtmlError, ServiceConfig, StorageManager, ValidatedUpload,
};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio::sync::Notify;

pub const PDF_BYTES: &[u8] = b"%PDF-1.4\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

/// Reader returning `images_per_page` tiny PNGs on each of `pages` pages.
pub struct FakeReader {
    pub pages: usize,
    pub images_per_page: usize,
}

#[async_trait]
impl DocumentReader for FakeReader {
    async fn extract_images(&self, pdf_path: &Path) -> Result<Vec<ExtractedImage>, Pdf2HtmlError> {
        assert!(pdf_path.is_file(), "upload must be stored before extraction");
        let mut images = Vec::new();
        for page in 1..=self.pages {
            for index in 1..=self.images_per_page {
                images.push(ExtractedImage {
                    page_num: page,
                    index_on_page: index,
                    png: vec![0x89, b'P', b'N', b'G', page as u8, index as u8],
                });
            }
        }
        Ok(images)
    }

    async fn read_pages(&self, _pdf_path: &Path) -> Result<Vec<PageContent>, Pdf2HtmlError> {
        Ok((1..=self.pages)
            .map(|page_num| PageContent {
                page_num,
                text: format!("Text of page {page_num}"),
                png: vec![page_num as u8],
            })
            .collect())
    }
}

/// Reader that parks in `extract_images` until `release` is notified.
pub struct BlockingReader {
    pub inner: FakeReader,
    /// Notified once extraction has begun.
    pub started: Notify,
    pub release: Notify,
}

impl BlockingReader {
    pub fn new(inner: FakeReader) -> Self {
        Self {
            inner,
            started: Notify::new(),
            release: Notify::new(),
        }
    }
}

#[async_trait]
impl DocumentReader for BlockingReader {
    async fn extract_images(&self, pdf_path: &Path) -> Result<Vec<ExtractedImage>, Pdf2HtmlError> {
        self.started.notify_one();
        self.release.notified().await;
        self.inner.extract_images(pdf_path).await
    }

    async fn read_pages(&self, pdf_path: &Path) -> Result<Vec<PageContent>, Pdf2HtmlError> {
        self.inner.read_pages(pdf_path).await
    }
}

/// Model client that records every call and answers deterministically.
#[derive(Default)]
pub struct FakeClient {
    pub calls: Mutex<Vec<String>>,
    pub alt_calls: AtomicUsize,
    pub html_calls: AtomicUsize,
    /// Fail every alt-text request.
    pub fail_alt_text: bool,
    /// Fail the HTML request for this language code.
    pub fail_html_for: Option<&'static str>,
}

impl FakeClient {
    pub fn total_calls(&self) -> usize {
        self.alt_calls.load(Ordering::SeqCst) + self.html_calls.load(Ordering::SeqCst)
    }

    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for FakeClient {
    async fn describe_image(&self, png: &[u8], language: Language) -> Result<String, Pdf2HtmlError> {
        self.alt_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(format!("alt:{}", language.code));
        if self.fail_alt_text {
            return Err(Pdf2HtmlError::ExternalService {
                stage: "alt text",
                retries: 0,
                message: "HTTP 503".into(),
            });
        }
        Ok(format!("\"Figure {} in {}\"\n", png.len(), language.name))
    }

    async fn generate_html(&self, request: &HtmlRequest<'_>) -> Result<String, Pdf2HtmlError> {
        self.html_calls.fetch_add(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(format!("html:{}", request.language.code));
        if self.fail_html_for == Some(request.language.code) {
            return Err(Pdf2HtmlError::ApiTimeout {
                stage: "html generation",
                secs: 1,
            });
        }
        let images: String = request
            .images
            .iter()
            .map(|i| format!("<img src=\"{}\" alt=\"{}\">", i.html_src_path, i.alt_text))
            .collect();
        Ok(format!(
            "```html\n<html><body><h1>{}</h1><p>{} pages</p>{}</body></html>\n```",
            request.language.name,
            request.pages.len(),
            images
        ))
    }
}

/// Config rooted in a fresh temporary directory.
pub fn test_config(tmp: &TempDir) -> ServiceConfig {
    ServiceConfig::builder()
        .storage_root(tmp.path().join("data"))
        .build()
        .unwrap()
}

pub fn orchestrator(
    config: &ServiceConfig,
    reader: FakeReader,
    client: Arc<FakeClient>,
) -> Orchestrator {
    orchestrator_with(config, Arc::new(reader), client)
}

pub fn orchestrator_with(
    config: &ServiceConfig,
    reader: Arc<dyn DocumentReader>,
    client: Arc<FakeClient>,
) -> Orchestrator {
    let storage = StorageManager::new(&config.storage_root, config.retention);
    Orchestrator::new(storage, reader, client, config)
}

pub fn upload(languages: &[&str]) -> ValidatedUpload {
    ValidatedUpload {
        file_name: "report.pdf".into(),
        bytes: PDF_BYTES.to_vec(),
        languages: LanguageSelection::parse(languages).unwrap(),
    }
}

/// Names of the job directories under `root`.
pub fn job_dirs(root: &Path) -> Vec<String> {
    match std::fs::read_dir(root) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect(),
        Err(_) => Vec::new(),
    }
}
