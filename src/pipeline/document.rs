//! PDF access: embedded-image extraction and per-page text + renders.
//!
//! The orchestrator only sees the [`DocumentReader`] trait; the pdfium
//! backed [`PdfiumReader`] is the production implementation.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and blocks for the whole parse. Every call runs on the blocking
//! pool so Tokio workers keep serving other requests.

use crate::error::Pdf2HtmlError;
use crate::pipeline::encode::encode_png;
use async_trait::async_trait;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// An image embedded in the PDF, re-encoded as PNG.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    /// 1-based page number.
    pub page_num: usize,
    /// 1-based position of the image on its page.
    pub index_on_page: usize,
    pub png: Vec<u8>,
}

/// Text and a rendered snapshot of one page.
#[derive(Debug, Clone)]
pub struct PageContent {
    /// 1-based page number.
    pub page_num: usize,
    pub text: String,
    pub png: Vec<u8>,
}

/// Read access to an uploaded PDF.
#[async_trait]
pub trait DocumentReader: Send + Sync {
    /// All embedded raster images, in page order.
    async fn extract_images(&self, pdf_path: &Path) -> Result<Vec<ExtractedImage>, Pdf2HtmlError>;

    /// Extracted text and a render of every page, in page order.
    async fn read_pages(&self, pdf_path: &Path) -> Result<Vec<PageContent>, Pdf2HtmlError>;
}

/// [`DocumentReader`] backed by pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumReader {
    /// Directory holding the platform pdfium library. `None` uses the
    /// system library search path.
    library_dir: Option<PathBuf>,
    render_max_pixels: u32,
}

impl PdfiumReader {
    pub fn new(library_dir: Option<PathBuf>, render_max_pixels: u32) -> Self {
        Self {
            library_dir,
            render_max_pixels,
        }
    }

    /// Check that pdfium can be loaded at all; used at server startup.
    pub fn check_binding(&self) -> Result<(), Pdf2HtmlError> {
        bind_pdfium(self.library_dir.as_deref()).map(|_| ())
    }
}

#[async_trait]
impl DocumentReader for PdfiumReader {
    async fn extract_images(&self, pdf_path: &Path) -> Result<Vec<ExtractedImage>, Pdf2HtmlError> {
        let path = pdf_path.to_path_buf();
        let lib = self.library_dir.clone();

        tokio::task::spawn_blocking(move || extract_images_blocking(&path, lib.as_deref()))
            .await
            .map_err(|e| Pdf2HtmlError::Internal(format!("Image extraction task panicked: {}", e)))?
    }

    async fn read_pages(&self, pdf_path: &Path) -> Result<Vec<PageContent>, Pdf2HtmlError> {
        let path = pdf_path.to_path_buf();
        let lib = self.library_dir.clone();
        let max_pixels = self.render_max_pixels;

        tokio::task::spawn_blocking(move || read_pages_blocking(&path, lib.as_deref(), max_pixels))
            .await
            .map_err(|e| Pdf2HtmlError::Internal(format!("Page read task panicked: {}", e)))?
    }
}

/// Bind to pdfium in `library_dir`, falling back to the system library.
fn bind_pdfium(library_dir: Option<&Path>) -> Result<Pdfium, Pdf2HtmlError> {
    let bindings = match library_dir {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            .or_else(|_| Pdfium::bind_to_system_library()),
        None => Pdfium::bind_to_system_library(),
    }
    .map_err(|e| Pdf2HtmlError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

fn open_document<'a>(
    pdfium: &'a Pdfium,
    pdf_path: &Path,
) -> Result<PdfDocument<'a>, Pdf2HtmlError> {
    pdfium.load_pdf_from_file(pdf_path, None).map_err(|e| {
        let err_str = format!("{:?}", e);
        if err_str.contains("Password") || err_str.contains("password") {
            Pdf2HtmlError::PasswordRequired {
                path: pdf_path.to_path_buf(),
            }
        } else {
            Pdf2HtmlError::CorruptPdf {
                path: pdf_path.to_path_buf(),
                detail: err_str,
            }
        }
    })
}

fn extract_images_blocking(
    pdf_path: &Path,
    library_dir: Option<&Path>,
) -> Result<Vec<ExtractedImage>, Pdf2HtmlError> {
    let pdfium = bind_pdfium(library_dir)?;
    let document = open_document(&pdfium, pdf_path)?;

    let mut images = Vec::new();

    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;
        let mut index_on_page = 0;

        for object in page.objects().iter() {
            let Some(image_object) = object.as_image_object() else {
                continue;
            };

            let raw = match image_object.get_raw_image() {
                Ok(raw) => raw,
                Err(e) => {
                    warn!("Could not extract image data on page {}: {:?}", page_num, e);
                    continue;
                }
            };

            let png = encode_png(&raw).map_err(|e| Pdf2HtmlError::ExtractionFailed {
                page: page_num,
                detail: format!("PNG encoding failed: {}", e),
            })?;

            index_on_page += 1;
            debug!(
                "Page {}: image {} → {}x{} px",
                page_num,
                index_on_page,
                raw.width(),
                raw.height()
            );
            images.push(ExtractedImage {
                page_num,
                index_on_page,
                png,
            });
        }
    }

    info!("Extracted {} images from {}", images.len(), pdf_path.display());
    Ok(images)
}

fn read_pages_blocking(
    pdf_path: &Path,
    library_dir: Option<&Path>,
    max_pixels: u32,
) -> Result<Vec<PageContent>, Pdf2HtmlError> {
    let pdfium = bind_pdfium(library_dir)?;
    let document = open_document(&pdfium, pdf_path)?;

    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut pages = Vec::new();

    for (idx, page) in document.pages().iter().enumerate() {
        let page_num = idx + 1;

        let text = page
            .text()
            .map(|t| t.all())
            .map_err(|e| Pdf2HtmlError::ExtractionFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| Pdf2HtmlError::ExtractionFailed {
                page: page_num,
                detail: format!("{:?}", e),
            })?;

        let png = encode_png(&bitmap.as_image()).map_err(|e| Pdf2HtmlError::ExtractionFailed {
            page: page_num,
            detail: format!("PNG encoding failed: {}", e),
        })?;

        debug!("Page {}: {} chars of text, {} bytes PNG", page_num, text.len(), png.len());
        pages.push(PageContent {
            page_num,
            text,
            png,
        });
    }

    info!("Read {} pages from {}", pages.len(), pdf_path.display());
    Ok(pages)
}
