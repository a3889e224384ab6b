//! PDF-side pipeline stages used by the orchestrator.
//!
//! ## Data Flow
//!
//! ```text
//! document ──▶ encode ──▶ (model client) ──▶ finalize
//! (pdfium)     (PNG/b64)                      (HTML cleanup)
//! ```
//!
//! 1. [`document`] — extract embedded images and read page text + renders;
//!    runs in `spawn_blocking` because pdfium is not async-safe
//! 2. [`encode`]   — PNG-encode images and wrap them as multimodal
//!    `ImageData` for the model request
//! 3. [`finalize`] — deterministic rules that turn the raw model answer into
//!    a complete HTML document (fences, doctype, `<head>`, `lang`)

pub mod document;
pub mod encode;
pub mod finalize;
