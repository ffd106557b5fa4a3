//! # edgequake-ocr2md
//!
//! Turn scanned documents (PDF, PNG, JPEG) into editable, page-indexed
//! Markdown using a remote OCR service.
//!
//! ## Why this crate?
//!
//! The hard part of OCR-backed editing is not the editor, it is acquisition:
//! a slow, rate-limited network call has to become a result that is cached
//! next to the document, safe to retry, and split back into pages without
//! clobbering edits. This crate owns that path end to end and leaves the UI
//! to the host.
//!
//! ## Pipeline Overview
//!
//! ```text
//! Document
//!  │
//!  ├─ 1. Cache    <stem>_ocr.md next to the file? read it, skip OCR
//!  ├─ 2. Encode   bytes → base64 data URL (MIME from extension)
//!  ├─ 3. OCR      POST to the service, raced against a timeout
//!  ├─ 4. Retry    timeouts / 429 / API errors, 1 s → 2 s → 4 s …
//!  ├─ 5. Pages    split on "\n\n---\n\n" into a 1-based page map
//!  └─ 6. Save     join non-empty pages, atomic write to the cache path
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{Document, DocumentSession, OcrConfig, OcrService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key from MISTRAL_API_KEY
//!     let service = OcrService::new(OcrConfig::default());
//!     let mut session = DocumentSession::new();
//!
//!     let document = Document::from_path("scan.pdf", None).await?;
//!     session.load(&service, document, None).await?;
//!
//!     for (page, markdown) in session.pages().iter() {
//!         println!("── page {page} ──\n{markdown}");
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-ocr2md = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod pages;
pub mod pipeline;
pub mod progress;
pub mod service;
pub mod session;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cache::{save_markdown, CacheCheck, CacheContent, CacheMetadata, CacheStore};
pub use config::{OcrConfig, OcrConfigBuilder, OcrOptions};
pub use document::{Document, MimeKind};
pub use error::{CacheError, OcrError, OcrErrorKind, SaveError};
pub use pages::{PageMarkdown, PAGE_SEPARATOR};
pub use pipeline::backend::{MistralOcrBackend, OcrBackend, OcrRequest, OcrResponse};
pub use pipeline::ocr::OcrResult;
pub use progress::{AcquisitionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use service::OcrService;
pub use session::{
    acquire, Acquisition, AcquisitionSource, AcquisitionStatus, AcquisitionTicket, ApplyOutcome,
    DocumentSession,
};
