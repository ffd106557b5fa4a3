//! Pipeline stages for a single OCR acquisition.
//!
//! Each submodule implements exactly one step, so the retry loop can be
//! tested against a scripted backend without touching disk encoding or HTTP.
//!
//! ## Data Flow
//!
//! ```text
//! encode ──▶ backend ──▶ ocr
//! (data URL)  (HTTP)     (timeout race, classification, retry)
//! ```
//!
//! 1. [`encode`]: infer the MIME type from the extension and wrap the file
//!    bytes in a base64 `data:` URL; the only stage that reads the document
//! 2. [`backend`]: the [`backend::OcrBackend`] seam and its Mistral OCR
//!    implementation; the only stage with network I/O
//! 3. [`ocr`]: race each attempt against the timeout, reject empty
//!    responses, retry transient failures with exponential backoff

pub mod backend;
pub mod encode;
pub mod ocr;
