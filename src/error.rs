//! Error types for the edgequake-ocr2md library.
//!
//! Three error types reflect three distinct failure domains:
//!
//! * [`OcrError`]: acquiring OCR text failed. Every variant maps onto one of
//!   five [`OcrErrorKind`]s, and [`OcrError::is_retryable`] decides whether
//!   the retry loop in [`crate::pipeline::ocr`] may re-issue the request.
//!
//! * [`CacheError`]: the `_ocr.md` sibling was reported present but could
//!   not be read. Always recoverable: the orchestrator logs it and falls
//!   back to a fresh OCR run.
//!
//! * [`SaveError`]: persisting edited Markdown failed. Messages are meant to
//!   be shown to the user verbatim.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Classification of an [`OcrError`], stable across versions.
///
/// The wire codes returned by [`OcrErrorKind::code`] are what a UI layer
/// receives over IPC, so they never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OcrErrorKind {
    /// The file extension is not one of pdf/png/jpg/jpeg. Fatal.
    UnsupportedFormat,
    /// The remote call lost the race against the timer. Retryable.
    Timeout,
    /// HTTP 429 or a service-reported rate limit. Retryable.
    RateLimit,
    /// Any other failure. Retryable when raised during a network attempt,
    /// fatal when raised before one.
    ApiError,
    /// A success response that carries no usable pages. Fatal.
    InvalidResponse,
}

impl OcrErrorKind {
    /// The wire code, e.g. `"RATE_LIMIT"`.
    pub fn code(self) -> &'static str {
        match self {
            OcrErrorKind::UnsupportedFormat => "UNSUPPORTED_FORMAT",
            OcrErrorKind::Timeout => "TIMEOUT",
            OcrErrorKind::RateLimit => "RATE_LIMIT",
            OcrErrorKind::ApiError => "API_ERROR",
            OcrErrorKind::InvalidResponse => "INVALID_RESPONSE",
        }
    }
}

impl fmt::Display for OcrErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// All errors returned while acquiring OCR text for a document.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum OcrError {
    // ── Pre-network errors (never retried) ───────────────────────────────
    /// The document extension has no known MIME type.
    #[error("Unsupported file format: '{extension}' ({path})\nSupported: .pdf, .png, .jpg, .jpeg")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The document bytes could not be read from disk.
    #[error("Failed to read document '{path}': {reason}")]
    ReadFailed { path: PathBuf, reason: String },

    /// No API key and no pre-built backend.
    #[error("OCR service is not configured.\n{hint}")]
    NotConfigured { hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Network-attempt errors ───────────────────────────────────────────
    /// The remote call did not settle within the configured timeout.
    #[error("OCR request timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// HTTP 429 or an equivalent service-reported limit.
    ///
    /// `retry_after_secs` echoes the `Retry-After` header when present. The
    /// retry loop keeps its own fixed schedule and does not honour it.
    #[error("Rate limit exceeded")]
    RateLimit { retry_after_secs: Option<u64> },

    /// Transport failure or a non-success HTTP status other than 429.
    #[error("OCR API error: {message}")]
    Api { status: Option<u16>, message: String },

    /// The service answered successfully but the body is unusable.
    #[error("Invalid OCR response: {detail}")]
    InvalidResponse { detail: String },
}

impl OcrError {
    /// The classification this error surfaces as.
    pub fn kind(&self) -> OcrErrorKind {
        match self {
            OcrError::UnsupportedFormat { .. } => OcrErrorKind::UnsupportedFormat,
            OcrError::ReadFailed { .. }
            | OcrError::NotConfigured { .. }
            | OcrError::InvalidConfig(_)
            | OcrError::Api { .. } => OcrErrorKind::ApiError,
            OcrError::Timeout { .. } => OcrErrorKind::Timeout,
            OcrError::RateLimit { .. } => OcrErrorKind::RateLimit,
            OcrError::InvalidResponse { .. } => OcrErrorKind::InvalidResponse,
        }
    }

    /// Whether re-issuing the same request has a reasonable chance of success.
    ///
    /// Only errors raised during a network attempt qualify, and of those a
    /// structurally empty response is excluded: it will not change on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            OcrError::Timeout { .. } | OcrError::RateLimit { .. } | OcrError::Api { .. }
        )
    }
}

/// Reading an existing cache file failed.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to read OCR cache '{path}': {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Persisting Markdown to disk failed.
#[derive(Debug, Error)]
pub enum SaveError {
    /// Nothing but blank pages, so there is nothing to write.
    #[error("No content to save")]
    EmptyContent,

    /// `EACCES` / `EPERM`.
    #[error("Permission denied: Cannot write to the specified location")]
    PermissionDenied { path: PathBuf },

    /// `ENOSPC`.
    #[error("Disk space is full")]
    DiskFull { path: PathBuf },

    #[error("Failed to save file: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl SaveError {
    /// Classify an I/O failure while writing `path`.
    pub(crate) fn from_io(path: PathBuf, source: std::io::Error) -> Self {
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => SaveError::PermissionDenied { path },
            std::io::ErrorKind::StorageFull => SaveError::DiskFull { path },
            _ => SaveError::WriteFailed { path, source },
        }
    }
}
