//! Progress-callback trait for acquisition events.
//!
//! Inject an [`Arc<dyn AcquisitionProgressCallback>`] via
//! [`crate::config::OcrConfigBuilder::progress_callback`] to observe an
//! acquisition as it moves through cache probe, attempts and retries.
//!
//! A scheduled retry is reported through [`on_retry_scheduled`] but the
//! acquisition as a whole stays "processing" from the caller's point of view;
//! only [`on_complete`] and [`on_failure`] are terminal.
//!
//! # Example
//!
//! ```rust
//! use edgequake_ocr2md::{AcquisitionProgressCallback, OcrConfig};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct AttemptCounter(AtomicUsize);
//!
//! impl AcquisitionProgressCallback for AttemptCounter {
//!     fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("attempt {attempt}/{max_attempts}");
//!     }
//! }
//!
//! let config = OcrConfig::builder()
//!     .progress_callback(Arc::new(AttemptCounter(AtomicUsize::new(0))))
//!     .build()
//!     .unwrap();
//! ```
//!
//! [`on_retry_scheduled`]: AcquisitionProgressCallback::on_retry_scheduled
//! [`on_complete`]: AcquisitionProgressCallback::on_complete
//! [`on_failure`]: AcquisitionProgressCallback::on_failure

use crate::error::OcrError;
use std::path::Path;
use std::sync::Arc;

/// Called by the acquisition pipeline as it processes a document.
///
/// Implementations must be `Send + Sync`; acquisitions run on the tokio
/// runtime and may be driven from any worker thread. All methods default to
/// no-ops.
pub trait AcquisitionProgressCallback: Send + Sync {
    /// An existing cache file satisfied the request; no OCR call will be made.
    fn on_cache_hit(&self, cache_path: &Path) {
        let _ = cache_path;
    }

    /// A network attempt is about to be issued.
    ///
    /// # Arguments
    /// * `attempt`: 1-indexed attempt number
    /// * `max_attempts`: total attempts permitted, including the first
    fn on_attempt_start(&self, attempt: u32, max_attempts: u32) {
        let _ = (attempt, max_attempts);
    }

    /// An attempt failed with a retryable error and another is scheduled.
    fn on_retry_scheduled(&self, attempt: u32, delay_ms: u64, error: &OcrError) {
        let _ = (attempt, delay_ms, error);
    }

    /// OCR finished successfully.
    fn on_complete(&self, page_count: usize, markdown_len: usize) {
        let _ = (page_count, markdown_len);
    }

    /// OCR failed for good; `error` is what the caller receives.
    fn on_failure(&self, error: &OcrError) {
        let _ = error;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl AcquisitionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::OcrConfig`].
pub type ProgressCallback = Arc<dyn AcquisitionProgressCallback>;
