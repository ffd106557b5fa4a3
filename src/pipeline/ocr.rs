//! OCR call: one document → flat Markdown, with a timeout race and retries.
//!
//! ## Retry Strategy
//!
//! Every attempt races the backend call against `tokio::time::timeout`. The
//! first to settle wins; a losing backend future is dropped, which aborts its
//! HTTP request.
//!
//! Timeouts, rate limits and API errors are retried with exponential backoff
//! (`backoff_ms * 2^attempt`, no jitter): with the 1 s default and 3 attempts
//! the waits are 1 s → 2 s, and there is no wait after the last attempt.
//! Errors raised before the first request (unsupported format, unreadable
//! file) and empty responses fail immediately. When attempts run out the last
//! error is returned as is.

use crate::error::OcrError;
use crate::pages::PAGE_SEPARATOR;
use crate::pipeline::backend::{OcrBackend, OcrRequest, OcrResponse};
use crate::pipeline::encode::encode_document;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, info, warn};

/// Successful OCR of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResult {
    /// All pages joined with [`PAGE_SEPARATOR`].
    pub markdown: String,
    /// Number of pages the service returned, at least 1.
    pub page_count: usize,
}

/// Effective settings for one acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptPolicy {
    pub timeout_ms: u64,
    /// Total attempts including the first. Treated as at least 1.
    pub max_attempts: u32,
    pub backoff_ms: u64,
}

impl AttemptPolicy {
    /// Wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_ms(&self, attempt: u32) -> u64 {
        self.backoff_ms
            .saturating_mul(2u64.saturating_pow(attempt))
    }
}

/// Encode `path` and run it through `backend` under `policy`.
pub async fn process_path(
    backend: &Arc<dyn OcrBackend>,
    path: &Path,
    model: &str,
    policy: AttemptPolicy,
    callback: Option<&ProgressCallback>,
) -> Result<OcrResult, OcrError> {
    let encoded = match encode_document(path).await {
        Ok(enc) => enc,
        Err(e) => {
            warn!("{}: not sent for OCR: {}", path.display(), e);
            if let Some(cb) = callback {
                cb.on_failure(&e);
            }
            return Err(e);
        }
    };
    debug!(
        "{}: {} bytes as {}",
        path.display(),
        encoded.byte_len,
        encoded.kind.mime_type()
    );

    let request = OcrRequest::new(model, &encoded);
    process_request(backend, &request, policy, callback).await
}

/// Retry loop over an already-built request.
pub async fn process_request(
    backend: &Arc<dyn OcrBackend>,
    request: &OcrRequest,
    policy: AttemptPolicy,
    callback: Option<&ProgressCallback>,
) -> Result<OcrResult, OcrError> {
    let max_attempts = policy.max_attempts.max(1);
    let start = Instant::now();
    let mut last_err: Option<OcrError> = None;

    for attempt in 0..max_attempts {
        if let Some(cb) = callback {
            cb.on_attempt_start(attempt + 1, max_attempts);
        }

        match attempt_once(backend, request, policy.timeout_ms).await {
            Ok(result) => {
                info!(
                    "OCR via {} succeeded: {} pages, {} chars in {:?} (attempt {}/{})",
                    backend.name(),
                    result.page_count,
                    result.markdown.len(),
                    start.elapsed(),
                    attempt + 1,
                    max_attempts
                );
                if let Some(cb) = callback {
                    cb.on_complete(result.page_count, result.markdown.len());
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => {
                warn!("OCR attempt {} failed, not retrying: {}", attempt + 1, e);
                if let Some(cb) = callback {
                    cb.on_failure(&e);
                }
                return Err(e);
            }
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let delay = policy.delay_ms(attempt);
                    warn!(
                        "OCR attempt {}/{} failed ({}), retrying in {}ms",
                        attempt + 1,
                        max_attempts,
                        e,
                        delay
                    );
                    if let Some(cb) = callback {
                        cb.on_retry_scheduled(attempt + 1, delay, &e);
                    }
                    sleep(Duration::from_millis(delay)).await;
                } else {
                    warn!("OCR attempt {}/{} failed: {}", attempt + 1, max_attempts, e);
                }
                last_err = Some(e);
            }
        }
    }

    let err = last_err.unwrap_or_else(|| OcrError::Api {
        status: None,
        message: "no OCR attempt was made".into(),
    });
    if let Some(cb) = callback {
        cb.on_failure(&err);
    }
    Err(err)
}

async fn attempt_once(
    backend: &Arc<dyn OcrBackend>,
    request: &OcrRequest,
    timeout_ms: u64,
) -> Result<OcrResult, OcrError> {
    let response = match timeout(Duration::from_millis(timeout_ms), backend.process(request)).await
    {
        Ok(result) => result?,
        Err(_) => {
            return Err(OcrError::Timeout {
                elapsed_ms: timeout_ms,
            })
        }
    };
    flatten(response)
}

/// Join the pages of a response, rejecting an empty one.
pub fn flatten(response: OcrResponse) -> Result<OcrResult, OcrError> {
    if response.pages.is_empty() {
        return Err(OcrError::InvalidResponse {
            detail: "No pages returned from OCR".into(),
        });
    }
    let page_count = response.pages.len();
    let markdown = response
        .pages
        .into_iter()
        .map(|p| p.markdown)
        .collect::<Vec<_>>()
        .join(PAGE_SEPARATOR);
    Ok(OcrResult {
        markdown,
        page_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::MimeKind;
    use crate::error::OcrErrorKind;
    use crate::pipeline::encode::{data_url, EncodedDocument};
    use crate::progress::AcquisitionProgressCallback;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed list of outcomes, then repeats the last one.
    struct Scripted {
        script: Mutex<VecDeque<Result<OcrResponse, OcrError>>>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl Scripted {
        fn new(script: Vec<Result<OcrResponse, OcrError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
                hang: false,
            })
        }

        fn hanging() -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(VecDeque::new()),
                calls: AtomicUsize::new(0),
                hang: true,
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OcrBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process(&self, _request: &OcrRequest) -> Result<OcrResponse, OcrError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                std::future::pending::<()>().await;
            }
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap()
            }
        }
    }

    fn request() -> OcrRequest {
        let enc = EncodedDocument {
            kind: MimeKind::Pdf,
            data_url: data_url(MimeKind::Pdf, b"%PDF"),
            byte_len: 4,
        };
        OcrRequest::new("mistral-ocr-latest", &enc)
    }

    fn policy(max_attempts: u32) -> AttemptPolicy {
        AttemptPolicy {
            timeout_ms: 1_000,
            max_attempts,
            backoff_ms: 1,
        }
    }

    fn rate_limited() -> Result<OcrResponse, OcrError> {
        Err(OcrError::RateLimit {
            retry_after_secs: None,
        })
    }

    #[test]
    fn backoff_doubles() {
        let p = AttemptPolicy {
            timeout_ms: 30_000,
            max_attempts: 3,
            backoff_ms: 1000,
        };
        assert_eq!(p.delay_ms(0), 1000);
        assert_eq!(p.delay_ms(1), 2000);
        assert_eq!(p.delay_ms(2), 4000);
        assert_eq!(p.delay_ms(80), u64::MAX);
    }

    #[test]
    fn flatten_joins_pages() {
        let result = flatten(OcrResponse::from_pages(["# Page 1", "# Page 2"])).unwrap();
        assert_eq!(result.page_count, 2);
        assert_eq!(result.markdown, "# Page 1\n\n---\n\n# Page 2");
    }

    #[test]
    fn flatten_rejects_empty() {
        let err = flatten(OcrResponse::default()).unwrap_err();
        assert_eq!(err.kind(), OcrErrorKind::InvalidResponse);
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let backend = Scripted::new(vec![
            rate_limited(),
            rate_limited(),
            Ok(OcrResponse::from_pages(["ok"])),
        ]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();

        let result = process_request(&dyn_backend, &request(), policy(3), None)
            .await
            .unwrap();
        assert_eq!(result.markdown, "ok");
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let backend = Scripted::new(vec![
            rate_limited(),
            Err(OcrError::Api {
                status: Some(503),
                message: "unavailable".into(),
            }),
        ]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();

        let err = process_request(&dyn_backend, &request(), policy(4), None)
            .await
            .unwrap_err();
        assert_eq!(backend.calls(), 4);
        assert_eq!(err.kind(), OcrErrorKind::ApiError);
    }

    #[tokio::test]
    async fn empty_response_is_not_retried() {
        let backend = Scripted::new(vec![Ok(OcrResponse::default())]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();

        let err = process_request(&dyn_backend, &request(), policy(5), None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), OcrErrorKind::InvalidResponse);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn zero_attempts_still_tries_once() {
        let backend = Scripted::new(vec![Ok(OcrResponse::from_pages(["x"]))]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();
        process_request(&dyn_backend, &request(), policy(0), None)
            .await
            .unwrap();
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_backend_times_out_on_every_attempt() {
        let backend = Scripted::hanging();
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();
        let policy = AttemptPolicy {
            timeout_ms: 50,
            max_attempts: 2,
            backoff_ms: 10,
        };

        let err = process_request(&dyn_backend, &request(), policy, None)
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::Timeout { elapsed_ms: 50 }), "got {err:?}");
        assert_eq!(backend.calls(), 2);
    }

    #[derive(Default)]
    struct DelayRecorder {
        delays: Mutex<Vec<u64>>,
    }

    impl AcquisitionProgressCallback for DelayRecorder {
        fn on_retry_scheduled(&self, _attempt: u32, delay_ms: u64, _error: &OcrError) {
            self.delays.lock().unwrap().push(delay_ms);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_sleep_on_doubling_schedule() {
        let backend = Scripted::new(vec![rate_limited()]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();
        let recorder = Arc::new(DelayRecorder::default());
        let callback: ProgressCallback = recorder.clone();
        let policy = AttemptPolicy {
            timeout_ms: 30_000,
            max_attempts: 4,
            backoff_ms: 1_000,
        };

        let started = tokio::time::Instant::now();
        let err = process_request(&dyn_backend, &request(), policy, Some(&callback))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), OcrErrorKind::RateLimit);
        assert_eq!(backend.calls(), 4);
        assert_eq!(*recorder.delays.lock().unwrap(), vec![1_000, 2_000, 4_000]);
        // No sleep follows the last attempt.
        assert_eq!(started.elapsed(), Duration::from_millis(7_000));
    }

    #[tokio::test]
    async fn unsupported_path_never_reaches_backend() {
        let backend = Scripted::new(vec![Ok(OcrResponse::from_pages(["x"]))]);
        let dyn_backend: Arc<dyn OcrBackend> = backend.clone();

        let err = process_path(
            &dyn_backend,
            Path::new("/tmp/notes.txt"),
            "m",
            policy(3),
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), OcrErrorKind::UnsupportedFormat);
        assert_eq!(backend.calls(), 0);
    }
}
