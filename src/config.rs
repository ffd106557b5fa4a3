//! Configuration types for OCR acquisition.
//!
//! All acquisition behaviour is controlled through [`OcrConfig`], built via
//! its [`OcrConfigBuilder`]. Per-call overrides (the UI's "process this file
//! with a shorter timeout") go through [`OcrOptions`] instead, so a single
//! shared config can serve every document.

use crate::error::OcrError;
use crate::pipeline::backend::OcrBackend;
use crate::progress::ProgressCallback;
use std::fmt;
use std::sync::Arc;

/// Default Mistral OCR endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.mistral.ai/v1/ocr";

/// Default OCR model identifier.
pub const DEFAULT_MODEL: &str = "mistral-ocr-latest";

/// Suffix appended to the extension-less document path to locate its cache.
pub const DEFAULT_CACHE_SUFFIX: &str = "_ocr.md";

/// Environment variable holding the OCR API key.
pub const API_KEY_ENV: &str = "MISTRAL_API_KEY";

/// Configuration for OCR acquisition.
///
/// # Example
/// ```rust
/// use edgequake_ocr2md::OcrConfig;
///
/// let config = OcrConfig::builder()
///     .api_key("sk-test")
///     .timeout_ms(10_000)
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct OcrConfig {
    /// API key for the OCR service. Falls back to `MISTRAL_API_KEY`.
    pub api_key: Option<String>,

    /// OCR endpoint URL. Default: [`DEFAULT_ENDPOINT`].
    pub endpoint: String,

    /// Model identifier sent with every request. Default: `mistral-ocr-latest`.
    pub model: String,

    /// Per-attempt timeout in milliseconds. Default: 30 000.
    ///
    /// Multi-page PDFs are processed in one request, so this bounds the whole
    /// document, not a page.
    pub timeout_ms: u64,

    /// Total attempts per acquisition, including the first. Default: 3.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds. Default: 1000.
    ///
    /// The wait before attempt `n + 1` is `retry_backoff_ms * 2^n`:
    /// 1 s → 2 s → 4 s …
    pub retry_backoff_ms: u64,

    /// Cache file suffix. Default: `_ocr.md`.
    pub cache_suffix: String,

    /// Pre-constructed backend. Takes precedence over `api_key`.
    pub backend: Option<Arc<dyn OcrBackend>>,

    /// Observer notified on cache hits, attempts, retries and completion.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_ms: 30_000,
            max_retries: 3,
            retry_backoff_ms: 1000,
            cache_suffix: DEFAULT_CACHE_SUFFIX.to_string(),
            backend: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OcrConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_ms", &self.retry_backoff_ms)
            .field("cache_suffix", &self.cache_suffix)
            .field("backend", &self.backend.as_ref().map(|_| "<dyn OcrBackend>"))
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn AcquisitionProgressCallback>"),
            )
            .finish()
    }
}

impl OcrConfig {
    /// Create a new builder for `OcrConfig`.
    pub fn builder() -> OcrConfigBuilder {
        OcrConfigBuilder {
            config: Self::default(),
        }
    }

    /// Effective timeout and attempt count for one call.
    pub fn resolve(&self, options: Option<&OcrOptions>) -> (u64, u32) {
        let timeout_ms = options
            .and_then(|o| o.timeout_ms)
            .unwrap_or(self.timeout_ms);
        let max_retries = options
            .and_then(|o| o.max_retries)
            .unwrap_or(self.max_retries)
            .max(1);
        (timeout_ms, max_retries)
    }
}

/// Builder for [`OcrConfig`].
#[derive(Debug)]
pub struct OcrConfigBuilder {
    config: OcrConfig,
}

impl OcrConfigBuilder {
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.config.endpoint = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.config.timeout_ms = ms;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn cache_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.cache_suffix = suffix.into();
        self
    }

    pub fn backend(mut self, backend: Arc<dyn OcrBackend>) -> Self {
        self.config.backend = Some(backend);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<OcrConfig, OcrError> {
        let c = &self.config;
        if c.timeout_ms == 0 {
            return Err(OcrError::InvalidConfig("Timeout must be ≥ 1ms".into()));
        }
        if c.max_retries == 0 {
            return Err(OcrError::InvalidConfig(
                "max_retries counts the first attempt and must be ≥ 1".into(),
            ));
        }
        if c.cache_suffix.is_empty() || c.cache_suffix.contains(['/', '\\']) {
            return Err(OcrError::InvalidConfig(format!(
                "Cache suffix must be a non-empty file-name fragment, got {:?}",
                c.cache_suffix
            )));
        }
        if c.model.trim().is_empty() {
            return Err(OcrError::InvalidConfig("Model must not be empty".into()));
        }
        Ok(self.config)
    }
}

/// Per-call overrides for [`crate::OcrService::process_file`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OcrOptions {
    /// Overrides [`OcrConfig::timeout_ms`].
    pub timeout_ms: Option<u64>,
    /// Overrides [`OcrConfig::max_retries`]. Zero is treated as one.
    pub max_retries: Option<u32>,
}

impl OcrOptions {
    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = Some(ms);
        self
    }

    pub fn with_max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_contract() {
        let c = OcrConfig::default();
        assert_eq!(c.model, "mistral-ocr-latest");
        assert_eq!(c.timeout_ms, 30_000);
        assert_eq!(c.max_retries, 3);
        assert_eq!(c.retry_backoff_ms, 1000);
        assert_eq!(c.cache_suffix, "_ocr.md");
    }

    #[test]
    fn build_rejects_zero_attempts() {
        let err = OcrConfig::builder().max_retries(0).build().unwrap_err();
        assert!(matches!(err, OcrError::InvalidConfig(_)));
    }

    #[test]
    fn build_rejects_path_like_suffix() {
        assert!(OcrConfig::builder().cache_suffix("/x.md").build().is_err());
        assert!(OcrConfig::builder().cache_suffix("").build().is_err());
    }

    #[test]
    fn options_override_config() {
        let c = OcrConfig::default();
        assert_eq!(c.resolve(None), (30_000, 3));
        let opts = OcrOptions::default().with_timeout_ms(500).with_max_retries(1);
        assert_eq!(c.resolve(Some(&opts)), (500, 1));
        let zero = OcrOptions::default().with_max_retries(0);
        assert_eq!(c.resolve(Some(&zero)).1, 1);
    }

    #[test]
    fn debug_redacts_api_key() {
        let c = OcrConfig::builder().api_key("sk-secret").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("<redacted>"));
    }
}
