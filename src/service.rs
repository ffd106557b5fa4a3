//! OCR service facade: the operations a UI invokes by name.
//!
//! [`OcrService`] owns the resolved backend and the cache store and exposes
//! `process_file`, `check_cache`, `read_cache` and `save`, which map
//! one-to-one onto the host's command surface. The backend is resolved on
//! the first OCR call, so the cache operations work without an API key. The page model and the
//! stale-result guard live in [`crate::session`]; this type is stateless
//! apart from its configuration and can be shared behind an `Arc`.

use crate::cache::{save_markdown, CacheCheck, CacheContent, CacheMetadata, CacheStore};
use crate::config::{OcrConfig, OcrOptions, API_KEY_ENV};
use crate::document::Document;
use crate::error::{CacheError, OcrError, SaveError};
use crate::pipeline::backend::{MistralOcrBackend, OcrBackend};
use crate::pipeline::ocr::{self, AttemptPolicy, OcrResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

/// Cache-aware OCR entry points sharing one configuration.
pub struct OcrService {
    config: OcrConfig,
    backend: OnceCell<Arc<dyn OcrBackend>>,
    cache: CacheStore,
}

impl std::fmt::Debug for OcrService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrService")
            .field("config", &self.config)
            .field("backend", &self.backend.get().map(|b| b.name()))
            .field("cache", &self.cache)
            .finish()
    }
}

impl OcrService {
    pub fn new(config: OcrConfig) -> Self {
        let cache = CacheStore::new(config.cache_suffix.clone());
        Self {
            config,
            backend: OnceCell::new(),
            cache,
        }
    }

    pub fn config(&self) -> &OcrConfig {
        &self.config
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// The OCR backend, resolved on first use.
    ///
    /// # Errors
    /// [`OcrError::NotConfigured`] when there is neither a pre-built backend
    /// nor an API key in the config or the environment.
    pub async fn backend(&self) -> Result<&Arc<dyn OcrBackend>, OcrError> {
        self.backend
            .get_or_try_init(|| async {
                let backend = resolve_backend(&self.config)?;
                debug!("OCR service using backend '{}'", backend.name());
                Ok(backend)
            })
            .await
    }

    /// OCR the file at `path`, ignoring any cache.
    pub async fn process_file(
        &self,
        path: impl AsRef<Path>,
        options: Option<&OcrOptions>,
    ) -> Result<OcrResult, OcrError> {
        let path = path.as_ref();
        let (timeout_ms, max_attempts) = self.config.resolve(options);
        let policy = AttemptPolicy {
            timeout_ms,
            max_attempts,
            backoff_ms: self.config.retry_backoff_ms,
        };
        info!(
            "OCR {} (timeout {}ms, up to {} attempts)",
            path.display(),
            timeout_ms,
            max_attempts
        );
        let backend = self.backend().await?;
        ocr::process_path(
            backend,
            path,
            &self.config.model,
            policy,
            self.config.progress_callback.as_ref(),
        )
        .await
    }

    /// OCR an opened document, ignoring any cache.
    pub async fn process_document(
        &self,
        document: &Document,
        options: Option<&OcrOptions>,
    ) -> Result<OcrResult, OcrError> {
        self.process_file(document.path(), options).await
    }

    /// Whether a cache file exists for `document_path`, and where.
    pub async fn check_cache(&self, document_path: impl AsRef<Path>) -> CacheCheck {
        self.cache.check(document_path).await
    }

    /// Read the cache file for `document_path`.
    pub async fn read_cache(
        &self,
        document_path: impl AsRef<Path>,
    ) -> Result<CacheContent, CacheError> {
        let content = self.cache.read(document_path).await?;
        Ok(CacheContent { content })
    }

    /// Save Markdown for `document_path`.
    ///
    /// With no `target` the text goes to the cache location, so the next open
    /// of the same document loads it instead of calling OCR.
    pub async fn save(
        &self,
        document_path: impl AsRef<Path>,
        content: &str,
        target: Option<&Path>,
        include_metadata: bool,
    ) -> Result<PathBuf, SaveError> {
        if content.trim().is_empty() {
            return Err(SaveError::EmptyContent);
        }
        let document_path = document_path.as_ref();
        let metadata = include_metadata.then(|| CacheMetadata::now(document_path));
        match target {
            Some(target) => {
                save_markdown(target, content, metadata.as_ref()).await?;
                Ok(target.to_path_buf())
            }
            None => {
                self.cache
                    .write(document_path, content, metadata.as_ref())
                    .await
            }
        }
    }
}

/// Pick the backend, from most to least specific.
///
/// 1. A pre-built backend in the config (tests, custom transports)
/// 2. `config.api_key`
/// 3. The `MISTRAL_API_KEY` environment variable
fn resolve_backend(config: &OcrConfig) -> Result<Arc<dyn OcrBackend>, OcrError> {
    if let Some(ref backend) = config.backend {
        return Ok(Arc::clone(backend));
    }

    let key = config
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()));

    match key {
        Some(key) => Ok(Arc::new(MistralOcrBackend::new(
            config.endpoint.clone(),
            key,
        )?)),
        None => Err(OcrError::NotConfigured {
            hint: format!("Set {API_KEY_ENV} or pass an API key."),
        }),
    }
}
