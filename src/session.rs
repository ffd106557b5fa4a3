//! Acquisition orchestration for the currently open document.
//!
//! A [`DocumentSession`] owns the page model for one open document and hands
//! out an [`AcquisitionTicket`] per open or retry. The I/O runs in the free
//! function [`acquire`], which borrows only the service and the ticket, so
//! the UI stays free to open another document while OCR is in flight. When
//! the result comes back, [`DocumentSession::complete`] applies it only if
//! the ticket still belongs to the current generation; anything older is
//! dropped.
//!
//! ```text
//! open ──▶ acquire ──▶ complete
//!           │  cache hit?  yes ─▶ read ─(fail)─┐
//!           │              no  ─────────────────┴─▶ OCR client
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use edgequake_ocr2md::{acquire, Document, DocumentSession, OcrConfig, OcrService};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let service = OcrService::new(OcrConfig::default());
//! let mut session = DocumentSession::new();
//!
//! let ticket = session.open(Document::from_path("scan.pdf", Some(2)).await?);
//! let result = acquire(&service, &ticket, None).await;
//! session.complete(&ticket, result)?;
//!
//! session.set_page(1, "# Edited title");
//! session.save(&service, None, false).await?;
//! # Ok(())
//! # }
//! ```

use crate::cache::CacheContent;
use crate::config::OcrOptions;
use crate::document::Document;
use crate::error::{OcrError, OcrErrorKind, SaveError};
use crate::pages::{fragment_count, PageMarkdown};
use crate::service::OcrService;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

/// What the UI shows for the open document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AcquisitionStatus {
    Idle,
    Processing,
    Ready { from_cache: bool },
    Failed { kind: OcrErrorKind, message: String },
}

impl AcquisitionStatus {
    pub fn is_processing(&self) -> bool {
        matches!(self, AcquisitionStatus::Processing)
    }
}

/// Where an acquisition's Markdown came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AcquisitionSource {
    Cache { cache_path: PathBuf },
    Ocr,
}

impl AcquisitionSource {
    pub fn is_cache(&self) -> bool {
        matches!(self, AcquisitionSource::Cache { .. })
    }
}

/// Flat Markdown for one document, not yet applied to a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acquisition {
    pub source: AcquisitionSource,
    pub markdown: String,
    /// Pages reported by OCR, or fragments found in the cache file.
    pub page_count: usize,
}

/// Authorises one acquisition for one open of one document.
#[derive(Debug, Clone)]
pub struct AcquisitionTicket {
    generation: u64,
    document: Document,
    use_cache: bool,
}

impl AcquisitionTicket {
    pub fn document(&self) -> &Document {
        &self.document
    }

    /// `false` for retries and uncached opens, which always go to OCR.
    pub fn use_cache(&self) -> bool {
        self.use_cache
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of [`DocumentSession::complete`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Pages were replaced.
    Applied {
        source: AcquisitionSource,
        page_count: usize,
    },
    /// The ticket was superseded by a later open or retry; nothing changed.
    Stale,
}

/// Cache lookup, then OCR on a miss or read failure.
///
/// Retry and uncached tickets skip the cache. At most one OCR call chain is made
/// per ticket.
pub async fn acquire(
    service: &OcrService,
    ticket: &AcquisitionTicket,
    options: Option<&OcrOptions>,
) -> Result<Acquisition, OcrError> {
    let path = ticket.document.path();

    if ticket.use_cache {
        let check = service.check_cache(path).await;
        if check.exists {
            match service.read_cache(path).await {
                Ok(CacheContent { content }) => {
                    info!("Loaded from cached OCR result: {}", check.cache_path.display());
                    if let Some(cb) = service.config().progress_callback.as_ref() {
                        cb.on_cache_hit(&check.cache_path);
                    }
                    let page_count = fragment_count(&content);
                    return Ok(Acquisition {
                        source: AcquisitionSource::Cache {
                            cache_path: check.cache_path,
                        },
                        markdown: content,
                        page_count,
                    });
                }
                Err(e) => warn!("Failed to load cache, proceeding with OCR: {}", e),
            }
        } else {
            debug!("No cache at {}", check.cache_path.display());
        }
    } else {
        debug!("Cache bypassed for {}", path.display());
    }

    let result = service.process_document(&ticket.document, options).await?;
    Ok(Acquisition {
        source: AcquisitionSource::Ocr,
        markdown: result.markdown,
        page_count: result.page_count,
    })
}

/// Page state and acquisition status for the open document.
#[derive(Debug)]
pub struct DocumentSession {
    document: Option<Document>,
    pages: PageMarkdown,
    generation: u64,
    source: Option<AcquisitionSource>,
    status: watch::Sender<AcquisitionStatus>,
}

impl Default for DocumentSession {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentSession {
    pub fn new() -> Self {
        let (status, _) = watch::channel(AcquisitionStatus::Idle);
        Self {
            document: None,
            pages: PageMarkdown::default(),
            generation: 0,
            source: None,
            status,
        }
    }

    /// Switch to `document`: drop the previous pages and start a fresh
    /// acquisition that may be served from cache.
    pub fn open(&mut self, document: Document) -> AcquisitionTicket {
        self.begin(document, true)
    }

    /// Like [`open`](Self::open), but the acquisition always goes to OCR.
    pub fn open_uncached(&mut self, document: Document) -> AcquisitionTicket {
        self.begin(document, false)
    }

    fn begin(&mut self, document: Document, use_cache: bool) -> AcquisitionTicket {
        self.generation += 1;
        self.pages = PageMarkdown::new(document.page_count().unwrap_or(0));
        self.source = None;
        self.document = Some(document.clone());
        self.set_status(AcquisitionStatus::Processing);
        debug!(
            "Opened {} (generation {})",
            document.path().display(),
            self.generation
        );
        AcquisitionTicket {
            generation: self.generation,
            document,
            use_cache,
        }
    }

    /// Re-run OCR for the open document, bypassing the cache.
    ///
    /// Existing pages stay visible until the new result is applied. Returns
    /// `None` when no document is open or an acquisition is already running;
    /// if an in-flight acquisition was abandoned, `open` the document again.
    pub fn retry(&mut self) -> Option<AcquisitionTicket> {
        if self.status.borrow().is_processing() {
            debug!("Retry ignored: acquisition already in flight");
            return None;
        }
        let document = self.document.clone()?;
        self.generation += 1;
        self.set_status(AcquisitionStatus::Processing);
        Some(AcquisitionTicket {
            generation: self.generation,
            document,
            use_cache: false,
        })
    }

    /// Forget the open document. Any in-flight result becomes stale.
    pub fn close(&mut self) {
        self.generation += 1;
        self.document = None;
        self.pages.clear_all();
        self.source = None;
        self.set_status(AcquisitionStatus::Idle);
    }

    /// Apply the outcome of [`acquire`] for `ticket`.
    ///
    /// A success replaces every page. A failure leaves pages untouched, marks
    /// the session failed, and is returned to the caller. Results for a
    /// superseded ticket are dropped either way.
    pub fn complete(
        &mut self,
        ticket: &AcquisitionTicket,
        result: Result<Acquisition, OcrError>,
    ) -> Result<ApplyOutcome, OcrError> {
        if ticket.generation != self.generation {
            debug!(
                "Dropping result for {} (generation {} < {})",
                ticket.document.path().display(),
                ticket.generation,
                self.generation
            );
            return Ok(ApplyOutcome::Stale);
        }

        match result {
            Ok(acquisition) => {
                let page_count = ticket
                    .document
                    .page_count()
                    .unwrap_or(acquisition.page_count);
                self.pages
                    .initialize_from_ocr(&acquisition.markdown, page_count);
                let from_cache = acquisition.source.is_cache();
                self.source = Some(acquisition.source.clone());
                self.set_status(AcquisitionStatus::Ready { from_cache });
                Ok(ApplyOutcome::Applied {
                    source: acquisition.source,
                    page_count,
                })
            }
            Err(e) => {
                warn!("OCR failed for {}: {}", ticket.document.path().display(), e);
                self.set_status(AcquisitionStatus::Failed {
                    kind: e.kind(),
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Open, acquire and apply in one call.
    pub async fn load(
        &mut self,
        service: &OcrService,
        document: Document,
        options: Option<&OcrOptions>,
    ) -> Result<ApplyOutcome, OcrError> {
        let ticket = self.open(document);
        let result = acquire(service, &ticket, options).await;
        self.complete(&ticket, result)
    }

    /// Retry, acquire and apply in one call. `Ok(None)` if no retry was issued.
    pub async fn reload(
        &mut self,
        service: &OcrService,
        options: Option<&OcrOptions>,
    ) -> Result<Option<ApplyOutcome>, OcrError> {
        let Some(ticket) = self.retry() else {
            return Ok(None);
        };
        let result = acquire(service, &ticket, options).await;
        self.complete(&ticket, result).map(Some)
    }

    /// Persist the joined pages. With no `target`, writes to the cache path.
    pub async fn save(
        &self,
        service: &OcrService,
        target: Option<&Path>,
        include_metadata: bool,
    ) -> Result<PathBuf, SaveError> {
        let document = self.document.as_ref().ok_or(SaveError::EmptyContent)?;
        service
            .save(
                document.path(),
                &self.pages.all_markdown(),
                target,
                include_metadata,
            )
            .await
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn pages(&self) -> &PageMarkdown {
        &self.pages
    }

    pub fn page(&self, page: usize) -> &str {
        self.pages.page(page)
    }

    pub fn set_page(&mut self, page: usize, content: impl Into<String>) {
        self.pages.set_page(page, content);
    }

    pub fn all_markdown(&self) -> String {
        self.pages.all_markdown()
    }

    /// Whether the current pages came from a cache file.
    pub fn loaded_from_cache(&self) -> bool {
        self.source.as_ref().is_some_and(AcquisitionSource::is_cache)
    }

    pub fn status(&self) -> AcquisitionStatus {
        self.status.borrow().clone()
    }

    /// Stream of status changes, starting with the current value.
    pub fn subscribe(&self) -> WatchStream<AcquisitionStatus> {
        WatchStream::new(self.status.subscribe())
    }

    fn set_status(&self, status: AcquisitionStatus) {
        self.status.send_replace(status);
    }
}
