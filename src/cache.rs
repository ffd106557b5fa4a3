//! OCR cache: a sibling `_ocr.md` file next to each input document.
//!
//! The cache location is derived from the document path alone, not from its
//! contents, so opening the same file twice reuses the first run's output and
//! a user can edit the cached Markdown by hand between sessions.
//!
//! Two documents in one directory that differ only by extension
//! (`scan.pdf`, `scan.png`) share a cache file. That collision is known and
//! left as is.
//!
//! Probing never fails: any I/O error while checking for the file means
//! "not cached". Reading can fail, and that failure is returned so the caller
//! can log it before falling back to OCR. Writes happen only on an explicit
//! save and go through a temp file + rename so a crash never leaves a
//! truncated cache behind.
//!
//! The metadata header is written but never parsed back. A cache file saved
//! with a header loads it into page 1 on the next open, and saving that
//! document again with a header stacks a second one on top.

use crate::config::DEFAULT_CACHE_SUFFIX;
use crate::error::{CacheError, SaveError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Header fields written above saved Markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub original_file: PathBuf,
    pub processed_at: DateTime<Utc>,
}

impl CacheMetadata {
    /// Metadata stamped with the current time.
    pub fn now(original_file: impl Into<PathBuf>) -> Self {
        Self {
            original_file: original_file.into(),
            processed_at: Utc::now(),
        }
    }

    /// The `---` delimited header block, ending in a newline.
    pub fn header(&self) -> String {
        format!(
            "---\noriginal_file: {}\nprocessed_at: {}\n---\n",
            self.original_file.display(),
            self.processed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
        )
    }
}

/// Result of [`CacheStore::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCheck {
    pub exists: bool,
    pub cache_path: PathBuf,
}

/// Result of [`CacheStore::read`] as exposed to the UI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheContent {
    pub content: String,
}

/// Locates, probes, reads and writes `_ocr.md` cache files.
#[derive(Debug, Clone)]
pub struct CacheStore {
    suffix: String,
}

impl Default for CacheStore {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_SUFFIX)
    }
}

impl CacheStore {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }

    /// Cache location for `document_path`.
    ///
    /// The last extension of the file name is replaced by the suffix:
    /// `/a/doc.pdf → /a/doc_ocr.md`, `/a/doc → /a/doc_ocr.md`,
    /// `/a/doc.v2.png → /a/doc.v2_ocr.md`.
    pub fn cache_path(&self, document_path: impl AsRef<Path>) -> PathBuf {
        let path = document_path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!("{stem}{}", self.suffix))
    }

    /// Suggested file name for a save dialog: `<stem>_ocr.md`.
    pub fn default_file_name(&self, document_path: impl AsRef<Path>) -> String {
        let stem = document_path
            .as_ref()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{stem}{}", self.suffix)
    }

    /// Whether a cache file exists. I/O errors count as "no".
    pub async fn exists(&self, document_path: impl AsRef<Path>) -> bool {
        self.check(document_path).await.exists
    }

    /// Probe for the cache file and report where it would live.
    pub async fn check(&self, document_path: impl AsRef<Path>) -> CacheCheck {
        let cache_path = self.cache_path(document_path);
        let exists = match tokio::fs::metadata(&cache_path).await {
            Ok(meta) => meta.is_file(),
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    debug!("Cache probe for {} failed: {}", cache_path.display(), e);
                }
                false
            }
        };
        CacheCheck { exists, cache_path }
    }

    /// Read the cached Markdown as opaque text (any header included).
    pub async fn read(&self, document_path: impl AsRef<Path>) -> Result<String, CacheError> {
        let path = self.cache_path(document_path);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| CacheError::ReadFailed {
                path: path.clone(),
                source,
            })?;
        debug!("Read {} bytes from cache {}", content.len(), path.display());
        Ok(content)
    }

    /// Save `content` as the cache for `document_path`.
    pub async fn write(
        &self,
        document_path: impl AsRef<Path>,
        content: &str,
        metadata: Option<&CacheMetadata>,
    ) -> Result<PathBuf, SaveError> {
        let target = self.cache_path(document_path);
        save_markdown(&target, content, metadata).await?;
        Ok(target)
    }
}

/// Write Markdown to `target`, optionally prefixed with a metadata header.
///
/// Atomic: the text goes to a temp file in the same directory, which is then
/// renamed over `target`.
pub async fn save_markdown(
    target: &Path,
    content: &str,
    metadata: Option<&CacheMetadata>,
) -> Result<(), SaveError> {
    let body = match metadata {
        Some(meta) => format!("{}{}", meta.header(), content),
        None => content.to_string(),
    };
    let target_buf = target.to_path_buf();

    let result = tokio::task::spawn_blocking(move || write_atomic(&target_buf, body.as_bytes()))
        .await
        .map_err(|e| SaveError::WriteFailed {
            path: target.to_path_buf(),
            source: std::io::Error::other(format!("save task panicked: {e}")),
        })?;

    match result {
        Ok(()) => {
            info!("Saved Markdown to {}", target.display());
            Ok(())
        }
        Err(e) => {
            warn!("Saving {} failed: {}", target.display(), e);
            Err(SaveError::from_io(target.to_path_buf(), e))
        }
    }
}

fn write_atomic(target: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cache_path_strips_last_extension() {
        let store = CacheStore::default();
        assert_eq!(store.cache_path("/a/doc.pdf"), PathBuf::from("/a/doc_ocr.md"));
        assert_eq!(store.cache_path("/a/doc"), PathBuf::from("/a/doc_ocr.md"));
        assert_eq!(
            store.cache_path("/path/to/photo.jpg"),
            PathBuf::from("/path/to/photo_ocr.md")
        );
        assert_eq!(
            store.cache_path("/a/doc.v2.png"),
            PathBuf::from("/a/doc.v2_ocr.md")
        );
        assert_eq!(
            store.cache_path("/dir.with.dots/doc"),
            PathBuf::from("/dir.with.dots/doc_ocr.md")
        );
    }

    #[test]
    fn same_basename_collides() {
        let store = CacheStore::default();
        assert_eq!(store.cache_path("/a/doc.pdf"), store.cache_path("/a/doc.png"));
    }

    #[test]
    fn custom_suffix() {
        let store = CacheStore::new(".ocr.md");
        assert_eq!(store.cache_path("/a/doc.pdf"), PathBuf::from("/a/doc.ocr.md"));
        assert_eq!(store.default_file_name("/a/doc.pdf"), "doc.ocr.md");
    }

    #[test]
    fn header_format() {
        let meta = CacheMetadata {
            original_file: "/path/to/original.pdf".into(),
            processed_at: Utc.with_ymd_and_hms(2026, 1, 11, 10, 30, 0).unwrap(),
        };
        assert_eq!(
            meta.header(),
            "---\noriginal_file: /path/to/original.pdf\nprocessed_at: 2026-01-11T10:30:00.000Z\n---\n"
        );
    }

    #[tokio::test]
    async fn check_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::default();
        let doc = dir.path().join("doc.pdf");
        let check = store.check(&doc).await;
        assert!(!check.exists);
        assert_eq!(check.cache_path, dir.path().join("doc_ocr.md"));
    }

    #[tokio::test]
    async fn directory_at_cache_path_is_not_a_hit() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("doc_ocr.md")).unwrap();
        let store = CacheStore::default();
        assert!(!store.exists(dir.path().join("doc.pdf")).await);
    }

    #[tokio::test]
    async fn write_then_read_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::default();
        let doc = dir.path().join("doc.pdf");
        let meta = CacheMetadata::now(&doc);

        let written = store.write(&doc, "# Body", Some(&meta)).await.unwrap();
        assert_eq!(written, dir.path().join("doc_ocr.md"));
        assert!(store.exists(&doc).await);

        let content = store.read(&doc).await.unwrap();
        assert!(content.starts_with("---\noriginal_file: "));
        assert!(content.ends_with("---\n# Body"));
    }

    #[tokio::test]
    async fn write_overwrites_existing() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::default();
        let doc = dir.path().join("doc.png");
        store.write(&doc, "old", None).await.unwrap();
        store.write(&doc, "new", None).await.unwrap();
        assert_eq!(store.read(&doc).await.unwrap(), "new");
    }

    #[tokio::test]
    async fn read_missing_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CacheStore::default();
        let err = store.read(dir.path().join("doc.pdf")).await.unwrap_err();
        assert!(matches!(err, CacheError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("no/such/dir/out.md");
        let err = save_markdown(&target, "x", None).await.unwrap_err();
        assert!(matches!(err, SaveError::WriteFailed { .. }), "got {err:?}");
    }
}
