//! Document references handed to the acquisition pipeline.
//!
//! A [`Document`] is immutable: it names a file on disk and what we already
//! know about it. Format and size checks normally happen upstream (the file
//! picker); [`Document::from_path`] exists for callers like the CLI that have
//! nothing but a path.

use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// The three formats the OCR service accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MimeKind {
    Pdf,
    Png,
    Jpeg,
}

impl MimeKind {
    /// Infer the kind strictly from the file extension (case-insensitive).
    ///
    /// Returns `None` for anything other than `.pdf`, `.png`, `.jpg`, `.jpeg`,
    /// including paths without an extension. File contents are never sniffed.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(MimeKind::Pdf),
            "png" => Some(MimeKind::Png),
            "jpg" | "jpeg" => Some(MimeKind::Jpeg),
            _ => None,
        }
    }

    /// Like [`MimeKind::from_path`] but produces the pre-network error.
    pub fn require(path: &Path) -> Result<Self, OcrError> {
        Self::from_path(path).ok_or_else(|| OcrError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: path
                .extension()
                .map(|e| format!(".{}", e.to_string_lossy()))
                .unwrap_or_default(),
        })
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            MimeKind::Pdf => "application/pdf",
            MimeKind::Png => "image/png",
            MimeKind::Jpeg => "image/jpeg",
        }
    }

    /// Images are always a single page.
    pub fn is_image(self) -> bool {
        !matches!(self, MimeKind::Pdf)
    }
}

/// An input document: `{ path, kind, byte_size, page_count? }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    path: PathBuf,
    kind: MimeKind,
    byte_size: u64,
    page_count: Option<usize>,
}

impl Document {
    /// Build a document from already-validated parts.
    ///
    /// `page_count` is ignored for images (always 1) and a declared count of
    /// zero is treated as unknown.
    pub fn new(
        path: impl Into<PathBuf>,
        kind: MimeKind,
        byte_size: u64,
        page_count: Option<usize>,
    ) -> Self {
        let page_count = if kind.is_image() {
            Some(1)
        } else {
            page_count.filter(|&n| n > 0)
        };
        Self {
            path: path.into(),
            kind,
            byte_size,
            page_count,
        }
    }

    /// Stat `path`, infer its kind from the extension and wrap it.
    ///
    /// `declared_pages` is the PDF page count if the caller knows it.
    pub async fn from_path(
        path: impl AsRef<Path>,
        declared_pages: Option<usize>,
    ) -> Result<Self, OcrError> {
        let path = path.as_ref();
        let kind = MimeKind::require(path)?;
        let meta = tokio::fs::metadata(path)
            .await
            .map_err(|e| OcrError::ReadFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        if !meta.is_file() {
            return Err(OcrError::ReadFailed {
                path: path.to_path_buf(),
                reason: "not a regular file".into(),
            });
        }
        debug!("Document {} ({:?}, {} bytes)", path.display(), kind, meta.len());
        Ok(Self::new(path, kind, meta.len(), declared_pages))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> MimeKind {
        self.kind
    }

    pub fn byte_size(&self) -> u64 {
        self.byte_size
    }

    /// Known page count: `Some(1)` for images, the declared count for PDFs.
    pub fn page_count(&self) -> Option<usize> {
        self.page_count
    }
}
