//! Payload encoding: document bytes → base64 `data:` URL.
//!
//! The OCR service accepts documents inline as data URLs, which avoids a
//! separate upload step and keeps each attempt a single request. The MIME
//! type is taken from the extension before the file is opened, so an
//! unsupported format fails without any I/O.

use crate::document::MimeKind;
use crate::error::OcrError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::Path;
use tracing::debug;

/// A document ready to be embedded in a request body.
#[derive(Debug, Clone)]
pub struct EncodedDocument {
    pub kind: MimeKind,
    /// `data:<mime>;base64,<payload>`
    pub data_url: String,
    /// Size of the raw file in bytes.
    pub byte_len: usize,
}

/// Read `path` and encode it for the OCR request.
///
/// # Errors
/// * [`OcrError::UnsupportedFormat`] for an unknown extension
/// * [`OcrError::ReadFailed`] when the file cannot be read
pub async fn encode_document(path: &Path) -> Result<EncodedDocument, OcrError> {
    let kind = MimeKind::require(path)?;
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| OcrError::ReadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let data_url = data_url(kind, &bytes);
    debug!(
        "Encoded {} ({} bytes) → {} bytes data URL",
        path.display(),
        bytes.len(),
        data_url.len()
    );

    Ok(EncodedDocument {
        kind,
        data_url,
        byte_len: bytes.len(),
    })
}

/// Wrap raw bytes in a base64 data URL.
pub fn data_url(kind: MimeKind, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", kind.mime_type(), STANDARD.encode(bytes))
}
