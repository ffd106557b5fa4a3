//! The remote OCR boundary.
//!
//! [`OcrBackend`] is the seam between the retry loop and the network: one
//! call is one attempt. [`MistralOcrBackend`] is the production
//! implementation; tests plug in scripted backends through
//! [`crate::config::OcrConfigBuilder::backend`].
//!
//! Backends classify their own failures into [`OcrError`] variants. A
//! backend must not retry internally; that is the caller's job.

use crate::document::MimeKind;
use crate::error::OcrError;
use crate::pipeline::encode::EncodedDocument;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Request body: `{ "model": …, "document": { "type": …, … } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrRequest {
    pub model: String,
    pub document: DocumentReference,
}

impl OcrRequest {
    /// Build the request for an encoded document.
    ///
    /// PDFs go out as a `document_url`, images as an `image_url`. The service
    /// rejects the wrong shape for a given MIME type.
    pub fn new(model: impl Into<String>, encoded: &EncodedDocument) -> Self {
        let document = match encoded.kind {
            MimeKind::Pdf => DocumentReference::DocumentUrl {
                document_url: encoded.data_url.clone(),
            },
            MimeKind::Png | MimeKind::Jpeg => DocumentReference::ImageUrl {
                image_url: encoded.data_url.clone(),
            },
        };
        Self {
            model: model.into(),
            document,
        }
    }
}

/// How the document is referenced in the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DocumentReference {
    DocumentUrl { document_url: String },
    ImageUrl { image_url: String },
}

/// Response body. Only the per-page Markdown is consumed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrResponse {
    #[serde(default)]
    pub pages: Vec<OcrPage>,
}

impl OcrResponse {
    /// A response with one page per fragment, in order.
    pub fn from_pages<I, S>(pages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(index, markdown)| OcrPage {
                    index,
                    markdown: markdown.into(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OcrPage {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub markdown: String,
}

/// One OCR attempt against some service.
#[async_trait]
pub trait OcrBackend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &str;

    /// Issue a single request. Dropping the returned future must abandon it.
    async fn process(&self, request: &OcrRequest) -> Result<OcrResponse, OcrError>;
}

/// Mistral OCR over HTTPS.
pub struct MistralOcrBackend {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl MistralOcrBackend {
    /// Create a backend for `endpoint` authenticating with `api_key`.
    ///
    /// No request-level timeout is set on the HTTP client: the attempt
    /// timeout is enforced by the caller so that it classifies uniformly
    /// for every backend.
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Result<Self, OcrError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| OcrError::InvalidConfig(format!("HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        })
    }
}

impl std::fmt::Debug for MistralOcrBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MistralOcrBackend")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl OcrBackend for MistralOcrBackend {
    fn name(&self) -> &str {
        "mistral"
    }

    async fn process(&self, request: &OcrRequest) -> Result<OcrResponse, OcrError> {
        debug!("POST {} (model {})", self.endpoint, request.model);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| OcrError::Api {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let body = response.text().await.unwrap_or_default();
            return Err(classify_failure(status, &body, retry_after));
        }

        let bytes = response.bytes().await.map_err(|e| OcrError::Api {
            status: Some(status.as_u16()),
            message: format!("reading response body: {e}"),
        })?;

        parse_response(&bytes)
    }
}

/// Decode a 2xx body. Anything that is not the expected shape is an
/// invalid response, not a transport error.
pub fn parse_response(body: &[u8]) -> Result<OcrResponse, OcrError> {
    serde_json::from_slice(body).map_err(|e| OcrError::InvalidResponse {
        detail: format!("undecodable body: {e}"),
    })
}

/// Map a non-success status to an error.
///
/// 429 is a rate limit; so is any body in which the service says so under a
/// different status. Everything else is an API error.
pub fn classify_failure(status: StatusCode, body: &str, retry_after_secs: Option<u64>) -> OcrError {
    if status == StatusCode::TOO_MANY_REQUESTS || reports_rate_limit(body) {
        return OcrError::RateLimit { retry_after_secs };
    }
    let excerpt: String = body.trim().chars().take(200).collect();
    let message = if excerpt.is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {excerpt}")
    };
    OcrError::Api {
        status: Some(status.as_u16()),
        message,
    }
}

fn reports_rate_limit(body: &str) -> bool {
    let lower = body.to_ascii_lowercase();
    lower.contains("rate limit") || lower.contains("rate_limit")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OcrErrorKind;
    use crate::pipeline::encode::data_url;

    fn encoded(kind: MimeKind) -> EncodedDocument {
        EncodedDocument {
            kind,
            data_url: data_url(kind, b"x"),
            byte_len: 1,
        }
    }

    #[test]
    fn pdf_is_sent_as_document_url() {
        let req = OcrRequest::new("mistral-ocr-latest", &encoded(MimeKind::Pdf));
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["model"], "mistral-ocr-latest");
        assert_eq!(json["document"]["type"], "document_url");
        assert_eq!(json["document"]["document_url"], "data:application/pdf;base64,eA==");
        assert!(json["document"].get("image_url").is_none());
    }

    #[test]
    fn images_are_sent_as_image_url() {
        for kind in [MimeKind::Png, MimeKind::Jpeg] {
            let req = OcrRequest::new("m", &encoded(kind));
            let json = serde_json::to_value(&req).unwrap();
            assert_eq!(json["document"]["type"], "image_url");
            assert!(json["document"]["image_url"]
                .as_str()
                .unwrap()
                .starts_with(&format!("data:{}", kind.mime_type())));
        }
    }

    #[test]
    fn parses_pages() {
        let body = br##"{"pages":[{"index":0,"markdown":"# A"},{"index":1,"markdown":"# B"}],"model":"mistral-ocr-latest"}"##;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp, OcrResponse::from_pages(["# A", "# B"]));
    }

    #[test]
    fn missing_pages_field_parses_as_empty() {
        let resp = parse_response(br#"{"model":"x"}"#).unwrap();
        assert!(resp.pages.is_empty());
    }

    #[test]
    fn garbage_body_is_invalid_response() {
        let err = parse_response(b"<html>oops</html>").unwrap_err();
        assert_eq!(err.kind(), OcrErrorKind::InvalidResponse);
    }

    #[test]
    fn classifies_429_as_rate_limit() {
        let err = classify_failure(StatusCode::TOO_MANY_REQUESTS, "", Some(7));
        assert!(matches!(
            err,
            OcrError::RateLimit {
                retry_after_secs: Some(7)
            }
        ));
    }

    #[test]
    fn classifies_service_reported_rate_limit() {
        let body = r#"{"object":"error","message":"Rate limit exceeded","type":"rate_limited"}"#;
        let err = classify_failure(StatusCode::SERVICE_UNAVAILABLE, body, None);
        assert_eq!(err.kind(), OcrErrorKind::RateLimit);
    }

    #[test]
    fn classifies_other_status_as_api_error() {
        let err = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, "boom", None);
        match err {
            OcrError::Api { status, message } => {
                assert_eq!(status, Some(500));
                assert!(message.contains("boom"), "got {message}");
            }
            other => panic!("expected Api, got {other:?}"),
        }
        assert!(classify_failure(StatusCode::UNAUTHORIZED, "", None).is_retryable());
    }
}
