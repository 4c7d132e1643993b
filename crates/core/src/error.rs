use crate::backend::BackendId;
use crate::models::{BackendFailure, ContentFormat};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{backend} returned status {status}")]
    Status { backend: BackendId, status: u16 },

    #[error("invalid response from {backend}: {details}")]
    Response { backend: BackendId, details: String },

    #[error("{backend} did not answer within {elapsed_ms} ms")]
    Timeout { backend: BackendId, elapsed_ms: u64 },

    #[error("{backend} has no {format} rendition for this document")]
    FormatUnavailable {
        backend: BackendId,
        format: ContentFormat,
    },

    #[error("{backend} answered with {received} while {expected} was negotiated")]
    FormatMismatch {
        backend: BackendId,
        expected: ContentFormat,
        received: String,
    },

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("{backend} is not configured: {details}")]
    NotConfigured { backend: BackendId, details: String },

    #[error("client registry is shut down")]
    ShutDown,
}

impl BackendError {
    /// Failures worth answering from another rendition of the same document.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(error) => {
                error.is_timeout()
                    || error.is_connect()
                    || error.is_request()
                    || error
                        .status()
                        .map(|status| status.is_server_error())
                        .unwrap_or(false)
            }
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::Timeout { .. } | Self::FormatMismatch { .. } => true,
            Self::Response { .. }
            | Self::FormatUnavailable { .. }
            | Self::Url(_)
            | Self::Serialization(_)
            | Self::Decode(_)
            | Self::NotConfigured { .. }
            | Self::ShutDown => false,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Status { .. } => "status",
            Self::Response { .. } => "response",
            Self::Timeout { .. } => "timeout",
            Self::FormatUnavailable { .. } => "format_unavailable",
            Self::FormatMismatch { .. } => "format_mismatch",
            Self::Url(_) => "url",
            Self::Serialization(_) => "serialization",
            Self::Decode(_) => "decode",
            Self::NotConfigured { .. } => "not_configured",
            Self::ShutDown => "shutdown",
        }
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("unit filter {value:?} is not recognised by {backend}")]
    InvalidFilter { backend: BackendId, value: String },

    #[error("invalid date range: {0}")]
    InvalidRange(String),

    #[error("invalid page request: {0}")]
    InvalidPage(String),

    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    #[error("no backend can answer this request")]
    NoBackends,

    #[error("all targeted backends failed: {}", describe_failures(.0))]
    AllBackendsFailed(BTreeMap<BackendId, BackendFailure>),

    #[error("config error: {0}")]
    Config(String),
}

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unknown document id: {0}")]
    UnknownDocumentId(String),

    #[error("document from {backend} has no extractable content")]
    EmptyDocument { backend: BackendId },

    #[error("page {requested} is out of range (document has {total} pages)")]
    PageOutOfRange { requested: u32, total: u32 },

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("primary rendition failed ({primary}); fallback rendition failed ({fallback})")]
    FallbackFailed {
        primary: Box<BackendError>,
        fallback: Box<BackendError>,
    },

    #[error("no rendition of {backend} document {id} was attempted")]
    NoRendition { backend: BackendId, id: String },

    #[error("pdf parse error: {0}")]
    Pdf(String),

    #[error("conversion of {backend} document exceeded {timeout_ms} ms")]
    ConversionTimeout { backend: BackendId, timeout_ms: u64 },

    #[error("conversion task failed: {0}")]
    Conversion(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),
}

fn describe_failures(failures: &BTreeMap<BackendId, BackendFailure>) -> String {
    failures
        .iter()
        .map(|(backend, failure)| format!("{backend}: {}", failure.message))
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_split_on_server_side() {
        let server = BackendError::Status {
            backend: BackendId::Yargitay,
            status: 503,
        };
        let client = BackendError::Status {
            backend: BackendId::Yargitay,
            status: 404,
        };

        assert!(server.is_transient());
        assert!(!client.is_transient());
    }

    #[test]
    fn missing_rendition_is_never_transient() {
        let error = BackendError::FormatUnavailable {
            backend: BackendId::Rekabet,
            format: ContentFormat::Pdf,
        };
        assert!(!error.is_transient());
        assert_eq!(error.kind(), "format_unavailable");
    }

    #[test]
    fn all_failed_lists_every_backend() {
        let mut failures = BTreeMap::new();
        failures.insert(
            BackendId::Yargitay,
            BackendFailure {
                kind: "timeout".to_string(),
                message: "slow".to_string(),
            },
        );
        failures.insert(
            BackendId::Danistay,
            BackendFailure {
                kind: "http".to_string(),
                message: "refused".to_string(),
            },
        );

        let message = SearchError::AllBackendsFailed(failures).to_string();
        assert!(message.contains("yargitay: slow"));
        assert!(message.contains("danistay: refused"));
    }
}
