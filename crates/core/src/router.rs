//! Document ids and fetch routing.
//!
//! Every id handed out by search has the shape
//!
//! ```text
//! v1:<namespace>:<html|pdf|any>:<payload>[:<source_page>]
//! ```
//!
//! where `payload` is the backend-native key encoded as unpadded base64url, so
//! it never contains the `:` separator. Parsing is a pure, total function:
//! anything that does not fit the grammar is an [`DocumentError::UnknownDocumentId`].

use crate::backend::{BackendId, PdfPaging};
use crate::error::{BackendError, DocumentError};
use crate::models::{ContentFormat, RawDocument};
use crate::traits::BackendClient;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tracing::warn;

pub const ID_VERSION: &str = "v1";
const ANY_FORMAT: &str = "any";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    pub backend: BackendId,
    /// `None` lets the backend's preference order decide.
    pub format: Option<ContentFormat>,
    pub key: String,
    pub source_page: Option<u32>,
}

impl DocumentRef {
    pub fn new(backend: BackendId, key: impl Into<String>) -> Self {
        let formats = backend.capabilities().formats;
        Self {
            backend,
            format: match formats {
                [single] => Some(*single),
                _ => None,
            },
            key: key.into(),
            source_page: None,
        }
    }

    pub fn with_source_page(mut self, source_page: u32) -> Self {
        self.source_page = Some(source_page);
        self
    }

    pub fn encode(&self) -> String {
        let format = self.format.map(ContentFormat::as_str).unwrap_or(ANY_FORMAT);
        let payload = URL_SAFE_NO_PAD.encode(self.key.as_bytes());
        match self.source_page {
            Some(page) => format!(
                "{ID_VERSION}:{}:{format}:{payload}:{page}",
                self.backend.namespace()
            ),
            None => format!("{ID_VERSION}:{}:{format}:{payload}", self.backend.namespace()),
        }
    }

    pub fn parse(id: &str) -> Result<Self, DocumentError> {
        let unknown = || DocumentError::UnknownDocumentId(id.to_string());

        let mut parts = id.split(':');
        let (version, namespace, format, payload) =
            match (parts.next(), parts.next(), parts.next(), parts.next()) {
                (Some(version), Some(namespace), Some(format), Some(payload)) => {
                    (version, namespace, format, payload)
                }
                _ => return Err(unknown()),
            };
        let source_page = parts.next();
        if parts.next().is_some() || version != ID_VERSION {
            return Err(unknown());
        }

        let backend = BackendId::from_namespace(namespace).ok_or_else(unknown)?;
        let capabilities = backend.capabilities();

        let format = match format {
            ANY_FORMAT => None,
            tag => {
                let format = ContentFormat::from_tag(tag).ok_or_else(unknown)?;
                if !capabilities.formats.contains(&format) {
                    return Err(unknown());
                }
                Some(format)
            }
        };

        let key = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(unknown)?;

        let source_page = match source_page {
            None => None,
            Some(raw) => {
                if capabilities.pdf_paging != PdfPaging::PerSourcePage
                    || raw.is_empty()
                    || !raw.chars().all(|c| c.is_ascii_digit())
                {
                    return Err(unknown());
                }
                let page = raw.parse::<u32>().map_err(|_| unknown())?;
                if page == 0 {
                    return Err(unknown());
                }
                Some(page)
            }
        };

        Ok(Self {
            backend,
            format,
            key,
            source_page,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub key: String,
    pub format: ContentFormat,
    pub source_page: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub document: DocumentRef,
    /// Candidate renditions, tried in order.
    pub formats: Vec<ContentFormat>,
}

impl Route {
    pub fn backend(&self) -> BackendId {
        self.document.backend
    }

    fn request(&self, format: ContentFormat) -> FetchRequest {
        let source_page = match self.document.backend.capabilities().pdf_paging {
            PdfPaging::PerSourcePage if format == ContentFormat::Pdf => {
                Some(self.document.source_page.unwrap_or(1))
            }
            _ => None,
        };
        FetchRequest {
            key: self.document.key.clone(),
            format,
            source_page,
        }
    }
}

/// Resolves an id to its backend and candidate renditions without any I/O.
pub fn route(id: &str) -> Result<Route, DocumentError> {
    let document = DocumentRef::parse(id)?;
    let formats = match document.format {
        Some(format) => vec![format],
        None => document.backend.capabilities().formats.to_vec(),
    };
    Ok(Route { document, formats })
}

/// Fetches the first rendition that answers.
///
/// The next rendition is tried only after a transient failure. A structural
/// failure such as a missing rendition ends the fetch with that error. When
/// every attempt fails, the first and last errors are both reported.
pub async fn fetch_with_fallback(
    client: &dyn BackendClient,
    route: &Route,
) -> Result<RawDocument, DocumentError> {
    let mut primary: Option<BackendError> = None;

    for (position, format) in route.formats.iter().enumerate() {
        let request = route.request(*format);
        match client.fetch(&request).await {
            Ok(document) => return Ok(document),
            Err(error) => {
                let has_next = position + 1 < route.formats.len();
                if let Some(first) = primary.take() {
                    if !has_next || !error.is_transient() {
                        return Err(DocumentError::FallbackFailed {
                            primary: Box::new(first),
                            fallback: Box::new(error),
                        });
                    }
                    primary = Some(first);
                    continue;
                }
                if !has_next || !error.is_transient() {
                    return Err(DocumentError::Backend(error));
                }
                warn!(
                    backend = %route.backend(),
                    rendition = %format,
                    error = %error,
                    "rendition failed, falling back"
                );
                primary = Some(error);
            }
        }
    }

    Err(DocumentError::NoRendition {
        backend: route.backend(),
        id: route.document.encode(),
    })
}
