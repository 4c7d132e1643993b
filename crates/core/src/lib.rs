pub mod backend;
pub mod backends;
pub mod compactor;
pub mod config;
pub mod converter;
pub mod error;
pub mod extractor;
pub mod html;
pub mod http;
pub mod metadata;
pub mod models;
pub mod normalizer;
pub mod orchestrator;
pub mod pagination;
pub mod registry;
pub mod router;
pub mod text;
pub mod traits;
pub mod units;

pub use backend::{BackendCapabilities, BackendId, PdfPaging};
pub use backends::HttpBackendFactory;
pub use config::{BackendSettings, CoreConfig, DEFAULT_USER_AGENT};
pub use error::{BackendError, DocumentError, SearchError};
pub use models::{
    BackendFailure, CompactResult, ContentFormat, ConvertedDocument, DateRange, DocumentMetadata,
    PaginatedPage, RawDocument, SearchOutcome, SearchRequest, SortOrder,
};
pub use normalizer::{BackendQuery, Phrase, Terms};
pub use orchestrator::LegalSearchCore;
pub use pagination::CHUNK_SIZE;
pub use registry::{ClientRegistry, ShutdownReport};
pub use router::{DocumentRef, FetchRequest};
pub use traits::{BackendClient, BackendFactory};
pub use units::UnitScheme;
