use crate::error::BackendError;
use crate::{BackendId, BackendQuery, FetchRequest, RawDocument};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// One institution's search portal or API.
///
/// `search` returns items in the backend's own shape; the compactor lifts them
/// into compact results through the backend's schema.
#[async_trait]
pub trait BackendClient: Send + Sync {
    fn backend(&self) -> BackendId;

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError>;

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError>;

    async fn close(&self) -> Result<(), BackendError>;
}

#[async_trait]
pub trait BackendFactory: Send + Sync {
    async fn connect(&self, backend: BackendId) -> Result<Arc<dyn BackendClient>, BackendError>;
}
