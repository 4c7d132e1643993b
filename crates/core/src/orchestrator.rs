use crate::backend::PdfPaging;
use crate::compactor;
use crate::config::CoreConfig;
use crate::converter;
use crate::error::{BackendError, DocumentError, SearchError};
use crate::models::{ConvertedDocument, PaginatedPage, SearchOutcome, SearchRequest};
use crate::normalizer::{self, BackendQuery};
use crate::pagination::paginate_many;
use crate::registry::{ClientRegistry, ShutdownReport};
use crate::router::{self, DocumentRef, Route};
use crate::traits::BackendFactory;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::info;

/// Entry point of the aggregation core: fan-out search and paged document reads.
pub struct LegalSearchCore {
    registry: Arc<ClientRegistry>,
    config: CoreConfig,
}

impl LegalSearchCore {
    pub fn new(factory: Arc<dyn BackendFactory>, config: CoreConfig) -> Result<Self, SearchError> {
        config.validate()?;
        Ok(Self {
            registry: Arc::new(ClientRegistry::new(factory)),
            config,
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let queries = normalizer::plan(request, &self.config.default_backends)?;
        info!(
            phrase = %request.phrase,
            backends = queries.len(),
            page = request.page,
            "search started"
        );

        let deadline = Instant::now() + self.config.search_timeout;
        let calls = queries.iter().map(|query| async move {
            let started = Instant::now();
            let limit = (started + self.config.backend_timeout).min(deadline);
            let outcome = match timeout_at(limit, self.search_backend(query)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(BackendError::Timeout {
                    backend: query.backend,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }),
            };
            (query.backend, outcome)
        });
        let outcomes = join_all(calls).await;

        let merged = compactor::merge(outcomes)?;
        info!(
            results = merged.results.len(),
            failed_backends = merged.backend_errors.len(),
            "search finished"
        );
        Ok(merged)
    }

    async fn search_backend(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let client = self.registry.acquire(query.backend).await?;
        client.search(query).await
    }

    pub async fn fetch_document(&self, id: &str, page_number: u32) -> Result<PaginatedPage, DocumentError> {
        self.fetch_document_pages(id, &[page_number])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DocumentError::UnknownDocumentId(id.to_string()))
    }

    /// Fetches and converts the document once, then serves every requested page from it.
    pub async fn fetch_document_pages(
        &self,
        id: &str,
        page_numbers: &[u32],
    ) -> Result<Vec<PaginatedPage>, DocumentError> {
        let route = router::route(id)?;
        info!(backend = %route.backend(), pages = ?page_numbers, "document fetch started");

        let document = self.fetch_converted(&route).await?;
        let mut pages = paginate_many(&document, page_numbers)?;

        if let Some(next) = next_source_page_id(&route, &document) {
            for page in &mut pages {
                page.next_source_page_id = Some(next.clone());
            }
        }
        Ok(pages)
    }

    async fn fetch_converted(&self, route: &Route) -> Result<ConvertedDocument, DocumentError> {
        let backend = route.backend();
        let client = self.registry.acquire(backend).await?;

        let started = Instant::now();
        let raw = timeout(
            self.config.backend_timeout,
            router::fetch_with_fallback(client.as_ref(), route),
        )
        .await
        .map_err(|_| BackendError::Timeout {
            backend,
            elapsed_ms: started.elapsed().as_millis() as u64,
        })??;

        converter::convert(raw, self.config.conversion_timeout).await
    }

    pub async fn shutdown(&self) -> ShutdownReport {
        self.registry.shutdown().await
    }
}

fn next_source_page_id(route: &Route, document: &ConvertedDocument) -> Option<String> {
    if route.backend().capabilities().pdf_paging != PdfPaging::PerSourcePage {
        return None;
    }
    match (document.source_page, document.source_page_count) {
        (Some(current), Some(count)) if current < count => Some(
            DocumentRef {
                source_page: Some(current + 1),
                ..route.document.clone()
            }
            .encode(),
        ),
        _ => None,
    }
}
