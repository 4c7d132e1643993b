use crate::backend::BackendId;
use crate::config::BackendSettings;
use crate::error::BackendError;
use crate::http::read_json;
use crate::models::{ContentFormat, DocumentMetadata, RawDocument, SortOrder};
use crate::normalizer::BackendQuery;
use crate::router::FetchRequest;
use crate::traits::BackendClient;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const BEDESTEN_URL: &str = "https://bedesten.adalet.gov.tr";
const SEARCH_PATH: &str = "/emsal-karar/searchDocuments";
const DOCUMENT_PATH: &str = "/emsal-karar/getDocumentContent";
const APPLICATION_NAME: &str = "UyapMevzuat";

/// Unified decision API of the Ministry of Justice.
pub struct BedestenClient {
    http: Client,
    base_url: String,
    item_types: Vec<String>,
}

impl BedestenClient {
    pub fn new(http: Client, settings: &BackendSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url(BackendId::Bedesten, BEDESTEN_URL),
            item_types: settings.bedesten_item_types.clone(),
        }
    }

    async fn post(&self, path: &str, payload: &Value) -> Result<Value, BackendError> {
        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("AdaletApplicationName", APPLICATION_NAME)
            .header("Accept", "application/json")
            .json(payload)
            .send()
            .await?;
        read_json(BackendId::Bedesten, response).await
    }
}

#[async_trait]
impl BackendClient for BedestenClient {
    fn backend(&self) -> BackendId {
        BackendId::Bedesten
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        info!(backend = %BackendId::Bedesten, page = query.page, "searching decisions");
        let body = self.post(SEARCH_PATH, &search_payload(query, &self.item_types)).await?;
        decision_list(body)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        let payload = json!({
            "data": { "documentId": request.key },
            "applicationName": APPLICATION_NAME,
        });
        let body = self.post(DOCUMENT_PATH, &payload).await?;
        let (format, bytes) = document_content(&body)?;
        if format != request.format {
            debug!(
                backend = %BackendId::Bedesten,
                requested = %request.format,
                served = %format,
                "server chose another rendition"
            );
        }

        Ok(RawDocument {
            backend: BackendId::Bedesten,
            format,
            bytes,
            metadata: DocumentMetadata::default(),
            source_page: None,
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        debug!(backend = %BackendId::Bedesten, "client closed");
        Ok(())
    }
}

fn search_payload(query: &BackendQuery, item_types: &[String]) -> Value {
    let mut data = json!({
        "pageSize": query.page_size,
        "pageNumber": query.page,
        "itemTypeList": item_types,
        "phrase": query.phrase.as_query_text(),
        "sortFields": ["KARAR_TARIHI"],
        "sortDirection": query.sort.unwrap_or(SortOrder::Desc).as_str(),
    });
    if let Some(unit) = &query.unit {
        data["birimAdi"] = json!(unit);
    }
    if let Some(range) = &query.date_range {
        if let Some(start) = &range.start {
            data["kararTarihiStart"] = json!(iso_utc(start));
        }
        if let Some(end) = &range.end {
            data["kararTarihiEnd"] = json!(iso_utc(end));
        }
    }

    json!({
        "data": data,
        "applicationName": APPLICATION_NAME,
        "paging": true,
    })
}

fn iso_utc(bound: &DateTime<FixedOffset>) -> String {
    bound
        .with_timezone(&Utc)
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}

fn decision_list(mut body: Value) -> Result<Vec<Value>, BackendError> {
    if body.get("data").map_or(true, Value::is_null) {
        return Ok(Vec::new());
    }
    match body.pointer_mut("/data/emsalKararList").map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(BackendError::Response {
            backend: BackendId::Bedesten,
            details: "search response has no emsalKararList".to_string(),
        }),
    }
}

fn document_content(body: &Value) -> Result<(ContentFormat, Vec<u8>), BackendError> {
    let missing = |field: &str| BackendError::Response {
        backend: BackendId::Bedesten,
        details: format!("document response has no {field}"),
    };
    let content = body
        .pointer("/data/content")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("content"))?;
    let mime = body
        .pointer("/data/mimeType")
        .and_then(Value::as_str)
        .ok_or_else(|| missing("mimeType"))?;

    let format = ContentFormat::from_mime(mime).ok_or_else(|| BackendError::Response {
        backend: BackendId::Bedesten,
        details: format!("unsupported mime type {mime}"),
    })?;
    let bytes = STANDARD
        .decode(content.trim())
        .map_err(|error| BackendError::Decode(format!("bedesten content: {error}")))?;
    Ok((format, bytes))
}
