//! Regulators without a usable search form, reached through web search APIs.
//!
//! KVKK decision summaries are found with Brave restricted to `kvkk.gov.tr`;
//! BDDK board decisions with Tavily restricted to the document endpoint of
//! `bddk.org.tr`. Documents are then fetched from the regulator itself.

use super::{bare_host, portal_url, selector};
use crate::backend::BackendId;
use crate::compactor::parse_decision_date;
use crate::config::BackendSettings;
use crate::error::BackendError;
use crate::html::inline_text;
use crate::http::{content_type, ensure_success, read_json, read_text};
use crate::models::{ContentFormat, DocumentMetadata, RawDocument};
use crate::normalizer::BackendQuery;
use crate::router::FetchRequest;
use crate::traits::BackendClient;
use async_trait::async_trait;
use regex::Regex;
use reqwest::{Client, StatusCode};
use scraper::Html;
use serde_json::{json, Value};
use tracing::{debug, info};
use url::Url;

const BRAVE_SEARCH_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";
const KVKK_URL: &str = "https://www.kvkk.gov.tr";
const BDDK_URL: &str = "https://www.bddk.org.tr";
const BDDK_DOCUMENT_PATH: &str = "/Mevzuat/DokumanGetir/";
const BDDK_LIST_PATH: &str = "/Mevzuat/Liste/";

enum Provider {
    Brave { token: String },
    Tavily { api_key: String },
}

pub struct WebSearchClient {
    backend: BackendId,
    provider: Provider,
    http: Client,
    site_url: String,
}

impl WebSearchClient {
    pub fn kvkk(http: Client, settings: &BackendSettings) -> Result<Self, BackendError> {
        let token = credential(BackendId::Kvkk, &settings.brave_api_token, "BRAVE_API_TOKEN")?;
        Ok(Self {
            backend: BackendId::Kvkk,
            provider: Provider::Brave { token },
            http,
            site_url: settings.base_url(BackendId::Kvkk, KVKK_URL),
        })
    }

    pub fn bddk(http: Client, settings: &BackendSettings) -> Result<Self, BackendError> {
        let api_key = credential(BackendId::Bddk, &settings.tavily_api_key, "TAVILY_API_KEY")?;
        Ok(Self {
            backend: BackendId::Bddk,
            provider: Provider::Tavily { api_key },
            http,
            site_url: settings.base_url(BackendId::Bddk, BDDK_URL),
        })
    }

    async fn brave_search(&self, token: &str, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let phrase = query.phrase.as_query_text();
        let q = format!("site:kvkk.gov.tr \"karar özeti\" {phrase}");
        let response = self
            .http
            .get(BRAVE_SEARCH_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", token)
            .query(&[
                ("q", q.trim().to_string()),
                ("country", "TR".to_string()),
                ("search_lang", "tr".to_string()),
                ("ui_lang", "tr-TR".to_string()),
                ("offset", query.page.saturating_sub(1).to_string()),
                ("count", query.page_size.to_string()),
            ])
            .send()
            .await?;
        let body = read_json(self.backend, response).await?;
        brave_results(&body, &self.site_url)
    }

    async fn tavily_search(&self, api_key: &str, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        if query.page > 1 {
            debug!(backend = %self.backend, page = query.page, "search api has a single result page");
            return Ok(Vec::new());
        }

        let phrase = query.phrase.as_query_text();
        let payload = json!({
            "query": format!("{phrase} \"Karar Sayısı\"").trim(),
            "country": "turkey",
            "include_domains": [format!("{}{}", self.site_url, BDDK_DOCUMENT_PATH.trim_end_matches('/'))],
            "max_results": query.page_size,
            "search_depth": "advanced",
        });
        let response = self
            .http
            .post(TAVILY_SEARCH_URL)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;
        let body = read_json(self.backend, response).await?;
        tavily_results(&body)
    }

    async fn fetch_kvkk(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        if request.format != ContentFormat::Html {
            return Err(BackendError::FormatUnavailable {
                backend: self.backend,
                format: request.format,
            });
        }
        let url = portal_url(self.backend, &self.site_url, &request.key)?;
        let response = self.http.get(url).send().await?;
        let markup = read_text(self.backend, response).await?;
        let metadata = kvkk_metadata(&markup)?;

        Ok(RawDocument {
            backend: self.backend,
            format: ContentFormat::Html,
            bytes: markup.into_bytes(),
            metadata,
            source_page: None,
        })
    }

    async fn fetch_bddk(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        if request.key.is_empty() || !request.key.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(BackendError::Response {
                backend: self.backend,
                details: format!("document key {:?} is not a numeric BDDK id", request.key),
            });
        }

        let document_url = portal_url(self.backend, &self.site_url, &format!("{BDDK_DOCUMENT_PATH}{}", request.key))?;
        let mut response = self.http.get(document_url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(backend = %self.backend, key = %request.key, "document endpoint missed, trying list page");
            let list_url = portal_url(self.backend, &self.site_url, &format!("{BDDK_LIST_PATH}{}", request.key))?;
            response = self.http.get(list_url).send().await?;
        }

        let response = ensure_success(self.backend, response)?;
        let mime = content_type(&response);
        let bytes = response.bytes().await?.to_vec();
        let format = served_format(&mime, &bytes);
        if format != request.format {
            debug!(
                backend = %self.backend,
                requested = %request.format,
                served = %format,
                "server chose another rendition"
            );
        }

        Ok(RawDocument {
            backend: self.backend,
            format,
            bytes,
            metadata: DocumentMetadata::default(),
            source_page: None,
        })
    }
}

#[async_trait]
impl BackendClient for WebSearchClient {
    fn backend(&self) -> BackendId {
        self.backend
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        info!(backend = %self.backend, page = query.page, "searching decisions");
        let items = match &self.provider {
            Provider::Brave { token } => self.brave_search(token, query).await?,
            Provider::Tavily { api_key } => self.tavily_search(api_key, query).await?,
        };
        Ok(items.into_iter().take(query.page_size as usize).collect())
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        match self.provider {
            Provider::Brave { .. } => self.fetch_kvkk(request).await,
            Provider::Tavily { .. } => self.fetch_bddk(request).await,
        }
    }

    async fn close(&self) -> Result<(), BackendError> {
        debug!(backend = %self.backend, "client closed");
        Ok(())
    }
}

fn credential(backend: BackendId, value: &Option<String>, variable: &str) -> Result<String, BackendError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or_else(|| BackendError::NotConfigured {
            backend,
            details: format!("{variable} is not set"),
        })
}

fn brave_results(body: &Value, site_url: &str) -> Result<Vec<Value>, BackendError> {
    let site_host = bare_host(&Url::parse(site_url)?);
    let date = date_pattern()?;

    let Some(results) = body.pointer("/web/results").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let items = results
        .iter()
        .filter_map(|result| {
            let url = result.get("url").and_then(Value::as_str)?;
            if site_host.is_none() || bare_host(&Url::parse(url).ok()?) != site_host {
                return None;
            }
            let title = text_field(result, "title");
            let snippet = strip_markup(&text_field(result, "description"));
            Some(json!({
                "key": url,
                "title": title,
                "source": "KVKK",
                "date": first_date(&date, &[&title, &snippet]),
                "snippet": snippet,
            }))
        })
        .collect();
    Ok(items)
}

fn tavily_results(body: &Value) -> Result<Vec<Value>, BackendError> {
    let date = date_pattern()?;
    let Some(results) = body.get("results").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    let items = results
        .iter()
        .filter_map(|result| {
            let key = bddk_document_id(result.get("url").and_then(Value::as_str)?)?;
            let title = text_field(result, "title");
            let title = title.strip_prefix("[PDF] ").unwrap_or(&title).trim().to_string();
            let snippet = text_field(result, "content");
            Some(json!({
                "key": key,
                "date": first_date(&date, &[&title, &snippet]),
                "title": title,
                "source": "BDDK",
                "snippet": snippet,
            }))
        })
        .collect();
    Ok(items)
}

/// Numeric document id from a BDDK document, list or attachment URL.
fn bddk_document_id(url: &str) -> Option<String> {
    let digits = |rest: &str| {
        let id: String = rest.chars().take_while(char::is_ascii_digit).collect();
        (!id.is_empty()).then_some(id)
    };
    [BDDK_DOCUMENT_PATH, BDDK_LIST_PATH, "ekId="]
        .iter()
        .find_map(|marker| url.split_once(marker).and_then(|(_, rest)| digits(rest)))
}

fn kvkk_metadata(markup: &str) -> Result<DocumentMetadata, BackendError> {
    let document = Html::parse_document(markup);
    let row_selector = selector("div.blog-post-inner table tr")?;
    let cell_selector = selector("td")?;

    let mut metadata = DocumentMetadata::default();
    for row in document.select(&row_selector) {
        let cells: Vec<String> = row.select(&cell_selector).map(inline_text).collect();
        let [label, value, ..] = cells.as_slice() else {
            continue;
        };
        let value = value.trim_start_matches([':', ' ']).trim();
        if value.is_empty() {
            continue;
        }
        if label.contains("Karar Tarihi") {
            metadata.decision_date = parse_decision_date(value)
                .map(|date| date.format("%Y-%m-%d").to_string())
                .or_else(|| Some(value.to_string()));
        } else if label.contains("Karar No") {
            metadata.decision_number = Some(value.to_string());
        } else if label.contains("Konu Özeti") {
            metadata.subject = Some(value.to_string());
        }
    }
    Ok(metadata)
}

fn served_format(mime: &str, bytes: &[u8]) -> ContentFormat {
    ContentFormat::from_mime(mime).unwrap_or(if bytes.starts_with(b"%PDF") {
        ContentFormat::Pdf
    } else {
        ContentFormat::Html
    })
}

fn date_pattern() -> Result<Regex, BackendError> {
    Regex::new(r"\b\d{1,2}[./]\d{1,2}[./]\d{4}\b").map_err(|error| BackendError::Decode(error.to_string()))
}

fn first_date(pattern: &Regex, texts: &[&str]) -> Option<String> {
    texts
        .iter()
        .find_map(|text| pattern.find(text))
        .map(|found| found.as_str().to_string())
}

fn text_field(result: &Value, field: &str) -> String {
    result
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Brave highlights matches with `<strong>`.
fn strip_markup(snippet: &str) -> String {
    inline_text(Html::parse_fragment(snippet).root_element())
}
