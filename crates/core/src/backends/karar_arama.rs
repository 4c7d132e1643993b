//! Yargıtay, Danıştay and Emsal share one search portal product.
//!
//! Search is a JSON `POST` wrapped in `{"data": ...}` whose hits sit at
//! `data.data[]`. Documents come from `GET /getDokuman?id=`; Yargıtay and Emsal
//! wrap the markup in a JSON `data` string, Danıştay answers with bare HTML.
//!
//! Danıştay's keyword search takes quoted term lists but no chamber or date,
//! so a filtered query goes to its detailed search instead.

use super::portal_url;
use crate::backend::BackendId;
use crate::config::BackendSettings;
use crate::error::BackendError;
use crate::http::{parse_json, read_json, read_text};
use crate::models::{ContentFormat, DocumentMetadata, RawDocument, SortOrder};
use crate::normalizer::BackendQuery;
use crate::router::FetchRequest;
use crate::traits::BackendClient;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

const YARGITAY_URL: &str = "https://karararama.yargitay.gov.tr";
const DANISTAY_URL: &str = "https://karararama.danistay.gov.tr";
const EMSAL_URL: &str = "https://emsal.uyap.gov.tr";

const DETAILED_SEARCH_PATH: &str = "/aramadetaylist";
const KEYWORD_SEARCH_PATH: &str = "/aramalist";
const DOCUMENT_PATH: &str = "/getDokuman";

pub struct KararAramaClient {
    backend: BackendId,
    http: Client,
    base_url: String,
}

impl KararAramaClient {
    pub fn new(backend: BackendId, http: Client, settings: &BackendSettings) -> Self {
        let default = match backend {
            BackendId::Danistay => DANISTAY_URL,
            BackendId::Emsal => EMSAL_URL,
            _ => YARGITAY_URL,
        };
        Self {
            backend,
            http,
            base_url: settings.base_url(backend, default),
        }
    }
}

#[async_trait]
impl BackendClient for KararAramaClient {
    fn backend(&self) -> BackendId {
        self.backend
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let (path, payload) = search_payload(self.backend, query);
        info!(backend = %self.backend, page = query.page, "searching decisions");

        let response = self
            .http
            .post(format!("{}{path}", self.base_url))
            .header("Accept", "application/json, text/plain, */*")
            .header("X-Requested-With", "XMLHttpRequest")
            .json(&payload)
            .send()
            .await?;

        decision_rows(self.backend, read_json(self.backend, response).await?)
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        if request.format != ContentFormat::Html {
            return Err(BackendError::FormatUnavailable {
                backend: self.backend,
                format: request.format,
            });
        }

        let mut url = portal_url(self.backend, &self.base_url, DOCUMENT_PATH)?;
        url.query_pairs_mut().append_pair("id", &request.key);
        if self.backend == BackendId::Danistay {
            url.query_pairs_mut().append_pair("arananKelime", "");
        }

        let response = self
            .http
            .get(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        let markup = document_markup(self.backend, &read_text(self.backend, response).await?)?;

        Ok(RawDocument {
            backend: self.backend,
            format: ContentFormat::Html,
            bytes: markup.into_bytes(),
            metadata: DocumentMetadata::default(),
            source_page: None,
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        debug!(backend = %self.backend, "client closed");
        Ok(())
    }
}

fn search_payload(backend: BackendId, query: &BackendQuery) -> (&'static str, Value) {
    let (start, end) = date_bounds(query);
    let direction = query.sort.unwrap_or(SortOrder::Desc).as_str();

    match backend {
        BackendId::Danistay if query.unit.is_some() || query.date_range.is_some() => {
            if !query.phrase.is_any() {
                debug!(backend = %backend, "detailed search has no keyword field, phrase ignored");
            }
            (
                DETAILED_SEARCH_PATH,
                json!({
                    "data": {
                        "daire": query.unit.as_deref().unwrap_or_default(),
                        "baslangicTarihi": start.unwrap_or_default(),
                        "bitisTarihi": end.unwrap_or_default(),
                        "siralama": "1",
                        "siralamaDirection": direction,
                        "pageSize": query.page_size,
                        "pageNumber": query.page,
                    }
                }),
            )
        }
        BackendId::Danistay => {
            let terms = query.phrase.terms();
            let mut data = json!({
                "andKelimeler": quoted(&terms.required),
                "pageSize": query.page_size,
                "pageNumber": query.page,
            });
            for (field, words) in [
                ("orKelimeler", &terms.either),
                ("notAndKelimeler", &terms.excluded),
                ("notOrKelimeler", &terms.excluded_either),
            ] {
                if !words.is_empty() {
                    data[field] = json!(quoted(words));
                }
            }
            (KEYWORD_SEARCH_PATH, json!({ "data": data }))
        }
        BackendId::Emsal => {
            let mut data = json!({
                "arananKelime": query.phrase.as_query_text(),
                "siralama": "1",
                "siralamaDirection": direction,
                "pageSize": query.page_size,
                "pageNumber": query.page,
            });
            if let Some(start) = start {
                data["baslangicTarihi"] = json!(start);
            }
            if let Some(end) = end {
                data["bitisTarihi"] = json!(end);
            }
            (DETAILED_SEARCH_PATH, json!({ "data": data }))
        }
        _ => (
            DETAILED_SEARCH_PATH,
            json!({
                "data": {
                    "arananKelime": query.phrase.as_query_text(),
                    "birimYrgKurulDaire": query.unit.as_deref().unwrap_or("ALL"),
                    "baslangicTarihi": start.unwrap_or_default(),
                    "bitisTarihi": end.unwrap_or_default(),
                    "pageSize": query.page_size,
                    "pageNumber": query.page,
                }
            }),
        ),
    }
}

fn date_bounds(query: &BackendQuery) -> (Option<String>, Option<String>) {
    let Some(range) = &query.date_range else {
        return (None, None);
    };
    let format = |bound: &chrono::DateTime<chrono::FixedOffset>| bound.format("%d.%m.%Y").to_string();
    (range.start.as_ref().map(format), range.end.as_ref().map(format))
}

fn quoted(words: &[String]) -> Vec<String> {
    words.iter().map(|word| format!("\"{word}\"")).collect()
}

fn decision_rows(backend: BackendId, mut body: Value) -> Result<Vec<Value>, BackendError> {
    if body.is_null() || body.get("data").is_some_and(Value::is_null) {
        return Ok(Vec::new());
    }
    match body.pointer_mut("/data/data").map(Value::take) {
        Some(Value::Array(rows)) => Ok(rows),
        Some(Value::Null) => Ok(Vec::new()),
        _ => Err(BackendError::Response {
            backend,
            details: "search response has no data.data list".to_string(),
        }),
    }
}

fn document_markup(backend: BackendId, body: &str) -> Result<String, BackendError> {
    if !body.trim_start().starts_with('{') {
        return Ok(body.to_string());
    }
    match parse_json(backend, body)?.get("data") {
        Some(Value::String(markup)) => Ok(markup.clone()),
        _ => Err(BackendError::Response {
            backend,
            details: "document response has no markup in data".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DateRange;
    use crate::normalizer::Phrase;

    fn query(backend: BackendId, phrase: Phrase) -> BackendQuery {
        BackendQuery {
            backend,
            phrase,
            unit: None,
            date_range: None,
            page: 2,
            page_size: 10,
            sort: None,
        }
    }

    #[test]
    fn yargitay_payload_carries_chamber_and_dates() {
        let mut query = query(BackendId::Yargitay, Phrase::Exact("kira tespiti".to_string()));
        query.unit = Some("3. Hukuk Dairesi".to_string());
        query.date_range = Some(
            DateRange::parse(Some("2023-01-01T00:00:00+03:00"), Some("2023-12-31T23:59:59+03:00"))
                .expect("bounds parse"),
        );

        let (path, payload) = search_payload(BackendId::Yargitay, &query);
        assert_eq!(path, "/aramadetaylist");
        assert_eq!(payload["data"]["arananKelime"], "\"kira tespiti\"");
        assert_eq!(payload["data"]["birimYrgKurulDaire"], "3. Hukuk Dairesi");
        assert_eq!(payload["data"]["baslangicTarihi"], "01.01.2023");
        assert_eq!(payload["data"]["bitisTarihi"], "31.12.2023");
        assert_eq!(payload["data"]["pageNumber"], 2);
    }

    #[test]
    fn unrestricted_yargitay_search_asks_for_all_chambers() {
        let (_, payload) = search_payload(BackendId::Yargitay, &query(BackendId::Yargitay, Phrase::Any));
        assert_eq!(payload["data"]["birimYrgKurulDaire"], "ALL");
        assert_eq!(payload["data"]["arananKelime"], "");
    }

    #[test]
    fn danistay_uses_keyword_lists() {
        let phrase = Phrase::Free("+imar -iptal AND plan".to_string());
        let (path, payload) = search_payload(BackendId::Danistay, &query(BackendId::Danistay, phrase));

        assert_eq!(path, "/aramalist");
        assert_eq!(payload["data"]["andKelimeler"], json!(["\"imar\"", "\"plan\""]));
        assert_eq!(payload["data"]["notAndKelimeler"], json!(["\"iptal\""]));
        assert!(payload["data"].get("orKelimeler").is_none());
    }

    #[test]
    fn danistay_alternatives_go_to_or_lists() {
        let phrase = Phrase::Free("kira OR tahliye belediye -vergi OR -harç".to_string());
        let (_, payload) = search_payload(BackendId::Danistay, &query(BackendId::Danistay, phrase));

        assert_eq!(payload["data"]["orKelimeler"], json!(["\"kira\"", "\"tahliye\""]));
        assert_eq!(payload["data"]["andKelimeler"], json!(["\"belediye\""]));
        assert_eq!(payload["data"]["notOrKelimeler"], json!(["\"vergi\"", "\"harç\""]));
        assert!(payload["data"].get("notAndKelimeler").is_none());
    }

    #[test]
    fn danistay_chamber_or_dates_use_detailed_search() {
        let mut query = query(BackendId::Danistay, Phrase::Free("imar".to_string()));
        query.unit = Some("3. Daire".to_string());
        let (path, payload) = search_payload(BackendId::Danistay, &query);
        assert_eq!(path, "/aramadetaylist");
        assert_eq!(payload["data"]["daire"], "3. Daire");
        assert_eq!(payload["data"]["baslangicTarihi"], "");
        assert_eq!(payload["data"]["siralamaDirection"], "desc");
        assert!(payload["data"].get("andKelimeler").is_none());

        query.unit = None;
        query.date_range =
            Some(DateRange::parse(Some("2022-03-01T00:00:00+03:00"), None).expect("bound parses"));
        let (path, payload) = search_payload(BackendId::Danistay, &query);
        assert_eq!(path, "/aramadetaylist");
        assert_eq!(payload["data"]["daire"], "");
        assert_eq!(payload["data"]["baslangicTarihi"], "01.03.2022");
        assert_eq!(payload["data"]["bitisTarihi"], "");
        assert_eq!(payload["data"]["pageNumber"], 2);
    }

    #[test]
    fn emsal_omits_missing_dates_and_sorts() {
        let mut query = query(BackendId::Emsal, Phrase::Free("tazminat".to_string()));
        query.sort = Some(SortOrder::Asc);

        let (_, payload) = search_payload(BackendId::Emsal, &query);
        assert!(payload["data"].get("baslangicTarihi").is_none());
        assert_eq!(payload["data"]["siralama"], "1");
        assert_eq!(payload["data"]["siralamaDirection"], "asc");
    }

    #[test]
    fn rows_are_read_from_nested_data() {
        let body = json!({"data": {"data": [{"id": "1"}, {"id": "2"}], "recordsTotal": 2}});
        assert_eq!(decision_rows(BackendId::Yargitay, body).expect("rows").len(), 2);

        let empty = json!({"data": null});
        assert!(decision_rows(BackendId::Yargitay, empty).expect("no rows").is_empty());

        let broken = json!({"data": {"rows": []}});
        assert!(matches!(
            decision_rows(BackendId::Yargitay, broken),
            Err(BackendError::Response { .. })
        ));
    }

    #[test]
    fn markup_is_unwrapped_from_json_or_taken_as_is() {
        let wrapped = r#"{"data": "<html><body><p>Karar</p></body></html>", "metadata": {}}"#;
        assert_eq!(
            document_markup(BackendId::Yargitay, wrapped).expect("markup"),
            "<html><body><p>Karar</p></body></html>"
        );

        let bare = "<html><body><p>Danıştay kararı</p></body></html>";
        assert_eq!(document_markup(BackendId::Danistay, bare).expect("markup"), bare);

        assert!(document_markup(BackendId::Emsal, r#"{"data": null}"#).is_err());
    }
}
