use super::{portal_url, selector, text_parts};
use crate::backend::BackendId;
use crate::config::BackendSettings;
use crate::error::BackendError;
use crate::html::inline_text;
use crate::http::{content_type, ensure_success, read_text};
use crate::models::{ContentFormat, DocumentMetadata, RawDocument};
use crate::normalizer::BackendQuery;
use crate::router::FetchRequest;
use crate::traits::BackendClient;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use tracing::{debug, info, warn};
use url::Url;

const REKABET_URL: &str = "https://www.rekabet.gov.tr";
const SEARCH_PATH: &str = "/tr/Kararlar";
const DECISION_PATH: &str = "/Karar";

/// Competition Authority decisions. The landing page of a decision links its
/// PDF, which is the primary rendition.
pub struct RekabetClient {
    http: Client,
    base_url: String,
}

impl RekabetClient {
    pub fn new(http: Client, settings: &BackendSettings) -> Self {
        Self {
            http,
            base_url: settings.base_url(BackendId::Rekabet, REKABET_URL),
        }
    }

    async fn landing_page(&self, key: &str) -> Result<(String, Vec<u8>), BackendError> {
        let mut url = portal_url(BackendId::Rekabet, &self.base_url, DECISION_PATH)?;
        url.query_pairs_mut().append_pair("kararId", key);
        let response = ensure_success(BackendId::Rekabet, self.http.get(url).send().await?)?;
        let mime = content_type(&response);
        Ok((mime, response.bytes().await?.to_vec()))
    }

    async fn download_pdf(&self, url: Url) -> Result<Vec<u8>, BackendError> {
        let response = ensure_success(BackendId::Rekabet, self.http.get(url).send().await?)?;
        let mime = content_type(&response);
        let bytes = response.bytes().await?.to_vec();
        if is_pdf(&mime, &bytes) {
            Ok(bytes)
        } else {
            Err(BackendError::FormatMismatch {
                backend: BackendId::Rekabet,
                expected: ContentFormat::Pdf,
                received: mime,
            })
        }
    }
}

#[async_trait]
impl BackendClient for RekabetClient {
    fn backend(&self) -> BackendId {
        BackendId::Rekabet
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        info!(backend = %BackendId::Rekabet, page = query.page, "searching decisions");
        let response = self
            .http
            .get(format!("{}{SEARCH_PATH}", self.base_url))
            .header("Accept", "text/html,application/xhtml+xml")
            .query(&search_params(query))
            .send()
            .await?;
        let markup = read_text(BackendId::Rekabet, response).await?;
        let items = parse_results(&markup, &self.base_url)?;
        Ok(items.into_iter().take(query.page_size as usize).collect())
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        let (mime, bytes) = self.landing_page(&request.key).await?;

        let (format, bytes) = match request.format {
            ContentFormat::Pdf if is_pdf(&mime, &bytes) => (ContentFormat::Pdf, bytes),
            ContentFormat::Pdf => {
                let markup = String::from_utf8_lossy(&bytes);
                let Some(link) = pdf_link(&markup)? else {
                    return Err(BackendError::FormatUnavailable {
                        backend: BackendId::Rekabet,
                        format: ContentFormat::Pdf,
                    });
                };
                let url = portal_url(BackendId::Rekabet, &self.base_url, &link)?;
                debug!(backend = %BackendId::Rekabet, url = %url, "downloading decision pdf");
                (ContentFormat::Pdf, self.download_pdf(url).await?)
            }
            ContentFormat::Html if is_pdf(&mime, &bytes) => {
                warn!(backend = %BackendId::Rekabet, key = %request.key, "landing page is a pdf");
                return Err(BackendError::FormatMismatch {
                    backend: BackendId::Rekabet,
                    expected: ContentFormat::Html,
                    received: mime,
                });
            }
            ContentFormat::Html => (ContentFormat::Html, bytes),
        };

        Ok(RawDocument {
            backend: BackendId::Rekabet,
            format,
            bytes,
            metadata: DocumentMetadata::default(),
            source_page: match format {
                ContentFormat::Pdf => request.source_page,
                ContentFormat::Html => None,
            },
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        debug!(backend = %BackendId::Rekabet, "client closed");
        Ok(())
    }
}

fn search_params(query: &BackendQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("sayfaAdi", String::new()),
        ("YayinlanmaTarihi", String::new()),
        ("PdfText", query.phrase.as_query_text()),
        ("KararTuruID", query.unit.clone().unwrap_or_default()),
        ("KararSayisi", String::new()),
        ("KararTarihi", String::new()),
    ];
    if query.page > 1 {
        params.push(("page", query.page.to_string()));
    }
    params
}

/// Each hit is a three-row table: publication date and decision number,
/// decision date and type, then the linked title.
fn parse_results(markup: &str, base_url: &str) -> Result<Vec<Value>, BackendError> {
    let document = Html::parse_document(markup);
    let table_selector = selector("div#kararList table.equalDivide")?;
    let row_selector = selector("tr")?;
    let cell_selector = selector("td")?;
    let title_selector = selector("td[colspan] a[href]")?;
    let base = Url::parse(base_url)?;

    let mut items = Vec::new();
    for table in document.select(&table_selector) {
        let rows: Vec<ElementRef<'_>> = table.select(&row_selector).collect();
        let [first, second, third, ..] = rows.as_slice() else {
            continue;
        };
        let Some(link) = third.select(&title_selector).next() else {
            continue;
        };
        let Some(karar_id) = link
            .value()
            .attr("href")
            .and_then(|href| base.join(href).ok())
            .and_then(|url| {
                url.query_pairs()
                    .find(|(name, _)| name.eq_ignore_ascii_case("kararId"))
                    .map(|(_, value)| value.into_owned())
            })
        else {
            continue;
        };

        let cell = |row: &ElementRef<'_>, index: usize| {
            row.select(&cell_selector)
                .nth(index)
                .map(|cell| text_parts(cell).join(" "))
                .unwrap_or_default()
        };

        items.push(json!({
            "kararId": karar_id,
            "title": inline_text(link),
            "kararTuru": cell(second, 3),
            "kararTarihi": cell(second, 1),
            "yayinlanmaTarihi": cell(first, 1),
            "kararSayisi": cell(first, 3),
        }));
    }
    Ok(items)
}

fn pdf_link(markup: &str) -> Result<Option<String>, BackendError> {
    let document = Html::parse_document(markup);
    for (css, attribute) in [("a[href]", "href"), ("iframe[src]", "src"), ("embed[src]", "src")] {
        let found = document
            .select(&selector(css)?)
            .filter_map(|element| element.value().attr(attribute))
            .map(str::trim)
            .find(|target| target.to_ascii_lowercase().contains(".pdf"));
        if let Some(target) = found {
            return Ok(Some(target.to_string()));
        }
    }
    Ok(None)
}

fn is_pdf(mime: &str, bytes: &[u8]) -> bool {
    ContentFormat::from_mime(mime) == Some(ContentFormat::Pdf) || bytes.starts_with(b"%PDF")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Phrase;

    const RESULTS_PAGE: &str = r#"
        <html><body><div id="kararList">
          <table class="equalDivide">
            <tr><td>Yayımlanma Tarihi</td><td>05.03.2024</td><td>Karar Sayısı</td><td>24-10/185-76</td><td><a href="/tr/Guncel">İlgili</a></td></tr>
            <tr><td>Karar Tarihi</td><td>22.02.2024</td><td>Karar Türü</td><td>Birleşme ve Devralma</td></tr>
            <tr><td colspan="5"><a href="/Karar?kararId=3d5a0c1e-aa01">ABC A.Ş.'nin XYZ A.Ş.'yi devralması</a></td></tr>
          </table>
          <table class="equalDivide">
            <tr><td>eksik</td></tr>
          </table>
        </div></body></html>"#;

    #[test]
    fn result_tables_become_items() {
        let items = parse_results(RESULTS_PAGE, REKABET_URL).expect("page parses");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item["kararId"], "3d5a0c1e-aa01");
        assert_eq!(item["title"], "ABC A.Ş.'nin XYZ A.Ş.'yi devralması");
        assert_eq!(item["kararTuru"], "Birleşme ve Devralma");
        assert_eq!(item["kararTarihi"], "22.02.2024");
        assert_eq!(item["yayinlanmaTarihi"], "05.03.2024");
        assert_eq!(item["kararSayisi"], "24-10/185-76");
    }

    #[test]
    fn pdf_link_is_found_in_anchor_or_embed() {
        let anchor = r#"<a href="/tr/Anasayfa">Ana sayfa</a><a href="/Kararlar/Dosya/karar.PDF">İndir</a>"#;
        assert_eq!(pdf_link(anchor).expect("parses").as_deref(), Some("/Kararlar/Dosya/karar.PDF"));

        let embedded = r#"<div><iframe src="/viewer.html"></iframe><embed src="/d/24-10.pdf"></div>"#;
        assert_eq!(pdf_link(embedded).expect("parses").as_deref(), Some("/d/24-10.pdf"));

        assert_eq!(pdf_link("<p>Karar metni</p>").expect("parses"), None);
    }

    #[test]
    fn pdf_is_recognised_by_mime_or_magic() {
        assert!(is_pdf("application/pdf; charset=binary", b""));
        assert!(is_pdf("application/octet-stream", b"%PDF-1.7"));
        assert!(!is_pdf("text/html", b"<html>"));
    }

    #[test]
    fn search_sends_decision_type_guid() {
        let query = BackendQuery {
            backend: BackendId::Rekabet,
            phrase: Phrase::Free("hakim durum".to_string()),
            unit: Some("720614bf-efd1-4dca-9785-b98eb65f2677".to_string()),
            date_range: None,
            page: 2,
            page_size: 10,
            sort: None,
        };
        let params = search_params(&query);
        assert!(params.contains(&("PdfText", "hakim durum".to_string())));
        assert!(params.contains(&("KararTuruID", "720614bf-efd1-4dca-9785-b98eb65f2677".to_string())));
        assert!(params.contains(&("page", "2".to_string())));
    }
}
