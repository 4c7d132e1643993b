//! Constitutional Court decision banks, scraped from their HTML portals.
//!
//! Norm review decisions (`normkararlarbilgibankasi`) and individual
//! application decisions (`kararlarbilgibankasi`, bulletin view) share the
//! search form conventions and the decision page layout, but list results
//! with different card markup.

use super::{portal_url, selector, text_parts};
use crate::backend::BackendId;
use crate::compactor::parse_decision_date;
use crate::config::BackendSettings;
use crate::error::BackendError;
use crate::html::{inline_text, select_attr};
use crate::http::read_text;
use crate::models::{ContentFormat, DocumentMetadata, RawDocument};
use crate::normalizer::BackendQuery;
use crate::router::FetchRequest;
use crate::traits::BackendClient;
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html};
use serde_json::{json, Value};
use tracing::{debug, info};

const NORM_URL: &str = "https://normkararlarbilgibankasi.anayasa.gov.tr";
const BIREYSEL_URL: &str = "https://kararlarbilgibankasi.anayasa.gov.tr";
const SEARCH_PATH: &str = "/Ara";

pub struct AnayasaClient {
    backend: BackendId,
    http: Client,
    base_url: String,
}

impl AnayasaClient {
    pub fn new(backend: BackendId, http: Client, settings: &BackendSettings) -> Self {
        let default = match backend {
            BackendId::AnayasaBireysel => BIREYSEL_URL,
            _ => NORM_URL,
        };
        Self {
            backend,
            http,
            base_url: settings.base_url(backend, default),
        }
    }
}

#[async_trait]
impl BackendClient for AnayasaClient {
    fn backend(&self) -> BackendId {
        self.backend
    }

    async fn search(&self, query: &BackendQuery) -> Result<Vec<Value>, BackendError> {
        let params = search_params(self.backend, query);
        info!(backend = %self.backend, page = query.page, "searching decisions");

        let response = self
            .http
            .get(format!("{}{SEARCH_PATH}", self.base_url))
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "tr-TR,tr;q=0.9")
            .query(&params)
            .send()
            .await?;
        let markup = read_text(self.backend, response).await?;

        let items = match self.backend {
            BackendId::AnayasaBireysel => parse_bulletin_results(&markup)?,
            _ => parse_norm_results(&markup)?,
        };
        Ok(items.into_iter().take(query.page_size as usize).collect())
    }

    async fn fetch(&self, request: &FetchRequest) -> Result<RawDocument, BackendError> {
        if request.format != ContentFormat::Html {
            return Err(BackendError::FormatUnavailable {
                backend: self.backend,
                format: request.format,
            });
        }

        let url = portal_url(self.backend, &self.base_url, &request.key)?;
        let response = self.http.get(url).send().await?;
        let markup = read_text(self.backend, response).await?;
        let metadata = page_metadata(&markup)?;

        Ok(RawDocument {
            backend: self.backend,
            format: ContentFormat::Html,
            bytes: markup.into_bytes(),
            metadata,
            source_page: None,
        })
    }

    async fn close(&self) -> Result<(), BackendError> {
        debug!(backend = %self.backend, "client closed");
        Ok(())
    }
}

fn search_params(backend: BackendId, query: &BackendQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if backend == BackendId::AnayasaBireysel {
        params.push(("KararBulteni", "1".to_string()));
    }

    let terms = query.phrase.terms();
    params.extend(terms.required.into_iter().map(|word| ("KelimeAra[]", word)));
    match backend {
        BackendId::AnayasaNorm => {
            params.extend(terms.either.into_iter().map(|word| ("HerhangiBirKelimeAra[]", word)));
            params.extend(
                terms
                    .excluded
                    .into_iter()
                    .chain(terms.excluded_either)
                    .map(|word| ("BulunmayanKelimeAra[]", word)),
            );
        }
        _ => {
            let dropped: Vec<String> = terms
                .either
                .into_iter()
                .chain(terms.excluded)
                .chain(terms.excluded_either)
                .collect();
            if !dropped.is_empty() {
                debug!(backend = %backend, dropped = ?dropped, "bulletin search only takes required words");
            }
        }
    }

    if query.page > 1 {
        params.push(("page", query.page.to_string()));
    }
    params
}

fn parse_norm_results(markup: &str) -> Result<Vec<Value>, BackendError> {
    let document = Html::parse_document(markup);
    let card_selector = selector("div.birkarar")?;
    let link_selector = selector("a[href]")?;
    let heading_selector = selector("div.bkararbaslik")?;
    let info_selector = selector("div.kararbilgileri")?;
    let reference = Regex::new(r"E\.\s*\d+/\d+\s*,\s*K\.\s*\d+/\d+")
        .map_err(|error| BackendError::Decode(error.to_string()))?;

    let mut items = Vec::new();
    for card in document.select(&card_selector) {
        let Some(path) = first_attr(card, &link_selector, "href") else {
            continue;
        };
        let heading = card
            .select(&heading_selector)
            .next()
            .map(inline_text)
            .unwrap_or_default();
        let title = reference
            .find(&heading)
            .map(|found| found.as_str().to_string())
            .unwrap_or_else(|| heading.split("Sayılı Karar").next().unwrap_or_default().trim().to_string());

        let parts: Vec<String> = card
            .select(&info_selector)
            .next()
            .map(text_parts)
            .unwrap_or_default()
            .iter()
            .flat_map(|part| part.split('|'))
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let decision_date = labelled_value(&parts, "Karar Tarihi");
        let details: Vec<&str> = parts
            .iter()
            .filter(|part| !part.contains("Karar Tarihi"))
            .map(String::as_str)
            .collect();

        items.push(json!({
            "path": path,
            "title": title,
            "unit": details.first().copied().unwrap_or_default(),
            "decisionDate": decision_date,
            "subject": details.iter().skip(1).copied().collect::<Vec<_>>().join(", "),
        }));
    }
    Ok(items)
}

fn parse_bulletin_results(markup: &str) -> Result<Vec<Value>, BackendError> {
    let document = Html::parse_document(markup);
    let card_selector = selector("div.KararBulteniBirKarar")?;
    let heading_selector = selector("h4")?;
    let summary_selector = selector("div.AltiCizili")?;
    let link_selector = selector("a[href]")?;
    let div_selector = selector("div")?;

    let mut items = Vec::new();
    for card in document.select(&card_selector) {
        let Some(summary) = card.select(&summary_selector).next() else {
            continue;
        };
        let Some(link) = summary.select(&link_selector).next() else {
            continue;
        };
        let path = link.value().attr("href").unwrap_or_default().trim().to_string();
        if path.is_empty() {
            continue;
        }
        let reference = inline_text(link);

        let parts: Vec<String> = text_parts(summary)
            .into_iter()
            .filter(|part| part != "|" && *part != reference)
            .collect();
        let decision_date = labelled_value(&parts, "Karar Tarihi");
        let details: Vec<&str> = parts
            .iter()
            .filter(|part| !part.contains("Tarihi"))
            .map(String::as_str)
            .collect();
        let unit = details.get(1).or(details.first()).copied().unwrap_or_default();

        let heading = card
            .select(&heading_selector)
            .next()
            .map(inline_text)
            .unwrap_or_default();
        let title = [heading.as_str(), reference.as_str()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let subject = card
            .select(&div_selector)
            .filter(|div| div.value().attr("class").is_none())
            .map(inline_text)
            .find_map(|text| {
                text.strip_prefix("BAŞVURU KONUSU")
                    .map(|rest| rest.trim_start_matches([' ', ':']).to_string())
            })
            .unwrap_or_default();

        items.push(json!({
            "path": path,
            "title": title,
            "unit": unit,
            "decisionDate": decision_date,
            "subject": subject,
        }));
    }
    Ok(items)
}

/// Metadata from the page description and the decision details table.
fn page_metadata(markup: &str) -> Result<DocumentMetadata, BackendError> {
    let document = Html::parse_document(markup);
    let mut metadata = DocumentMetadata::default();

    if let Some(content) = select_attr(&document, r#"meta[name="description"]"#, "content") {
        if let Some((_, rest)) = content.split_once("B. No:") {
            let number = rest.split(',').next().unwrap_or_default().trim();
            if !number.is_empty() {
                metadata.case_number = Some(number.to_string());
            }
        }
        if let Some((before, _)) = content.split_once('§') {
            metadata.decision_date = before
                .split(',')
                .rev()
                .map(str::trim)
                .find(|part| !part.is_empty())
                .and_then(iso_date);
        }
    }

    let row_selector = selector("div#KararDetaylari table tr")?;
    let cell_selector = selector("td")?;
    for row in document.select(&row_selector) {
        let cells: Vec<String> = row.select(&cell_selector).map(inline_text).collect();
        let [label, value] = cells.as_slice() else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if label.contains("Karar Tarihi") {
            metadata.decision_date = metadata.decision_date.or_else(|| iso_date(value));
        } else if label.contains("Başvuru No") || label.contains("Esas No") {
            metadata.case_number = metadata.case_number.or_else(|| Some(value.clone()));
        } else if label.contains("Karar No") {
            metadata.decision_number = metadata.decision_number.or_else(|| Some(value.clone()));
        } else if label.contains("Konu") {
            metadata.subject = metadata.subject.or_else(|| Some(value.clone()));
        }
    }

    Ok(metadata)
}

fn iso_date(raw: &str) -> Option<String> {
    parse_decision_date(raw).map(|date| date.format("%Y-%m-%d").to_string())
}

/// Value following `label` in the same text part, or the next part when the
/// label stands alone.
fn labelled_value(parts: &[String], label: &str) -> Option<String> {
    let position = parts.iter().position(|part| part.contains(label))?;
    let inline = parts[position]
        .split_once(label)
        .map(|(_, rest)| rest.trim_start_matches([' ', ':']).trim().to_string())
        .unwrap_or_default();
    if !inline.is_empty() {
        return Some(inline);
    }
    parts
        .get(position + 1)
        .map(|next| next.trim_start_matches([' ', ':']).trim().to_string())
        .filter(|next| !next.is_empty())
}

fn first_attr(element: ElementRef<'_>, selector: &scraper::Selector, attribute: &str) -> Option<String> {
    element
        .select(selector)
        .find_map(|found| found.value().attr(attribute))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Phrase;

    const NORM_PAGE: &str = r#"
        <html><body>
          <div class="bulunankararsayisi">2 Karar Bulundu</div>
          <div class="birkarar">
            <a href="/ND/2019/77">
              <div class="bkararbaslik">E.2018/95, K.2019/77 Sayılı Karar
                <div class="BulunanKelimeSayisi">Bulunan Kelime Sayısı 4</div>
              </div>
              <div class="kararbilgileri">İptal|Ana Muhalefet Partisi|Esas (Red)|Karar Tarihi: 20/11/2019</div>
            </a>
          </div>
          <div class="birkarar"><div class="bkararbaslik">bağlantısız kart</div></div>
        </body></html>"#;

    const BULLETIN_PAGE: &str = r#"
        <html><body><div class="HaberBulteni">
          <div class="KararBulteniBirKarar">
            <h4><strong>AHMET YILMAZ BAŞVURUSUNA İLİŞKİN KARAR</strong></h4>
            <div class="AltiCizili">
              <a href="/BB/2018/10000">2018/10000</a>
              <span>İhlal</span><span>Birinci Bölüm</span>
              <span>Başvuru Tarihi : 12/3/2018</span><span>Karar Tarihi : 24/6/2020</span>
            </div>
            <div>BAŞVURU KONUSU : Makul sürede yargılanma hakkının ihlal edildiği iddiası.</div>
          </div>
        </div></body></html>"#;

    #[test]
    fn norm_cards_become_items() {
        let items = parse_norm_results(NORM_PAGE).expect("page parses");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["path"], "/ND/2019/77");
        assert_eq!(items[0]["title"], "E.2018/95, K.2019/77");
        assert_eq!(items[0]["unit"], "İptal");
        assert_eq!(items[0]["decisionDate"], "20/11/2019");
        assert_eq!(items[0]["subject"], "Ana Muhalefet Partisi, Esas (Red)");
    }

    #[test]
    fn bulletin_cards_become_items() {
        let items = parse_bulletin_results(BULLETIN_PAGE).expect("page parses");
        assert_eq!(items.len(), 1);
        let item = &items[0];
        assert_eq!(item["path"], "/BB/2018/10000");
        assert_eq!(item["title"], "AHMET YILMAZ BAŞVURUSUNA İLİŞKİN KARAR, 2018/10000");
        assert_eq!(item["unit"], "Birinci Bölüm");
        assert_eq!(item["decisionDate"], "24/6/2020");
        assert_eq!(
            item["subject"],
            "Makul sürede yargılanma hakkının ihlal edildiği iddiası."
        );
    }

    #[test]
    fn decision_page_metadata_prefers_description() {
        let markup = r#"<html><head>
            <meta name="description" content="Ahmet Yılmaz, B. No: 2018/10000, 24/6/2020, § 35">
            </head><body>
            <div id="KararDetaylari"><table class="table">
              <tr><td>Karar Tarihi</td><td>1/1/2000</td></tr>
              <tr><td>Kararı Veren Birim</td><td>Birinci Bölüm</td></tr>
            </table></div>
            </body></html>"#;

        let metadata = page_metadata(markup).expect("metadata parses");
        assert_eq!(metadata.case_number.as_deref(), Some("2018/10000"));
        assert_eq!(metadata.decision_date.as_deref(), Some("2020-06-24"));
    }

    #[test]
    fn norm_search_splits_words() {
        let query = BackendQuery {
            backend: BackendId::AnayasaNorm,
            phrase: Phrase::Free("mülkiyet -kamulaştırma".to_string()),
            unit: None,
            date_range: None,
            page: 3,
            page_size: 10,
            sort: None,
        };
        let params = search_params(BackendId::AnayasaNorm, &query);
        assert_eq!(
            params,
            vec![
                ("KelimeAra[]", "mülkiyet".to_string()),
                ("BulunmayanKelimeAra[]", "kamulaştırma".to_string()),
                ("page", "3".to_string()),
            ]
        );

        let bulletin = search_params(BackendId::AnayasaBireysel, &BackendQuery { page: 1, ..query });
        assert_eq!(
            bulletin,
            vec![
                ("KararBulteni", "1".to_string()),
                ("KelimeAra[]", "mülkiyet".to_string()),
            ]
        );
    }

    #[test]
    fn norm_search_sends_alternatives_separately() {
        let query = BackendQuery {
            backend: BackendId::AnayasaNorm,
            phrase: Phrase::Free("kira OR tahliye NOT faiz".to_string()),
            unit: None,
            date_range: None,
            page: 1,
            page_size: 10,
            sort: None,
        };
        assert_eq!(
            search_params(BackendId::AnayasaNorm, &query),
            vec![
                ("HerhangiBirKelimeAra[]", "kira".to_string()),
                ("HerhangiBirKelimeAra[]", "tahliye".to_string()),
                ("BulunmayanKelimeAra[]", "faiz".to_string()),
            ]
        );

        let bulletin = search_params(BackendId::AnayasaBireysel, &query);
        assert_eq!(bulletin, vec![("KararBulteni", "1".to_string())]);
        assert!(bulletin.iter().all(|(_, value)| !value.starts_with('-')));
    }
}
