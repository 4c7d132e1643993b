//! HTTP clients for the public decision portals.

pub mod anayasa;
pub mod bedesten;
pub mod karar_arama;
pub mod rekabet;
pub mod web_search;

pub use anayasa::AnayasaClient;
pub use bedesten::BedestenClient;
pub use karar_arama::KararAramaClient;
pub use rekabet::RekabetClient;
pub use web_search::WebSearchClient;

use crate::backend::BackendId;
use crate::config::BackendSettings;
use crate::error::{BackendError, SearchError};
use crate::http::build_client;
use crate::traits::{BackendClient, BackendFactory};
use async_trait::async_trait;
use scraper::{ElementRef, Selector};
use std::sync::Arc;
use url::Url;

/// Builds one HTTP client per backend on first use.
pub struct HttpBackendFactory {
    settings: BackendSettings,
}

impl HttpBackendFactory {
    pub fn new(settings: BackendSettings) -> Result<Self, SearchError> {
        settings.validate()?;
        Ok(Self { settings })
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }
}

#[async_trait]
impl BackendFactory for HttpBackendFactory {
    async fn connect(&self, backend: BackendId) -> Result<Arc<dyn BackendClient>, BackendError> {
        let http = build_client(&self.settings)?;
        let client: Arc<dyn BackendClient> = match backend {
            BackendId::Yargitay | BackendId::Danistay | BackendId::Emsal => {
                Arc::new(KararAramaClient::new(backend, http, &self.settings))
            }
            BackendId::Bedesten => Arc::new(BedestenClient::new(http, &self.settings)),
            BackendId::AnayasaNorm | BackendId::AnayasaBireysel => {
                Arc::new(AnayasaClient::new(backend, http, &self.settings))
            }
            BackendId::Rekabet => Arc::new(RekabetClient::new(http, &self.settings)),
            BackendId::Kvkk => Arc::new(WebSearchClient::kvkk(http, &self.settings)?),
            BackendId::Bddk => Arc::new(WebSearchClient::bddk(http, &self.settings)?),
        };
        Ok(client)
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector, BackendError> {
    Selector::parse(css).map_err(|error| BackendError::Decode(format!("invalid selector {css:?}: {error:?}")))
}

/// Non-empty, trimmed text nodes under `element`, in document order.
pub(crate) fn text_parts(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|part| !part.is_empty())
        .collect()
}

/// Resolves a document path against the portal, refusing other hosts.
pub(crate) fn portal_url(backend: BackendId, base: &str, path: &str) -> Result<Url, BackendError> {
    let base = Url::parse(base)?;
    let url = base.join(path)?;
    if bare_host(&url) != bare_host(&base) {
        return Err(BackendError::Response {
            backend,
            details: format!("document {path:?} is outside {}", base.as_str()),
        });
    }
    Ok(url)
}

/// Host without a leading `www.`.
pub(crate) fn bare_host(url: &Url) -> Option<String> {
    url.host_str().map(|host| host.trim_start_matches("www.").to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    #[test]
    fn document_paths_stay_on_the_portal() {
        let url = portal_url(
            BackendId::AnayasaBireysel,
            "https://kararlarbilgibankasi.anayasa.gov.tr",
            "/BB/2021/20295",
        )
        .expect("relative path joins");
        assert_eq!(url.as_str(), "https://kararlarbilgibankasi.anayasa.gov.tr/BB/2021/20295");

        let error = portal_url(
            BackendId::AnayasaBireysel,
            "https://kararlarbilgibankasi.anayasa.gov.tr",
            "https://example.com/BB/1",
        )
        .expect_err("foreign host");
        assert!(matches!(error, BackendError::Response { .. }));

        let bare_host = portal_url(BackendId::Kvkk, "https://www.kvkk.gov.tr", "https://kvkk.gov.tr/Icerik/1")
            .expect("www prefix is ignored");
        assert_eq!(bare_host.host_str(), Some("kvkk.gov.tr"));
    }

    #[test]
    fn text_parts_collapse_whitespace() {
        let document = Html::parse_fragment("<div> Birinci\n  Bölüm <span>|</span><b> 2/3/2021 </b></div>");
        let div = selector("div").expect("valid selector");
        let element = document.select(&div).next().expect("div exists");
        assert_eq!(text_parts(element), vec!["Birinci Bölüm", "|", "2/3/2021"]);
    }

    #[test]
    fn factory_rejects_invalid_settings() {
        let settings = BackendSettings {
            user_agent: " ".to_string(),
            ..BackendSettings::default()
        };
        assert!(matches!(
            HttpBackendFactory::new(settings),
            Err(SearchError::Config(_))
        ));
    }
}
