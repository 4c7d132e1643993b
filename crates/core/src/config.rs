//! Runtime configuration for the aggregation core and its HTTP backends.

use crate::backend::BackendId;
use crate::error::SearchError;
use std::collections::BTreeMap;
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Bound on a whole multi-backend search.
    pub search_timeout: Duration,
    /// Bound on one backend's answer within a search or fetch.
    pub backend_timeout: Duration,
    /// Bound on HTML/PDF conversion of one document.
    pub conversion_timeout: Duration,
    /// Targets when a request names no backends.
    pub default_backends: Vec<BackendId>,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            search_timeout: Duration::from_secs(30),
            backend_timeout: Duration::from_secs(20),
            conversion_timeout: Duration::from_secs(30),
            default_backends: BackendId::ALL.to_vec(),
        }
    }
}

impl CoreConfig {
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.search_timeout.is_zero() {
            return Err(SearchError::Config("search_timeout must be greater than 0".into()));
        }
        if self.backend_timeout.is_zero() {
            return Err(SearchError::Config("backend_timeout must be greater than 0".into()));
        }
        if self.conversion_timeout.is_zero() {
            return Err(SearchError::Config(
                "conversion_timeout must be greater than 0".into(),
            ));
        }
        if self.default_backends.is_empty() {
            return Err(SearchError::Config(
                "at least one default backend is required".into(),
            ));
        }
        Ok(())
    }
}

/// Connection settings for the HTTP backend clients.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Brave Search API token for the KVKK backend.
    pub brave_api_token: Option<String>,
    /// Tavily API key for the BDDK backend.
    pub tavily_api_key: Option<String>,
    /// Decision families queried through Bedesten.
    pub bedesten_item_types: Vec<String>,
    /// Base URL overrides, mostly for staging mirrors and tests.
    pub base_urls: BTreeMap<BackendId, String>,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(20),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            brave_api_token: None,
            tavily_api_key: None,
            bedesten_item_types: ["YARGITAYKARARI", "DANISTAYKARAR", "YERELHUKUK", "ISTINAFHUKUK", "KYB"]
                .map(String::from)
                .to_vec(),
            base_urls: BTreeMap::new(),
        }
    }
}

impl BackendSettings {
    pub fn base_url(&self, backend: BackendId, default: &str) -> String {
        self.base_urls
            .get(&backend)
            .map(String::as_str)
            .unwrap_or(default)
            .trim_end_matches('/')
            .to_string()
    }

    /// Backends whose credentials are present.
    pub fn configured_backends(&self) -> Vec<BackendId> {
        BackendId::ALL
            .into_iter()
            .filter(|backend| match backend {
                BackendId::Kvkk => has_value(&self.brave_api_token),
                BackendId::Bddk => has_value(&self.tavily_api_key),
                _ => true,
            })
            .collect()
    }

    pub fn validate(&self) -> Result<(), SearchError> {
        if self.request_timeout.is_zero() {
            return Err(SearchError::Config("request_timeout must be greater than 0".into()));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SearchError::Config("user_agent must not be empty".into()));
        }
        if self.bedesten_item_types.is_empty() {
            return Err(SearchError::Config(
                "at least one Bedesten item type is required".into(),
            ));
        }
        Ok(())
    }
}

fn has_value(value: &Option<String>) -> bool {
    value
        .as_deref()
        .map(|value| !value.trim().is_empty())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(CoreConfig::default().validate().is_ok());
        assert!(BackendSettings::default().validate().is_ok());
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        let config = CoreConfig {
            backend_timeout: Duration::ZERO,
            ..CoreConfig::default()
        };
        assert!(matches!(config.validate(), Err(SearchError::Config(_))));
    }

    #[test]
    fn search_engine_backends_need_credentials() {
        let mut settings = BackendSettings::default();
        let configured = settings.configured_backends();
        assert!(!configured.contains(&BackendId::Kvkk));
        assert!(!configured.contains(&BackendId::Bddk));

        settings.brave_api_token = Some("token".to_string());
        assert!(settings.configured_backends().contains(&BackendId::Kvkk));
    }

    #[test]
    fn base_url_overrides_drop_trailing_slash() {
        let mut settings = BackendSettings::default();
        settings
            .base_urls
            .insert(BackendId::Yargitay, "http://127.0.0.1:8080/".to_string());
        assert_eq!(
            settings.base_url(BackendId::Yargitay, "https://karararama.yargitay.gov.tr"),
            "http://127.0.0.1:8080"
        );
        assert_eq!(
            settings.base_url(BackendId::Emsal, "https://emsal.uyap.gov.tr"),
            "https://emsal.uyap.gov.tr"
        );
    }
}
