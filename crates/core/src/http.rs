use crate::backend::BackendId;
use crate::config::BackendSettings;
use crate::error::BackendError;
use reqwest::{Client, Response};
use serde_json::Value;

pub fn build_client(settings: &BackendSettings) -> Result<Client, BackendError> {
    Client::builder()
        .timeout(settings.request_timeout)
        .user_agent(settings.user_agent.clone())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(BackendError::Http)
}

/// Turns a non-success status into a backend error.
pub fn ensure_success(backend: BackendId, response: Response) -> Result<Response, BackendError> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(BackendError::Status {
            backend,
            status: response.status().as_u16(),
        })
    }
}

pub fn content_type(response: &Response) -> String {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

pub async fn read_json(backend: BackendId, response: Response) -> Result<Value, BackendError> {
    let text = ensure_success(backend, response)?.text().await?;
    parse_json(backend, &text)
}

pub async fn read_text(backend: BackendId, response: Response) -> Result<String, BackendError> {
    Ok(ensure_success(backend, response)?.text().await?)
}

pub fn parse_json(backend: BackendId, text: &str) -> Result<Value, BackendError> {
    serde_json::from_str(text).map_err(|error| BackendError::Response {
        backend,
        details: format!("body is not valid json: {error}"),
    })
}
