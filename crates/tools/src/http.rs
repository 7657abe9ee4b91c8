//! Shared HTTP Client
//!
//! Thin JSON client used by the Prometheus and Grafana adapters.

use reqwest::{Client, Method};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::{Error, Result};

/// JSON API client bound to a base URL
#[derive(Debug, Clone)]
pub struct HttpClient {
    base_url: String,
    api_key: Option<String>,
    client: Client,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Issue a request and decode the JSON response. Parameters set to `None` are not sent.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        params: &[(&str, Option<String>)],
        body: Option<&Value>,
    ) -> Result<Value> {
        let url = self.url(endpoint);
        let query: Vec<(&str, &str)> = params
            .iter()
            .filter_map(|(k, v)| v.as_deref().map(|v| (*k, v)))
            .collect();

        debug!("{} {} {:?}", method, url, query);

        let mut request = self
            .client
            .request(method, &url)
            .query(&query)
            .timeout(self.timeout);

        if let Some(token) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Http(format!("Failed to connect to {}: {}", self.base_url, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::Http(format!("Failed to read response from {}: {}", url, e)))?;
        let payload: Value = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if status.as_u16() >= 400 {
            return Err(Error::Api(format!("{} ({})", error_message(&payload), status)));
        }

        Ok(payload)
    }

    pub async fn get(&self, endpoint: &str, params: &[(&str, Option<String>)]) -> Result<Value> {
        self.request(Method::GET, endpoint, params, None).await
    }

    pub async fn post(&self, endpoint: &str, body: &Value) -> Result<Value> {
        self.request(Method::POST, endpoint, &[], Some(body)).await
    }
}

/// Pull the error text out of a Prometheus (`error`) or Grafana (`message`) error body.
fn error_message(payload: &Value) -> String {
    payload
        .get("error")
        .or_else(|| payload.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| payload.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| "Unknown error".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let client = HttpClient::new("http://localhost:9090/api/v1/", None);
        assert_eq!(client.base_url(), "http://localhost:9090/api/v1");
        assert_eq!(client.url("/query"), "http://localhost:9090/api/v1/query");
        assert_eq!(client.url("query"), "http://localhost:9090/api/v1/query");
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(&json!({"status": "error", "error": "bad query"})), "bad query");
        assert_eq!(error_message(&json!({"message": "Unauthorized"})), "Unauthorized");
        assert_eq!(error_message(&json!({})), "Unknown error");
        assert_eq!(error_message(&Value::String("gateway timeout".into())), "gateway timeout");
    }

    #[tokio::test]
    async fn test_connection_failure_is_http_error() {
        let client = HttpClient::new("http://127.0.0.1:1", None).with_timeout(Duration::from_secs(2));
        let err = client.get("query", &[]).await.unwrap_err();
        assert!(matches!(err, Error::Http(ref m) if m.contains("Failed to connect")));
    }
}
