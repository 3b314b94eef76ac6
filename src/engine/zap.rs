//! HTTP client for ZAP's REST-style control API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::Value;

use crate::engine::{ScanId, ZapApi};
use crate::errors::ScanError;

const API_KEY_HEADER: &str = "X-ZAP-API-Key";

/// Error envelope ZAP returns with non-success statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: String,
    message: String,
}

/// Client for one ZAP instance, e.g. `http://localhost:8080`.
#[derive(Debug, Clone)]
pub struct ZapClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl ZapClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ScanError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, ScanError> {
        let mut url = Url::parse(&format!("{}{path}", self.base_url))
            .map_err(|e| ScanError::Config(format!("Invalid ZAP address {}: {e}", self.base_url)))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Issue a GET and return the body of a successful response.
    async fn call(&self, path: &str, params: &[(&str, &str)]) -> Result<String, ScanError> {
        let url = self.endpoint(path, params)?;
        tracing::debug!(path, "Calling ZAP API");

        let mut request = self.http.get(url);
        if let Some(key) = &self.api_key {
            request = request.header(API_KEY_HEADER, key);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(body);
        }
        match serde_json::from_str::<ApiErrorBody>(&body) {
            Ok(err) => Err(ScanError::EngineApi {
                code: err.code,
                message: err.message,
            }),
            Err(_) => Err(ScanError::ControlTransport(format!(
                "{path} returned HTTP {status}"
            ))),
        }
    }

    async fn call_json(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, ScanError> {
        let body = self.call(path, params).await?;
        serde_json::from_str(&body)
            .map_err(|e| ScanError::MalformedResponse(format!("{path}: {e}")))
    }

    async fn start_scan(&self, path: &str, params: &[(&str, &str)]) -> Result<ScanId, ScanError> {
        let value = self.call_json(path, params).await?;
        string_field(&value, "scan", path).map(ScanId)
    }

    async fn scan_status(&self, path: &str, scan: &ScanId) -> Result<u8, ScanError> {
        let value = self.call_json(path, &[("scanId", scan.0.as_str())]).await?;
        let status = string_field(&value, "status", path)?;
        status
            .trim()
            .parse::<u8>()
            .map_err(|_| ScanError::MalformedResponse(format!("{path}: status {status:?}")))
    }
}

/// Read a field ZAP may encode either as a string or a bare number.
fn string_field(value: &Value, field: &str, path: &str) -> Result<String, ScanError> {
    match value.get(field) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(ScanError::MalformedResponse(format!(
            "{path}: missing \"{field}\""
        ))),
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

#[async_trait]
impl ZapApi for ZapClient {
    async fn spider_scan(&self, url: &str) -> Result<ScanId, ScanError> {
        self.start_scan("/JSON/spider/action/scan/", &[("url", url)])
            .await
    }

    async fn spider_status(&self, scan: &ScanId) -> Result<u8, ScanError> {
        self.scan_status("/JSON/spider/view/status/", scan).await
    }

    async fn active_scan(
        &self,
        url: &str,
        recurse: bool,
        in_scope_only: bool,
    ) -> Result<ScanId, ScanError> {
        self.start_scan(
            "/JSON/ascan/action/scan/",
            &[
                ("url", url),
                ("recurse", flag(recurse)),
                ("inScopeOnly", flag(in_scope_only)),
            ],
        )
        .await
    }

    async fn active_scan_status(&self, scan: &ScanId) -> Result<u8, ScanError> {
        self.scan_status("/JSON/ascan/view/status/", scan).await
    }

    async fn save_session(&self, path: &str) -> Result<(), ScanError> {
        self.call(
            "/JSON/core/action/saveSession/",
            &[("name", path), ("overwrite", "true")],
        )
        .await?;
        Ok(())
    }

    async fn new_session(&self, path: &str) -> Result<(), ScanError> {
        self.call(
            "/JSON/core/action/newSession/",
            &[("name", path), ("overwrite", "true")],
        )
        .await?;
        Ok(())
    }

    async fn get_all_alerts(&self, as_json: bool) -> Result<String, ScanError> {
        let path = if as_json {
            "/JSON/core/view/alerts/"
        } else {
            "/XML/core/view/alerts/"
        };
        self.call(path, &[]).await
    }

    async fn get_alerts_html(&self) -> Result<String, ScanError> {
        self.call("/OTHER/core/other/htmlreport/", &[]).await
    }

    async fn shutdown(&self) -> Result<(), ScanError> {
        self.call("/JSON/core/action/shutdown/", &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client() -> ZapClient {
        ZapClient::new("http://localhost:8080/", None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        assert_eq!(client().base_url(), "http://localhost:8080");
    }

    #[test]
    fn endpoint_encodes_query() {
        let url = client()
            .endpoint("/JSON/spider/action/scan/", &[("url", "http://app/?a=1&b=2")])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/JSON/spider/action/scan/?url=http%3A%2F%2Fapp%2F%3Fa%3D1%26b%3D2"
        );
    }

    #[test]
    fn endpoint_without_params_has_no_query() {
        let url = client().endpoint("/JSON/core/action/shutdown/", &[]).unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn string_field_accepts_strings_and_numbers() {
        assert_eq!(string_field(&json!({"scan": "3"}), "scan", "p").unwrap(), "3");
        assert_eq!(string_field(&json!({"status": 55}), "status", "p").unwrap(), "55");
        let err = string_field(&json!({"Result": "OK"}), "scan", "p").unwrap_err();
        assert!(matches!(err, ScanError::MalformedResponse(_)));
    }
}
