//! Client for the hosted REST data API (`/rest/v1/{table}`).

use crate::errors::StoreError;
use crate::store::{DataStore, Filter, Row, SelectOptions};
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info};

#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        headers.insert("apikey", header_value(api_key)?);
        headers.insert(AUTHORIZATION, header_value(&format!("Bearer {api_key}"))?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));

        let http = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;

        info!(url = base_url, key_len = api_key.len(), "data API client initialized");
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    async fn send(&self, verb: &str, table: &str, request: RequestBuilder) -> Result<Vec<Row>, StoreError> {
        let result = execute(request).await;
        if let Err(err) = &result {
            error!(table, "data API {verb} failed: {err}");
        }
        result
    }
}

#[async_trait]
impl DataStore for RestClient {
    async fn select(&self, table: &str, options: &SelectOptions) -> Result<Vec<Row>, StoreError> {
        let pairs = options.query_pairs();
        debug!(table, ?pairs, "data API select");
        let request = self.http.get(self.table_url(table)).query(&pairs);
        self.send("select", table, request).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Vec<Row>, StoreError> {
        debug!(table, "data API insert");
        let request = self.http.post(self.table_url(table)).json(&row);
        self.send("insert", table, request).await
    }

    async fn update(&self, table: &str, filter: &Filter, row: Row) -> Result<Vec<Row>, StoreError> {
        let pairs = filter.query_pairs();
        debug!(table, ?pairs, "data API update");
        let request = self.http.patch(self.table_url(table)).query(&pairs).json(&row);
        self.send("update", table, request).await
    }

    async fn delete(&self, table: &str, filter: &Filter) -> Result<Vec<Row>, StoreError> {
        let pairs = filter.query_pairs();
        debug!(table, ?pairs, "data API delete");
        let request = self.http.delete(self.table_url(table)).query(&pairs);
        self.send("delete", table, request).await
    }
}

async fn execute(request: RequestBuilder) -> Result<Vec<Row>, StoreError> {
    let response = request.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(StoreError::Status {
            status: status.as_u16(),
            message: error_message(&body, status.canonical_reason().unwrap_or("request failed")),
        });
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    match serde_json::from_slice::<Value>(&body)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        Value::Object(row) => Ok(vec![row]),
        _ => Ok(Vec::new()),
    }
}

/// Prefers the store's own `message` field over the bare status text.
fn error_message(body: &[u8], fallback: &str) -> String {
    serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_string();
            if text.is_empty() { fallback.to_string() } else { text }
        })
}

fn header_value(value: &str) -> Result<HeaderValue, StoreError> {
    HeaderValue::from_str(value).map_err(|err| StoreError::Config(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_message_prefers_store_message() {
        let body = br#"{"code":"23505","message":"duplicate key value"}"#;
        assert_eq!(error_message(body, "Conflict"), "duplicate key value");
        assert_eq!(error_message(b"", "Bad Gateway"), "Bad Gateway");
        assert_eq!(error_message(b"upstream down", "Bad Gateway"), "upstream down");
    }

    #[test]
    fn table_url_ignores_trailing_slash() {
        let client = RestClient::new("https://example.test/", "key", Duration::from_secs(1))
            .expect("client");
        assert_eq!(client.table_url("employees"), "https://example.test/rest/v1/employees");
    }

    #[test]
    fn rejects_unprintable_key() {
        assert!(matches!(
            RestClient::new("https://example.test", "bad\nkey", Duration::from_secs(1)),
            Err(StoreError::Config(_))
        ));
    }
}
