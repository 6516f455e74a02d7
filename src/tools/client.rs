//! HTTP client for the memory endpoints, authenticating with the caller's
//! session token as a cookie.

use reqwest::header::COOKIE;
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Duration;

use super::ToolError;

const API_TIMEOUT: Duration = Duration::from_secs(30);

static HTTP: OnceLock<reqwest::Client> = OnceLock::new();

/// Process-wide client, built on first use.
fn http() -> &'static reqwest::Client {
    HTTP.get_or_init(|| {
        reqwest::Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "falling back to default HTTP client");
                reqwest::Client::new()
            })
    })
}

pub struct MemoryApiClient {
    endpoint: reqwest::Url,
    cookie_name: String,
}

impl MemoryApiClient {
    pub fn new(base_url: &str, cookie_name: &str) -> Result<Self, ToolError> {
        let raw = format!("{}/api/memory", base_url.trim_end_matches('/'));
        let endpoint = reqwest::Url::parse(&raw)
            .map_err(|e| ToolError::Config(format!("invalid API base URL {base_url:?}: {e}")))?;
        Ok(Self {
            endpoint,
            cookie_name: cookie_name.to_string(),
        })
    }

    fn endpoint_with(&self, pairs: &[(&str, String)]) -> reqwest::Url {
        let mut url = self.endpoint.clone();
        if !pairs.is_empty() {
            let mut query = url.query_pairs_mut();
            for (key, value) in pairs {
                query.append_pair(key, value);
            }
        }
        url
    }

    /// Send with the session cookie; the JSON body is the result on 2xx and
    /// its `error` field the failure otherwise. A 2xx body that is not JSON is
    /// an error.
    async fn send(&self, builder: reqwest::RequestBuilder, token: &str) -> Result<Value, ToolError> {
        let resp = builder
            .header(COOKIE, format!("{}={}", self.cookie_name, token))
            .send()
            .await?;
        let status = resp.status();
        let text = resp.text().await?;

        if status.is_success() {
            return serde_json::from_str(&text).map_err(|e| {
                tracing::warn!(status = status.as_u16(), error = %e, "memory API sent a non-JSON body");
                ToolError::InvalidResponse(e.to_string())
            });
        }
        let body: Value = serde_json::from_str(&text).unwrap_or(Value::Null);
        let message = body
            .get("error")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(|| status.to_string());
        Err(ToolError::Api {
            status: status.as_u16(),
            message,
        })
    }

    pub async fn store(
        &self,
        token: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<Value, ToolError> {
        let body = json!({ "content": content, "metadata": metadata });
        self.send(http().post(self.endpoint.clone()).json(&body), token)
            .await
    }

    pub async fn retrieve(
        &self,
        token: &str,
        query: &str,
        limit: i64,
        threshold: Option<f64>,
    ) -> Result<Value, ToolError> {
        let mut pairs = vec![("query", query.to_string()), ("limit", limit.to_string())];
        if let Some(threshold) = threshold {
            pairs.push(("threshold", threshold.to_string()));
        }
        self.send(http().get(self.endpoint_with(&pairs)), token).await
    }

    pub async fn list(
        &self,
        token: &str,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Value, ToolError> {
        let mut pairs = Vec::new();
        if let Some(limit) = limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = offset {
            pairs.push(("offset", offset.to_string()));
        }
        self.send(http().get(self.endpoint_with(&pairs)), token).await
    }

    pub async fn update(
        &self,
        token: &str,
        id: &str,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<Value, ToolError> {
        let body = json!({ "id": id, "content": content, "metadata": metadata });
        self.send(http().put(self.endpoint.clone()).json(&body), token)
            .await
    }

    pub async fn delete(&self, token: &str, id: &str) -> Result<Value, ToolError> {
        let url = self.endpoint_with(&[("id", id.to_string())]);
        self.send(http().delete(url), token).await
    }
}
