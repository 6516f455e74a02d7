//! OpenAI-compatible embeddings client.
//!
//! Works against OpenAI (`Authorization: Bearer`) and Azure OpenAI
//! (`api-key` header) by switching `api_key_header` in config.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::EmbeddingProvider;
use crate::config::EmbeddingConfig;
use crate::error::BusyError;

const EMBED_TIMEOUT: Duration = Duration::from_secs(30);

fn embed_err(msg: impl Into<String>) -> BusyError {
    BusyError::Embedding(msg.into())
}

/// Attach an API key the way the configured header expects.
pub(crate) fn with_api_key(
    builder: reqwest::RequestBuilder,
    header: &str,
    key: &str,
) -> reqwest::RequestBuilder {
    if key.is_empty() {
        builder
    } else if header.eq_ignore_ascii_case("authorization") {
        builder.bearer_auth(key)
    } else {
        builder.header(header, key)
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

pub struct OpenAiEmbeddings {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    api_key_header: String,
    model: String,
    dimensions: usize,
}

impl OpenAiEmbeddings {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(EMBED_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            api_key_header: config.api_key_header.clone(),
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, BusyError> {
        let req = EmbedRequest {
            model: &self.model,
            input: vec![text],
        };
        let builder = with_api_key(
            self.client.post(&self.endpoint).json(&req),
            &self.api_key_header,
            &self.api_key,
        );

        let resp = builder
            .send()
            .await
            .map_err(|e| embed_err(format!("embedding request failed: {e}")))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(embed_err(format!("embedding API returned {status}: {body}")));
        }

        let parsed: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| embed_err(format!("embedding response parse failed: {e}")))?;

        let count = parsed.data.len();
        let mut data = parsed.data.into_iter();
        match (data.next(), count) {
            (Some(first), 1) => {
                tracing::debug!(model = %self.model, dims = first.embedding.len(), "embedded text");
                Ok(first.embedding)
            }
            _ => Err(embed_err(format!(
                "embedding count mismatch: sent 1 text, got {count} embeddings"
            ))),
        }
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer, header_name: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            endpoint: format!("{}/v1/embeddings", server.uri()),
            api_key: "sk-test".into(),
            api_key_header: header_name.into(),
            model: "text-embedding-ada-002".into(),
            dimensions: 3,
        }
    }

    #[tokio::test]
    async fn embeds_with_bearer_auth() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/embeddings"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(serde_json::json!({
                "model": "text-embedding-ada-002",
                "input": ["hello"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [0.1, 0.2, 0.3], "index": 0}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddings::new(&config_for(&server, "authorization")).unwrap();
        let v = provider.embed("hello").await.unwrap();
        assert_eq!(v, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn azure_style_header_is_sent_raw() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("api-key", "sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"embedding": [1.0, 0.0, 0.0]}]
            })))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddings::new(&config_for(&server, "api-key")).unwrap();
        assert!(provider.embed("hi").await.is_ok());
    }

    #[tokio::test]
    async fn http_error_maps_to_embedding_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddings::new(&config_for(&server, "authorization")).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert!(matches!(err, BusyError::Embedding(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn empty_data_is_a_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"data": []})))
            .mount(&server)
            .await;

        let provider = OpenAiEmbeddings::new(&config_for(&server, "authorization")).unwrap();
        let err = provider.embed("hello").await.unwrap_err();
        assert!(err.to_string().contains("count mismatch"));
    }
}
