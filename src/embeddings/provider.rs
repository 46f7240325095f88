use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, Settings, API_KEY_ENV};
use crate::error::{Result, SemSearchError};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// A raw vector as returned by the model, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedEmbedding {
    pub vector: Vec<f32>,
    /// Width reported by the model
    pub original_dimension: usize,
}

/// Turns text into a raw embedding vector.
pub trait Embedder: Send + Sync {
    /// Identifier of the model vectors are generated with.
    fn model(&self) -> &str;

    fn generate(&self, text: &str) -> impl Future<Output = Result<GeneratedEmbedding>> + Send;
}

/// Native width of the models we know about.
pub fn known_model_width(model: &str) -> Option<usize> {
    match model {
        "nomic-embed-text" => Some(768),
        "text-embedding-ada-002" | "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        _ => None,
    }
}

/// Client for OpenAI-compatible `/embeddings` endpoints (OpenAI, Ollama, ...).
pub struct EmbeddingGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl EmbeddingGenerator {
    /// Fails up front when no API key is configured.
    pub fn new(settings: &Settings, api_key: Option<String>) -> Result<Self> {
        let api_key = api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                SemSearchError::Embedding(format!(
                    "An embedding API key is required. Set {} and try again.",
                    API_KEY_ENV
                ))
            })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| SemSearchError::Embedding(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", settings.api_base_url().trim_end_matches('/')),
            model: settings.embedding_model.clone(),
            api_key: api_key.trim().to_string(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.settings, Config::api_key())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Embedder for EmbeddingGenerator {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, text: &str) -> Result<GeneratedEmbedding> {
        tracing::debug!(model = %self.model, chars = text.len(), "generating embedding");

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({
                "model": self.model,
                "input": text,
            }))
            .send()
            .await
            .map_err(connection_error)?;

        let status = response.status();
        let body = response.text().await.map_err(connection_error)?;

        let json: Value = match serde_json::from_str(&body) {
            Ok(json) => json,
            Err(_) if !status.is_success() => {
                tracing::error!(%status, "embedding API error");
                return Err(SemSearchError::Embedding(format!(
                    "Failed to generate embedding: API returned {}: {}",
                    status,
                    body.trim()
                )));
            }
            Err(e) => {
                return Err(SemSearchError::Embedding(format!(
                    "Failed to generate embedding: invalid response: {}",
                    e
                )))
            }
        };

        // Some compatible servers report errors with a 200
        if let Some(error) = json.get("error").filter(|e| !e.is_null()) {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            tracing::error!(%status, %message, "embedding API error");
            return Err(SemSearchError::Embedding(format!(
                "Failed to generate embedding: {}",
                message
            )));
        }

        if !status.is_success() {
            return Err(SemSearchError::Embedding(format!(
                "Failed to generate embedding: API returned {}",
                status
            )));
        }

        let vector = json
            .pointer("/data/0/embedding")
            .and_then(Value::as_array)
            .ok_or_else(|| {
                SemSearchError::Embedding(
                    "Failed to generate embedding: response contained no embedding".into(),
                )
            })?
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| {
                SemSearchError::Embedding(
                    "Failed to generate embedding: embedding contained non-numeric values".into(),
                )
            })?;

        if vector.is_empty() {
            return Err(SemSearchError::Embedding(
                "Failed to generate embedding: embedding was empty".into(),
            ));
        }

        Ok(GeneratedEmbedding {
            original_dimension: vector.len(),
            vector,
        })
    }
}

fn connection_error(err: reqwest::Error) -> SemSearchError {
    tracing::error!(error = %err, "embedding API connection error");
    SemSearchError::Embedding(format!(
        "Connection error while generating embedding: {}",
        err
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn settings_for(base_url: String) -> Settings {
        Settings {
            base_url: Some(base_url),
            ..Settings::default()
        }
    }

    #[test]
    fn test_missing_api_key_fails_at_construction() {
        let settings = Settings::default();
        for key in [None, Some(String::new()), Some("   ".to_string())] {
            match EmbeddingGenerator::new(&settings, key) {
                Err(SemSearchError::Embedding(msg)) => assert!(msg.contains(API_KEY_ENV)),
                other => panic!("expected embedding error, got {:?}", other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_endpoint_respects_base_url() {
        let generator = EmbeddingGenerator::new(
            &settings_for("http://localhost:11434/v1/".into()),
            Some("k".into()),
        )
        .unwrap();
        assert_eq!(generator.endpoint(), "http://localhost:11434/v1/embeddings");

        let generator = EmbeddingGenerator::new(&Settings::default(), Some("k".into())).unwrap();
        assert_eq!(generator.endpoint(), "https://api.openai.com/v1/embeddings");
    }

    #[test]
    fn test_known_model_widths() {
        assert_eq!(known_model_width("nomic-embed-text"), Some(768));
        assert_eq!(known_model_width("text-embedding-ada-002"), Some(1536));
        assert_eq!(known_model_width("my-custom-model"), None);
    }

    #[tokio::test]
    async fn test_generate_returns_raw_vector_and_width() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer test-key")
                    .json_body(json!({
                        "model": "text-embedding-ada-002",
                        "input": "login page returns 500",
                    }));
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [{"object": "embedding", "index": 0, "embedding": [0.25, -0.5, 1.0]}],
                    "model": "text-embedding-ada-002",
                }));
            })
            .await;

        let generator =
            EmbeddingGenerator::new(&settings_for(server.base_url()), Some("test-key".into()))
                .unwrap();
        let generated = generator.generate("login page returns 500").await.unwrap();

        mock.assert_async().await;
        assert_eq!(generated.vector, vec![0.25, -0.5, 1.0]);
        assert_eq!(generated.original_dimension, 3);
    }

    #[tokio::test]
    async fn test_api_error_payload_becomes_embedding_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(400).json_body(json!({
                    "error": {"message": "The model does not exist", "type": "invalid_request_error"}
                }));
            })
            .await;

        let generator =
            EmbeddingGenerator::new(&settings_for(server.base_url()), Some("k".into())).unwrap();
        match generator.generate("text").await {
            Err(SemSearchError::Embedding(msg)) => {
                assert_eq!(msg, "Failed to generate embedding: The model does not exist")
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_error_payload_with_ok_status_is_still_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200)
                    .json_body(json!({"error": {"message": "quota exceeded"}}));
            })
            .await;

        let generator =
            EmbeddingGenerator::new(&settings_for(server.base_url()), Some("k".into())).unwrap();
        let err = generator.generate("text").await.unwrap_err();
        assert!(err.is_embedding());
        assert!(err.to_string().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_non_json_failure_body() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(502).body("bad gateway");
            })
            .await;

        let generator =
            EmbeddingGenerator::new(&settings_for(server.base_url()), Some("k".into())).unwrap();
        let err = generator.generate("text").await.unwrap_err();
        assert!(err.is_embedding());
        assert!(err.to_string().contains("502"));
    }

    #[tokio::test]
    async fn test_missing_embedding_in_response() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({"data": []}));
            })
            .await;

        let generator =
            EmbeddingGenerator::new(&settings_for(server.base_url()), Some("k".into())).unwrap();
        let err = generator.generate("text").await.unwrap_err();
        assert!(err.to_string().contains("no embedding"));
    }

    #[tokio::test]
    async fn test_connection_failure_becomes_embedding_error() {
        // Nothing listens on port 9 (discard) in the test environment
        let generator =
            EmbeddingGenerator::new(&settings_for("http://127.0.0.1:9".into()), Some("k".into()))
                .unwrap();
        let err = generator.generate("text").await.unwrap_err();
        assert!(err.is_embedding());
        assert!(err
            .to_string()
            .starts_with("Connection error while generating embedding"));
    }
}
