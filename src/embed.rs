//! Embedding provider port and the Gemini-backed implementation.
//!
//! One text chunk in, one fixed-dimension vector out. Every record in the
//! store must come from the same model so dimensionality stays constant; the
//! provider reports its dimension so stores can check.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use std::time::Duration;

use crate::config::GroundingConfig;
use crate::types::GroundingError;

/// Maps text to a fixed-dimension vector via an embedding model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a single non-empty text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError>;

    /// Embeds a batch of texts, failing on the first error.
    async fn embed_batch(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, GroundingError> {
        let mut out = Vec::with_capacity(inputs.len());
        for input in inputs {
            out.push(self.embed(input).await?);
        }
        Ok(out)
    }

    /// Output vector dimension, constant for the life of the provider.
    fn dimensions(&self) -> usize;
}

const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Dimension of `text-embedding-004` output.
const GEMINI_EMBED_DIMENSIONS: usize = 768;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: String,
    content: ContentPayload<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct ContentPayload<'a> {
    parts: Vec<TextPart<'a>>,
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// [`EmbeddingProvider`] backed by the Gemini `embedContent` REST endpoint.
#[derive(Debug)]
pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiEmbedder {
    pub fn new(config: &GroundingConfig) -> Result<Self, GroundingError> {
        if config.gemini_api_key.is_empty() {
            return Err(GroundingError::Config("GEMINI_API_KEY is empty".into()));
        }
        Self::with_timeout(config, config.request_timeout)
    }

    pub fn with_timeout(
        config: &GroundingConfig,
        timeout: Duration,
    ) -> Result<Self, GroundingError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| GroundingError::Config(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: GEMINI_ENDPOINT.to_string(),
            api_key: config.gemini_api_key.clone(),
            model: config.embed_model.clone(),
        })
    }

    /// Overrides the API endpoint; used to point at a mock server in tests.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    fn request_url(&self) -> String {
        format!("{}/models/{}:embedContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
        if text.trim().is_empty() {
            return Err(GroundingError::Embedding("cannot embed empty text".into()));
        }

        let body = EmbedContentRequest {
            model: format!("models/{}", self.model),
            content: ContentPayload {
                parts: vec![TextPart { text }],
            },
            task_type: "SEMANTIC_SIMILARITY",
        };

        let response = self
            .client
            .post(self.request_url())
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GroundingError::Embedding(format!("request timed out: {err}"))
                } else {
                    GroundingError::Embedding(err.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(GroundingError::Embedding(format!(
                "embedding API returned {status}: {detail}"
            )));
        }

        let parsed: EmbedContentResponse = response
            .json()
            .await
            .map_err(|err| GroundingError::Embedding(format!("malformed response: {err}")))?;

        if parsed.embedding.values.is_empty() {
            return Err(GroundingError::Embedding(
                "embedding API returned an empty vector".into(),
            ));
        }
        Ok(parsed.embedding.values)
    }

    fn dimensions(&self) -> usize {
        GEMINI_EMBED_DIMENSIONS
    }
}

/// Deterministic, offline [`EmbeddingProvider`] for tests.
///
/// Hashes the input per dimension and normalizes to a unit vector, so equal
/// texts map to equal embeddings and distinct texts almost surely differ.
#[derive(Clone, Debug)]
pub struct MockEmbeddingProvider {
    dimensions: usize,
}

impl MockEmbeddingProvider {
    pub fn new() -> Self {
        Self { dimensions: 64 }
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self { dimensions }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut values: Vec<f32> = (0..self.dimensions)
            .map(|axis| {
                let mut hasher = std::hash::DefaultHasher::new();
                text.hash(&mut hasher);
                axis.hash(&mut hasher);
                let raw = hasher.finish();
                // Map to [-1, 1].
                (raw as f64 / u64::MAX as f64 * 2.0 - 1.0) as f32
            })
            .collect();

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut values {
                *value /= norm;
            }
        }
        values
    }
}

impl Default for MockEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, GroundingError> {
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn test_config(key: &str) -> GroundingConfig {
        GroundingConfig {
            gemini_api_key: key.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn mock_provider_is_deterministic() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn mock_provider_distinguishes_texts() {
        let provider = MockEmbeddingProvider::new();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("goodbye world").await.unwrap();
        assert_ne!(a, b);
        assert_eq!(a.len(), provider.dimensions());
        assert_eq!(b.len(), provider.dimensions());
    }

    #[tokio::test]
    async fn mock_vectors_are_unit_length() {
        let provider = MockEmbeddingProvider::with_dimensions(16);
        let v = provider.embed("normalize me").await.unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[tokio::test]
    async fn gemini_embedder_parses_response() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent")
                .header("x-goog-api-key", "test-key");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"embedding":{"values":[0.1,0.2,0.3]}}"#);
        });

        let embedder = GeminiEmbedder::new(&test_config("test-key"))
            .unwrap()
            .with_endpoint(server.base_url());
        let vector = embedder.embed("some chunk text").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);
    }

    #[tokio::test]
    async fn gemini_embedder_surfaces_api_failures() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST)
                .path("/models/text-embedding-004:embedContent");
            then.status(429).body("rate limited");
        });

        let embedder = GeminiEmbedder::new(&test_config("test-key"))
            .unwrap()
            .with_endpoint(server.base_url());
        let err = embedder.embed("some chunk text").await.unwrap_err();
        assert!(matches!(err, GroundingError::Embedding(_)));
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn empty_text_is_rejected_before_the_network() {
        let embedder = GeminiEmbedder::new(&test_config("test-key")).unwrap();
        let err = embedder.embed("   ").await.unwrap_err();
        assert!(matches!(err, GroundingError::Embedding(_)));
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let err = GeminiEmbedder::new(&test_config("")).unwrap_err();
        assert!(matches!(err, GroundingError::Config(_)));
    }
}
