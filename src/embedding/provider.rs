//! EmbeddingProvider — the external embedding API collaborator.
//!
//! Two implementations: `OpenAiEmbeddingProvider` talks to a real HTTP
//! embeddings endpoint; `MockEmbeddingProvider` returns preconfigured vectors
//! for tests, following the trait-plus-mock split used for every external
//! collaborator in this crate.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;

/// Errors from embedding provider operations.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingProviderError {
    #[error("embedding provider request failed: {0}")]
    Request(String),
    #[error("embedding provider returned {0} vectors for a batch of {1} inputs")]
    BatchSizeMismatch(usize, usize),
    #[error("no mock vector configured for text: {0:?}")]
    MissingMockVector(String),
}

/// Trait for calling an external text-embedding API.
///
/// A single call corresponds to one batch: the implementation issues one
/// network call and returns one vector per input, in order.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts against the given model name.
    async fn embed_batch(
        &self,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError>;
}

/// Production embedding provider — calls an OpenAI-compatible
/// `POST /v1/embeddings` endpoint via `reqwest`.
pub struct OpenAiEmbeddingProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// No per-request timeout is mandated by the core; this is the CLI's
/// default, not a core invariant — callers may override via a differently
/// configured `reqwest::Client` if they construct one themselves.
const DEFAULT_REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

impl OpenAiEmbeddingProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_REQUEST_TIMEOUT)
                .build()
                .expect("reqwest client builder with only a timeout never fails"),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Point the provider at an alternate base URL (e.g. a local test server).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch(
        &self,
        texts: &[String],
        model: &str,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        let request = EmbeddingsRequest { model, input: texts };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingProviderError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(EmbeddingProviderError::Request(format!(
                "HTTP {status}: {body}"
            )));
        }

        let parsed: EmbeddingsResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingProviderError::Request(e.to_string()))?;

        let vectors: Vec<Vec<f32>> = parsed.data.into_iter().map(|d| d.embedding).collect();
        if vectors.len() != texts.len() {
            return Err(EmbeddingProviderError::BatchSizeMismatch(
                vectors.len(),
                texts.len(),
            ));
        }
        Ok(vectors)
    }
}

/// Mock embedding provider — returns preconfigured vectors keyed by exact
/// text match, and counts batch calls for assertions in tests.
pub struct MockEmbeddingProvider {
    vectors: HashMap<String, Vec<f32>>,
    call_count: Mutex<usize>,
}

impl MockEmbeddingProvider {
    pub fn new(vectors: HashMap<String, Vec<f32>>) -> Self {
        Self {
            vectors,
            call_count: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_batch(
        &self,
        texts: &[String],
        _model: &str,
    ) -> Result<Vec<Vec<f32>>, EmbeddingProviderError> {
        *self.call_count.lock().unwrap() += 1;
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            let vector = self
                .vectors
                .get(text)
                .cloned()
                .ok_or_else(|| EmbeddingProviderError::MissingMockVector(text.clone()))?;
            out.push(vector);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_provider_returns_configured_vectors_in_order() {
        let mut vectors = HashMap::new();
        vectors.insert("a".to_string(), vec![1.0, 0.0]);
        vectors.insert("b".to_string(), vec![0.0, 1.0]);
        let provider = MockEmbeddingProvider::new(vectors);

        let result = provider
            .embed_batch(&["b".to_string(), "a".to_string()], "model")
            .await
            .unwrap();

        assert_eq!(result, vec![vec![0.0, 1.0], vec![1.0, 0.0]]);
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_provider_errors_on_missing_text() {
        let provider = MockEmbeddingProvider::new(HashMap::new());
        let err = provider
            .embed_batch(&["missing".to_string()], "model")
            .await
            .unwrap_err();
        assert!(matches!(err, EmbeddingProviderError::MissingMockVector(_)));
    }
}
