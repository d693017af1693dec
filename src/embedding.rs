//! Embedding provider abstraction and implementations.
//!
//! Defines the [`EmbeddingProvider`] trait and two HTTP backends:
//! - **[`OllamaProvider`]**: `POST {base_url}/api/embed` on a local Ollama
//!   server (default model `nomic-embed-text`).
//! - **[`OpenAIProvider`]**: `POST {base_url}/embeddings`, authenticated with
//!   `OPENAI_API_KEY`.
//!
//! Plus [`cosine_similarity`] for ranking stored vectors against a query.
//!
//! # Retry Strategy
//!
//! Providers built by [`create_provider`] (used by `astro index build`) retry
//! transient failures with exponential backoff:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)
//!
//! Providers built by [`create_query_provider`] make exactly one attempt; the
//! query path never retries.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{InsightError, InsightResult};

/// Trait for embedding providers.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"nomic-embed-text"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts. Returns one vector per input, in input order.
    async fn embed(&self, texts: &[String]) -> InsightResult<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(provider: &dyn EmbeddingProvider, text: &str) -> InsightResult<Vec<f32>> {
    provider
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| InsightError::UpstreamCallFailed("Empty embedding response".to_string()))
}

// ============ Shared HTTP plumbing ============

struct HttpEmbedder {
    client: reqwest::Client,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl HttpEmbedder {
    fn new(config: &EmbeddingConfig, max_retries: u32) -> InsightResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            model: config.model.clone(),
            base_url: config.effective_base_url(),
            max_retries,
        })
    }

    async fn post(
        &self,
        path: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
    ) -> InsightResult<serde_json::Value> {
        let url = format!("{}{}", self.base_url, path);
        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tracing::warn!(attempt, ?delay, "retrying embedding request");
                tokio::time::sleep(delay).await;
            }

            let mut request = self.client.post(&url).json(body);
            if let Some(key) = bearer {
                request = request.header("Authorization", format!("Bearer {}", key));
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.json().await?);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    let err = InsightError::UpstreamCallFailed(format!(
                        "embedding API error {}: {}",
                        status, body_text
                    ));

                    if status.as_u16() == 429 || status.is_server_error() {
                        last_err = Some(err);
                        continue;
                    }
                    return Err(err);
                }
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| {
            InsightError::UpstreamCallFailed("Embedding failed after retries".to_string())
        }))
    }
}

fn check_count(vectors: Vec<Vec<f32>>, expected: usize) -> InsightResult<Vec<Vec<f32>>> {
    if vectors.len() != expected {
        return Err(InsightError::UpstreamCallFailed(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    Ok(vectors)
}

fn parse_vector(value: &serde_json::Value) -> Option<Vec<f32>> {
    value
        .as_array()
        .map(|arr| arr.iter().map(|v| v.as_f64().unwrap_or(0.0) as f32).collect())
}

// ============ Ollama Provider ============

/// Embedding provider backed by an Ollama server.
pub struct OllamaProvider {
    http: HttpEmbedder,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig, max_retries: u32) -> InsightResult<Self> {
        Ok(Self {
            http: HttpEmbedder::new(config, max_retries)?,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn embed(&self, texts: &[String]) -> InsightResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self.http.post("/api/embed", None, &body).await?;
        let vectors = parse_ollama_response(&json)?;
        check_count(vectors, texts.len())
    }
}

/// Extracts `embeddings[]` from an Ollama `/api/embed` response.
fn parse_ollama_response(json: &serde_json::Value) -> InsightResult<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            InsightError::UpstreamCallFailed(
                "Invalid Ollama response: missing embeddings array".to_string(),
            )
        })?
        .iter()
        .map(|item| {
            parse_vector(item).ok_or_else(|| {
                InsightError::UpstreamCallFailed(
                    "Invalid Ollama response: embedding is not an array".to_string(),
                )
            })
        })
        .collect()
}

// ============ OpenAI Provider ============

/// Embedding provider using the OpenAI API. Requires `OPENAI_API_KEY`.
pub struct OpenAIProvider {
    http: HttpEmbedder,
    api_key: String,
}

impl OpenAIProvider {
    pub fn new(config: &EmbeddingConfig, max_retries: u32) -> InsightResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| InsightError::CredentialMissing("OPENAI_API_KEY".to_string()))?;
        Ok(Self {
            http: HttpEmbedder::new(config, max_retries)?,
            api_key,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAIProvider {
    fn model_name(&self) -> &str {
        &self.http.model
    }

    async fn embed(&self, texts: &[String]) -> InsightResult<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.http.model,
            "input": texts,
        });
        let json = self
            .http
            .post("/embeddings", Some(&self.api_key), &body)
            .await?;
        let vectors = parse_openai_response(&json)?;
        check_count(vectors, texts.len())
    }
}

/// Extracts `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> InsightResult<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| {
            InsightError::UpstreamCallFailed(
                "Invalid OpenAI response: missing data array".to_string(),
            )
        })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let vector = item
            .get("embedding")
            .and_then(parse_vector)
            .ok_or_else(|| {
                InsightError::UpstreamCallFailed(
                    "Invalid OpenAI response: missing embedding".to_string(),
                )
            })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .unwrap_or(position as u64);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Construction ============

/// Provider for batch jobs, retrying up to `embedding.max_retries` times.
pub fn create_provider(config: &EmbeddingConfig) -> InsightResult<Arc<dyn EmbeddingProvider>> {
    build(config, config.max_retries)
}

/// Provider for the query path: a single attempt per call.
pub fn create_query_provider(
    config: &EmbeddingConfig,
) -> InsightResult<Arc<dyn EmbeddingProvider>> {
    build(config, 0)
}

fn build(config: &EmbeddingConfig, max_retries: u32) -> InsightResult<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaProvider::new(config, max_retries)?)),
        "openai" => Ok(Arc::new(OpenAIProvider::new(config, max_retries)?)),
        other => Err(InsightError::InvalidInput(format!(
            "Unknown embedding provider: {}",
            other
        ))),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, vectors of
/// different lengths, or a zero-magnitude vector.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ollama_config(base_url: &str) -> EmbeddingConfig {
        EmbeddingConfig {
            base_url: Some(base_url.to_string()),
            timeout_secs: 5,
            ..EmbeddingConfig::default()
        }
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let sim = cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_opposite() {
        let sim = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]);
        assert!((sim + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn test_parse_openai_orders_by_index() {
        let json = serde_json::json!({
            "data": [
                {"index": 1, "embedding": [0.0, 1.0]},
                {"index": 0, "embedding": [1.0, 0.0]},
            ]
        });
        let vectors = parse_openai_response(&json).unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn test_parse_ollama_missing_field() {
        let err = parse_ollama_response(&serde_json::json!({"error": "model not found"}))
            .unwrap_err();
        assert!(matches!(err, InsightError::UpstreamCallFailed(_)));
    }

    #[tokio::test]
    async fn test_ollama_embed_roundtrip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .and(body_partial_json(serde_json::json!({"model": "nomic-embed-text"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "nomic-embed-text",
                "embeddings": [[0.1, 0.2], [0.3, 0.4]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&ollama_config(&server.uri()), 0).unwrap();
        let vectors = provider
            .embed(&["sun".to_string(), "moon".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors.len(), 2);
        assert!((vectors[1][0] - 0.3).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_ollama_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [[0.1, 0.2]]})),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&ollama_config(&server.uri()), 0).unwrap();
        let err = provider
            .embed(&["a".to_string(), "b".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("expected 2 embeddings"));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad model"))
            .expect(1)
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&ollama_config(&server.uri()), 3).unwrap();
        let err = embed_query(&provider, "query").await.unwrap_err();
        assert!(err.to_string().contains("400"));
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/embed"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"embeddings": [[1.0]]})),
            )
            .mount(&server)
            .await;

        let provider = OllamaProvider::new(&ollama_config(&server.uri()), 1).unwrap();
        let vector = embed_query(&provider, "query").await.unwrap();
        assert_eq!(vector, vec![1.0]);
    }
}
