//! Embedding provider backed by an Ollama server

use crate::config::EmbedConfig;
use crate::error::{EmbedError, Result};
use crate::provider::{EmbeddingProvider, EmbeddingResult, to_f16_vector};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use half::f16;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// Calls `POST /api/embeddings` once per text.
#[derive(Debug)]
pub struct OllamaEmbedProvider {
    client: Client,
    config: EmbedConfig,
    dimension: AtomicUsize,
}

impl OllamaEmbedProvider {
    /// Build a provider; no request is sent until the first embedding.
    pub fn new(config: EmbedConfig) -> Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            config,
            dimension: AtomicUsize::new(0),
        })
    }

    /// Concurrent requests per `embed_texts` call
    fn max_in_flight(&self) -> usize {
        self.config.batch_size.max(1)
    }

    fn parse_response(body: &str) -> Result<Vec<f32>> {
        let response: EmbeddingResponse =
            serde_json::from_str(body).map_err(EmbedError::embedding_gen)?;
        if response.embedding.is_empty() {
            return Err(EmbedError::invalid_config(
                "Ollama returned an empty embedding; is the model an embedding model?",
            ));
        }
        Ok(response.embedding)
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let request = EmbeddingRequest {
            model: self.config.model_name(),
            prompt: text,
        };

        let response = self
            .client
            .post(self.config.embeddings_url())
            .json(&request)
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(EmbedError::RemoteStatus {
                status: status.as_u16(),
                body,
            });
        }

        let raw = Self::parse_response(&body)?;
        let vector = to_f16_vector(&raw, self.config.normalize)?;
        self.dimension.store(vector.len(), Ordering::Relaxed);
        Ok(vector)
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        tracing::debug!("Requesting {} embeddings from Ollama", texts.len());

        // `buffered` keeps results in input order
        let requests: Vec<_> = texts.iter().map(|text| self.embed_text(text)).collect();
        let results: Vec<Result<Vec<f16>>> = stream::iter(requests)
            .buffered(self.max_in_flight())
            .collect()
            .await;

        let embeddings = results.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension.load(Ordering::Relaxed)
    }

    fn provider_name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let raw = OllamaEmbedProvider::parse_response(r#"{"embedding": [0.5, -0.25, 1.0]}"#)
            .unwrap();
        assert_eq!(raw, vec![0.5, -0.25, 1.0]);
    }

    #[test]
    fn test_parse_response_rejects_empty_and_malformed() {
        let empty = OllamaEmbedProvider::parse_response(r#"{"embedding": []}"#);
        assert!(matches!(empty, Err(EmbedError::InvalidConfig { .. })));

        let malformed = OllamaEmbedProvider::parse_response(r#"{"error": "model not found"}"#);
        assert!(matches!(
            malformed,
            Err(EmbedError::EmbeddingGeneration { .. })
        ));
    }

    #[test]
    fn test_new_provider_has_unknown_dimension() {
        let provider =
            OllamaEmbedProvider::new(EmbedConfig::ollama("http://localhost:11434", "nomic-embed-text"))
                .unwrap();
        assert_eq!(provider.embedding_dimension(), 0);
        assert_eq!(provider.provider_name(), "ollama");
    }

    #[test]
    fn test_batch_size_bounds_concurrency() {
        let provider = OllamaEmbedProvider::new(
            EmbedConfig::ollama("http://localhost:11434", "nomic-embed-text").with_batch_size(2),
        )
        .unwrap();
        assert_eq!(provider.max_in_flight(), 2);

        let provider =
            OllamaEmbedProvider::new(EmbedConfig::ollama("http://localhost:11434", "nomic-embed-text"))
                .unwrap();
        assert_eq!(provider.max_in_flight(), 16);
    }

    #[test]
    fn test_new_provider_validates_config() {
        let result = OllamaEmbedProvider::new(EmbedConfig::ollama("ftp://nowhere", "m"));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_a_request_error() {
        // Port 9 (discard) is essentially never serving HTTP
        let provider = OllamaEmbedProvider::new(
            EmbedConfig::ollama("http://127.0.0.1:9", "nomic-embed-text").with_timeout_secs(2),
        )
        .unwrap();
        let err = provider.embed_text("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::Request { .. }));
    }
}
