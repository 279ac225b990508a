//! Language model client
//!
//! [`LanguageModel`] is the single seam between the pipeline and whatever
//! produces text. [`OllamaClient`] talks to a local Ollama server through its
//! non-streaming `/api/generate` endpoint.

use crate::config::GeneratorConfig;
use crate::error::{RagError, Result};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Text completion. See module docs for details.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Complete `prompt`, returning the model's raw text
    async fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    fn model_name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Clone, Debug)]
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(config: &GeneratorConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::invalid_config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url)
    }
}

/// Pull the completion out of an `/api/generate` body
fn parse_generate_response(body: &str) -> anyhow::Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).context("Ollama returned an unexpected response body")?;
    Ok(parsed.response)
}

#[async_trait]
impl LanguageModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };

        tracing::debug!("POST {} (model {})", self.generate_url(), self.model);
        let response = self
            .client
            .post(self.generate_url())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to reach Ollama at {}", self.base_url))?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(anyhow!("Ollama API error ({}): {}", status.as_u16(), body));
        }
        parse_generate_response(&body)
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> GeneratorConfig {
        GeneratorConfig {
            base_url: format!("{}/", server.uri()),
            timeout_secs: 5,
            ..GeneratorConfig::default()
        }
    }

    #[test]
    fn test_parse_generate_response() {
        let body = r#"{"model":"llama3.2:1b","response":"Paris.","done":true}"#;
        assert_eq!(parse_generate_response(body).unwrap(), "Paris.");
        assert!(parse_generate_response(r#"{"error":"model not found"}"#).is_err());
        assert!(parse_generate_response("not json").is_err());
    }

    #[tokio::test]
    async fn test_complete_sends_non_streaming_request() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(json!({
                "model": "llama3.2:1b",
                "prompt": "Say hi",
                "stream": false,
                "options": { "temperature": 0.0 }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "model": "llama3.2:1b",
                "response": "Hi!",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server))?;
        assert_eq!(client.model_name(), "llama3.2:1b");
        assert_eq!(client.complete("Say hi").await?, "Hi!");
        Ok(())
    }

    #[tokio::test]
    async fn test_error_status_is_reported() -> anyhow::Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(404).set_body_string("model 'llama3.2:1b' not found"))
            .mount(&server)
            .await;

        let client = OllamaClient::new(&config_for(&server))?;
        let err = client.complete("anything").await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(err.to_string().contains("not found"));
        Ok(())
    }
}
