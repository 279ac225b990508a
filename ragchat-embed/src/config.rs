//! Configuration for embedding providers

use crate::error::{EmbedError, Result};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default local model, small enough to load quickly on a laptop.
pub const DEFAULT_FASTEMBED_MODEL: &str = "all-minilm-l6-v2";
/// Default model when embedding through an Ollama server.
pub const DEFAULT_OLLAMA_MODEL: &str = "nomic-embed-text";
/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Which embedding backend to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    /// Local ONNX model through fastembed
    #[default]
    FastEmbed,
    /// Remote model served by Ollama
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::FastEmbed => write!(f, "fastembed"),
            ProviderKind::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "fastembed" | "fast-embed" | "local" => Ok(ProviderKind::FastEmbed),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(format!(
                "Invalid embedding provider: '{s}'. Valid values are: fastembed, ollama"
            )),
        }
    }
}

/// Configuration for embedding providers
///
/// The same struct drives both backends; fields that do not apply to the
/// selected [`ProviderKind`] are ignored (`cache_dir` is local only,
/// `base_url` and `timeout_secs` are Ollama only).
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
#[serde(default)]
pub struct EmbedConfig {
    /// Backend that produces the vectors
    #[builder(default)]
    pub provider: ProviderKind,
    /// Name of the embedding model to use
    #[builder(default = "DEFAULT_FASTEMBED_MODEL.to_string()")]
    pub model_name: String,
    /// Directory where local model files are cached
    #[builder(default = r#"PathBuf::from(".ragchat/models")"#)]
    pub cache_dir: PathBuf,
    /// Base URL of the Ollama server
    #[builder(default = "DEFAULT_OLLAMA_URL.to_string()")]
    pub base_url: String,
    /// Texts per fastembed call, or concurrent requests to Ollama
    #[builder(default = "16")]
    pub batch_size: usize,
    /// Whether to L2-normalize embeddings
    #[builder(default = "true")]
    pub normalize: bool,
    /// Request timeout for remote providers, in seconds
    #[builder(default = "30")]
    pub timeout_secs: u64,
}

impl EmbedConfig {
    /// Create a new embedding configuration using the builder
    pub fn builder() -> EmbedConfigBuilder {
        EmbedConfigBuilder::default()
    }

    /// Local fastembed model cached under `cache_dir`
    pub fn fastembed<P: AsRef<Path>>(cache_dir: P, model_name: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::FastEmbed,
            model_name: model_name.into(),
            cache_dir: cache_dir.as_ref().to_path_buf(),
            ..Self::default()
        }
    }

    /// Model served by an Ollama instance
    pub fn ollama(base_url: impl Into<String>, model_name: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model_name: model_name.into(),
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Set the batch size for embedding generation (builder style)
    pub fn with_batch_size(self, batch_size: usize) -> Self {
        Self { batch_size, ..self }
    }

    /// Set whether to normalize embeddings (builder style)
    pub fn with_normalize(self, normalize: bool) -> Self {
        Self { normalize, ..self }
    }

    /// Set the request timeout for remote providers (builder style)
    pub fn with_timeout_secs(self, timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..self
        }
    }

    /// Name of the configured model
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Endpoint used by the Ollama provider for single-text embeddings
    pub fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.base_url.trim_end_matches('/'))
    }

    /// Validate settings before a provider is created
    pub fn validate(&self) -> Result<()> {
        if self.model_name.trim().is_empty() {
            return Err(EmbedError::invalid_config("model name must not be empty"));
        }
        if self.batch_size == 0 {
            return Err(EmbedError::invalid_config("batch size must be positive"));
        }
        if self.provider == ProviderKind::Ollama {
            if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
                return Err(EmbedError::invalid_config(format!(
                    "Ollama base URL must start with http:// or https://, got '{}'",
                    self.base_url
                )));
            }
            if self.timeout_secs == 0 {
                return Err(EmbedError::invalid_config("timeout must be positive"));
            }
        }

        tracing::debug!(
            "Embedding configuration valid: {} / {}",
            self.provider,
            self.model_name
        );
        Ok(())
    }
}

impl Default for EmbedConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::FastEmbed,
            model_name: DEFAULT_FASTEMBED_MODEL.to_string(),
            cache_dir: PathBuf::from(".ragchat/models"),
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            batch_size: 16,
            normalize: true,
            timeout_secs: 30,
        }
    }
}
