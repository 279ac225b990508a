//! Configuration for the RAG pipeline
//!
//! [`RagConfig`] is a plain struct handed to constructors; nothing reads
//! global state after start-up. It is assembled in three layers, later ones
//! winning:
//!
//! 1. A TOML file (`--config FILE`, or `ragchat.toml` in the working directory)
//! 2. Environment variables (`RAGCHAT_DATABASE`, `OLLAMA_BASE_URL`, `RAGCHAT_MODEL`)
//! 3. Command-line flags, applied by the binary
//!
//! ## Example
//!
//! ```toml
//! [store]
//! database = ".ragchat.db"
//!
//! [embedding]
//! provider = "ollama"
//! model_name = "nomic-embed-text"
//!
//! [retriever]
//! top_k = 4
//!
//! [cache]
//! enabled = true
//! similarity_threshold = 0.95
//!
//! [generator]
//! model = "llama3.2:1b"
//! temperature = 0.0
//! ```

use crate::error::{RagError, Result};
use crate::generator::DEFAULT_PROMPT_TEMPLATE;
use ragchat_embed::EmbedConfig;
use ragchat_store::DEFAULT_DATABASE_FILE;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when no path is given
pub const DEFAULT_CONFIG_FILE: &str = "ragchat.toml";

pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.95;
pub const DEFAULT_GENERATOR_MODEL: &str = "llama3.2:1b";
pub const DEFAULT_GENERATOR_URL: &str = "http://localhost:11434";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite file holding passages, cache entries and sessions
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from(DEFAULT_DATABASE_FILE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Number of passages handed to the generator
    pub top_k: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: DEFAULT_TOP_K,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Minimum cosine similarity for a cached answer to be reused
    pub similarity_threshold: f32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Base URL of the Ollama server
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Prompt with `{question}` and `{context}` placeholders
    pub prompt_template: String,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GENERATOR_URL.to_string(),
            model: DEFAULT_GENERATOR_MODEL.to_string(),
            temperature: 0.0,
            timeout_secs: 120,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
        }
    }
}

/// Complete pipeline configuration. See module docs for the file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub store: StoreConfig,
    pub embedding: EmbedConfig,
    pub retriever: RetrieverConfig,
    pub cache: CacheConfig,
    pub generator: GeneratorConfig,
}

impl RagConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RagError::invalid_config(e.to_string()))
    }

    /// Read and parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RagError::invalid_config(format!(
                "Failed to read config '{}': {}",
                path.display(),
                e
            ))
        })?;
        toml::from_str(&content).map_err(|e| {
            RagError::invalid_config(format!(
                "Failed to parse config '{}': {}",
                path.display(),
                e
            ))
        })
    }

    /// File layer plus environment layer.
    ///
    /// An explicit path must exist; otherwise `ragchat.toml` is used when
    /// present and defaults when not.
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::load(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply environment-style overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(database) = lookup("RAGCHAT_DATABASE") {
            self.store.database = PathBuf::from(database);
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.generator.base_url = url.clone();
            self.embedding.base_url = url;
        }
        if let Some(model) = lookup("RAGCHAT_MODEL") {
            self.generator.model = model;
        }
    }

    pub fn validate(&self) -> Result<()> {
        let threshold = self.cache.similarity_threshold;
        if !(-1.0..=1.0).contains(&threshold) {
            return Err(RagError::invalid_config(format!(
                "cache.similarity_threshold must be within [-1, 1], got {threshold}"
            )));
        }
        if self.retriever.top_k == 0 {
            return Err(RagError::invalid_config("retriever.top_k must be at least 1"));
        }
        if self.generator.model.trim().is_empty() {
            return Err(RagError::invalid_config("generator.model must not be empty"));
        }
        if self.generator.base_url.trim().is_empty() {
            return Err(RagError::invalid_config("generator.base_url must not be empty"));
        }
        if self.generator.timeout_secs == 0 {
            return Err(RagError::invalid_config("generator.timeout_secs must be positive"));
        }
        for placeholder in ["{question}", "{context}"] {
            if !self.generator.prompt_template.contains(placeholder) {
                return Err(RagError::invalid_config(format!(
                    "generator.prompt_template is missing {placeholder}"
                )));
            }
        }
        self.embedding
            .validate()
            .map_err(|e| RagError::invalid_config(e.to_string()))
    }
}
