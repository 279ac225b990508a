//! Embedding provider trait and the local fastembed implementation

use crate::config::{EmbedConfig, ProviderKind};
use crate::error::{EmbedError, Result};
use crate::ollama::OllamaEmbedProvider;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use fnv::FnvHasher;
use half::f16;
use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::{Arc, Mutex, OnceLock};

/// Result of embedding generation
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    /// The generated embeddings, one per input text
    pub embeddings: Vec<Vec<f16>>,
    /// The dimension of each embedding vector
    pub dimension: usize,
}

impl EmbeddingResult {
    /// Create a new embedding result from a vector of f16 embeddings.
    ///
    /// The dimension is inferred from the first embedding vector, or 0 when
    /// there are none.
    pub fn new(embeddings: Vec<Vec<f16>>) -> Self {
        let dimension = embeddings.first().map(|e| e.len()).unwrap_or(0);
        Self {
            embeddings,
            dimension,
        }
    }

    /// Returns the number of embedding vectors in this result.
    pub fn len(&self) -> usize {
        self.embeddings.len()
    }

    /// Returns `true` if this result contains no embedding vectors.
    pub fn is_empty(&self) -> bool {
        self.embeddings.is_empty()
    }
}

/// Trait for embedding providers that can generate embeddings from text
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>>;

    /// Generate embeddings for multiple texts (batch processing)
    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult>;

    /// Get the dimension of embeddings produced by this provider
    fn embedding_dimension(&self) -> usize;

    /// Get the name/identifier of this provider
    fn provider_name(&self) -> &str;
}

/// Build the provider selected by `config.provider`.
///
/// Local models are downloaded and loaded before this returns, so the first
/// call may take a while.
pub async fn create_provider(config: EmbedConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    config.validate()?;
    match config.provider {
        ProviderKind::FastEmbed => Ok(Arc::new(FastEmbedProvider::create(config).await?)),
        ProviderKind::Ollama => Ok(Arc::new(OllamaEmbedProvider::new(config)?)),
    }
}

/// Convert raw f32 output to the f16 vectors stored by ragchat, optionally
/// L2-normalizing them first.
pub fn to_f16_vector(values: &[f32], normalize: bool) -> Result<Vec<f16>> {
    if values.iter().any(|v| !v.is_finite()) {
        return Err(EmbedError::embedding_gen(
            "embedding contains non-finite values",
        ));
    }

    let norm = if normalize {
        values.iter().map(|v| v * v).sum::<f32>().sqrt()
    } else {
        0.0
    };

    Ok(values
        .iter()
        .map(|&v| {
            if norm > 0.0 {
                f16::from_f32(v / norm)
            } else {
                f16::from_f32(v)
            }
        })
        .collect())
}

/// Map a configured model name onto a fastembed built-in model
fn builtin_model(name: &str) -> Result<EmbeddingModel> {
    match name.to_lowercase().as_str() {
        "all-minilm-l6-v2" => Ok(EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "nomic-embed-text-v1.5" => Ok(EmbeddingModel::NomicEmbedTextV15),
        "snowflake-arctic-embed-xs" => Ok(EmbeddingModel::SnowflakeArcticEmbedXS),
        other => Err(EmbedError::invalid_config(format!(
            "unknown local embedding model '{other}'"
        ))),
    }
}

/// Type alias for cached model entries (model, dimension)
type ModelCacheEntry = (Arc<Mutex<TextEmbedding>>, usize);

/// Loaded models, shared by every provider built with the same config
static MODEL_CACHE: OnceLock<Mutex<HashMap<String, ModelCacheEntry>>> = OnceLock::new();

fn get_model_cache() -> &'static Mutex<HashMap<String, ModelCacheEntry>> {
    MODEL_CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// FastEmbed-based embedding provider running ONNX models locally
#[derive(Clone)]
pub struct FastEmbedProvider {
    config: EmbedConfig,
    model: Option<Arc<Mutex<TextEmbedding>>>,
    dimension: usize,
}

impl std::fmt::Debug for FastEmbedProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastEmbedProvider")
            .field("config", &self.config)
            .field("model", &self.model.is_some())
            .field("dimension", &self.dimension)
            .finish()
    }
}

impl FastEmbedProvider {
    /// Creates a new uninitialized provider. Call [`initialize`](Self::initialize)
    /// or use [`create`](Self::create) before embedding.
    pub fn new(config: EmbedConfig) -> Self {
        Self {
            config,
            model: None,
            dimension: 384, // all-MiniLM-L6-v2
        }
    }

    /// Creates and initializes a provider in one step.
    pub async fn create(config: EmbedConfig) -> Result<Self> {
        let mut provider = Self::new(config);
        provider.initialize().await?;
        Ok(provider)
    }

    /// Downloads (if needed) and loads the model, reusing a cached instance
    /// when another provider already loaded the same configuration.
    pub async fn initialize(&mut self) -> Result<()> {
        tracing::info!(
            "Initializing FastEmbed provider for model: {}",
            self.config.model_name()
        );

        let model_kind = builtin_model(self.config.model_name())?;
        let cache_key = self.create_cache_key();

        let cached = {
            let cache = get_model_cache()
                .lock()
                .map_err(|_| EmbedError::LockPoisoned)?;
            cache
                .get(&cache_key)
                .map(|(model, dim)| (Arc::clone(model), *dim))
        };

        if let Some((model, dimension)) = cached {
            tracing::info!("Using cached model for: {}", self.config.model_name());
            self.model = Some(model);
            self.dimension = dimension;
            return Ok(());
        }

        let cache_dir = self.config.cache_dir.clone();
        let model_name = self.config.model_name().to_string();
        let (model, dimension) =
            tokio::task::spawn_blocking(move || -> Result<(TextEmbedding, usize)> {
                tracing::info!("Loading embedding model: {}", model_name);

                let init_options = InitOptions::new(model_kind)
                    .with_cache_dir(cache_dir)
                    .with_show_download_progress(false);
                let mut model = TextEmbedding::try_new(init_options)?;

                // Probe once to learn the output dimension
                let probe = model.embed(vec!["dimension probe".to_string()], None)?;
                let dimension = probe.first().map(|emb| emb.len()).ok_or_else(|| {
                    EmbedError::invalid_config("model produced no embedding for probe text")
                })?;

                tracing::info!("Model loaded successfully. Dimension: {}", dimension);
                Ok((model, dimension))
            })
            .await??;

        let model = Arc::new(Mutex::new(model));
        get_model_cache()
            .lock()
            .map_err(|_| EmbedError::LockPoisoned)?
            .insert(cache_key, (Arc::clone(&model), dimension));

        self.model = Some(model);
        self.dimension = dimension;
        Ok(())
    }

    /// Clears the process-wide model cache.
    pub fn clear_cache() {
        if let Ok(mut cache) = get_model_cache().lock() {
            cache.clear();
            tracing::info!("Model cache cleared");
        }
    }

    /// Returns the number of cached models.
    pub fn cache_size() -> usize {
        get_model_cache()
            .lock()
            .map(|cache| cache.len())
            .unwrap_or(0)
    }

    fn create_cache_key(&self) -> String {
        let mut hasher = FnvHasher::default();
        hasher.write(b"v1:");
        hasher.write(self.config.model_name().to_lowercase().as_bytes());
        hasher.write(self.config.cache_dir.to_string_lossy().as_bytes());
        format!("v1:{:x}", hasher.finish())
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f16>> {
        let result = self.embed_texts(&[text.to_string()]).await?;
        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::embedding_gen("No embedding generated for text"))
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<EmbeddingResult> {
        if texts.is_empty() {
            return Ok(EmbeddingResult::new(vec![]));
        }

        let model = self.model.as_ref().ok_or_else(|| {
            EmbedError::invalid_config("Model not initialized. Call initialize() first.")
        })?;

        tracing::debug!("Generating embeddings for {} texts", texts.len());

        let mut all_embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.config.batch_size.max(1)) {
            let chunk = chunk.to_vec();
            let model = Arc::clone(model);

            let raw = tokio::task::spawn_blocking(move || -> Result<Vec<Vec<f32>>> {
                let mut guard = model.lock().map_err(|_| EmbedError::LockPoisoned)?;
                Ok(guard.embed(chunk, None)?)
            })
            .await??;

            for embedding in raw {
                all_embeddings.push(to_f16_vector(&embedding, self.config.normalize)?);
            }
        }

        tracing::debug!("Generated {} embeddings", all_embeddings.len());
        Ok(EmbeddingResult::new(all_embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        self.dimension
    }

    fn provider_name(&self) -> &str {
        "fastembed"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_result() {
        let embeddings = vec![
            vec![f16::from_f32(0.1), f16::from_f32(0.2), f16::from_f32(0.3)],
            vec![f16::from_f32(0.4), f16::from_f32(0.5), f16::from_f32(0.6)],
        ];
        let result = EmbeddingResult::new(embeddings);

        assert_eq!(result.len(), 2);
        assert_eq!(result.dimension, 3);
        assert!(!result.is_empty());
        assert_eq!(EmbeddingResult::new(vec![]).dimension, 0);
    }

    #[test]
    fn test_fastembed_provider_creation() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());

        assert_eq!(provider.provider_name(), "fastembed");
        assert_eq!(provider.embedding_dimension(), 384);
    }

    #[tokio::test]
    async fn test_uninitialized_provider_refuses_to_embed() {
        let provider = FastEmbedProvider::new(EmbedConfig::default());
        let err = provider.embed_text("hello").await.unwrap_err();
        assert!(matches!(err, EmbedError::InvalidConfig { .. }));
    }

    #[tokio::test]
    async fn test_unknown_model_is_rejected() {
        let config = EmbedConfig::fastembed("models", "text-embedding-3-small");
        let err = FastEmbedProvider::create(config).await.unwrap_err();
        assert!(err.to_string().contains("text-embedding-3-small"));
    }

    #[test]
    fn test_builtin_model_names() {
        assert!(builtin_model("all-MiniLM-L6-v2").is_ok());
        assert!(builtin_model("bge-small-en-v1.5").is_ok());
        assert!(builtin_model("snowflake-arctic-embed-xs").is_ok());
        assert!(builtin_model("gpt-4").is_err());
    }

    #[test]
    fn test_to_f16_vector_normalizes() {
        let v = to_f16_vector(&[3.0, 4.0], true).unwrap();
        assert!((v[0].to_f32() - 0.6).abs() < 1e-3);
        assert!((v[1].to_f32() - 0.8).abs() < 1e-3);

        let raw = to_f16_vector(&[3.0, 4.0], false).unwrap();
        assert_eq!(raw, vec![f16::from_f32(3.0), f16::from_f32(4.0)]);

        // zero vectors stay zero instead of dividing by zero
        let zero = to_f16_vector(&[0.0, 0.0], true).unwrap();
        assert_eq!(zero, vec![f16::ZERO, f16::ZERO]);

        let err = to_f16_vector(&[f32::NAN], true).unwrap_err();
        assert!(matches!(err, EmbedError::EmbeddingGeneration { .. }));
        assert!(matches!(
            to_f16_vector(&[1.0, f32::INFINITY], false),
            Err(EmbedError::EmbeddingGeneration { .. })
        ));
    }

    #[test]
    fn test_cache_key_generation() {
        let a = FastEmbedProvider::new(EmbedConfig::fastembed("models", "bge-small-en-v1.5"));
        let b = FastEmbedProvider::new(EmbedConfig::fastembed("models", "BGE-small-en-v1.5"));
        let c = FastEmbedProvider::new(EmbedConfig::fastembed("other", "bge-small-en-v1.5"));

        assert_eq!(a.create_cache_key(), b.create_cache_key());
        assert_ne!(a.create_cache_key(), c.create_cache_key());
        assert!(a.create_cache_key().starts_with("v1:"));
    }

    #[tokio::test]
    #[ignore] // Downloads a real model: cargo test -p ragchat-embed -- --ignored
    async fn test_local_model_similarity() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let provider =
            FastEmbedProvider::create(EmbedConfig::fastembed(temp_dir.path(), "all-minilm-l6-v2"))
                .await?;

        let texts = vec![
            "How can I save energy at home?".to_string(),
            "Ways to reduce household power use".to_string(),
            "The capital of France is Paris".to_string(),
        ];
        let result = provider.embed_texts(&texts).await?;
        assert_eq!(result.len(), 3);
        assert_eq!(result.dimension, provider.embedding_dimension());

        let dot = |a: &[f16], b: &[f16]| -> f32 {
            a.iter().zip(b).map(|(x, y)| x.to_f32() * y.to_f32()).sum()
        };
        let related = dot(&result.embeddings[0], &result.embeddings[1]);
        let unrelated = dot(&result.embeddings[0], &result.embeddings[2]);
        assert!(related > unrelated);
        Ok(())
    }
}
