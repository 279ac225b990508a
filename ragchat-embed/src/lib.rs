//! # ragchat-embed
//!
//! Text embeddings for ragchat. The same [`EmbeddingProvider`] feeds both the
//! passage retriever and the semantic answer cache, so one configuration
//! decides how questions are turned into vectors everywhere.
//!
//! ## Providers
//!
//! - [`FastEmbedProvider`]: local ONNX models via fastembed, loaded once per
//!   process and shared through a global model cache
//! - [`OllamaEmbedProvider`]: remote models served by an Ollama instance
//!
//! Both return half-precision (f16) vectors, L2-normalized unless the
//! configuration says otherwise, so cosine similarity reduces to a dot product
//! and vectors take half the space in SQLite.
//!
//! ## Quick Start
//!
//! ```no_run
//! use ragchat_embed::{EmbedConfig, create_provider};
//!
//! # async fn example() -> ragchat_embed::Result<()> {
//! let provider = create_provider(EmbedConfig::default()).await?;
//! let vector = provider.embed_text("How do I reduce power use?").await?;
//! println!("{} dimensions from {}", vector.len(), provider.provider_name());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod ollama;
pub mod provider;

pub use config::{EmbedConfig, EmbedConfigBuilder, ProviderKind};
pub use error::{EmbedError, Result};
pub use ollama::OllamaEmbedProvider;
pub use provider::{
    EmbeddingProvider, EmbeddingResult, FastEmbedProvider, create_provider, to_f16_vector,
};
