//! ragchat-core: retrieval-augmented answering with a semantic cache
//!
//! Turns a question into an answer grounded in retrieved passages, reusing
//! earlier answers when a sufficiently similar question was already asked.
//!
//! ## Key Modules
//!
//! - **[`retriever`]**: Embeds the question and fetches the top-k passages
//! - **[`cache`]**: Similarity-thresholded answer cache
//! - **[`generator`]**: Renders the RAG prompt and calls the language model
//! - **[`llm`]**: `LanguageModel` trait and the Ollama client
//! - **[`pipeline`]**: The staged run tying the three together
//! - **[`chat`]**: Sessions and message history around the pipeline
//! - **[`config`]**: `RagConfig`, loaded from TOML and the environment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ragchat_core::{RagConfig, RagPipeline};
//!
//! # async fn example() -> ragchat_core::Result<()> {
//! let config = RagConfig::discover(None)?;
//! let pipeline = RagPipeline::from_config(&config).await?;
//! let answer = pipeline.run("How do refunds work?").await?;
//! println!("{}", answer.answer);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod chat;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod retriever;
pub mod types;

pub use cache::{CacheLookup, CachedAnswer, SemanticCache};
pub use chat::ChatService;
pub use config::RagConfig;
pub use error::{RagError, Result};
pub use generator::AnswerGenerator;
pub use llm::{LanguageModel, OllamaClient};
pub use pipeline::{AnswerSource, PipelineState, RagAnswer, RagPipeline, Stage};
pub use retriever::VectorRetriever;
pub use types::{Query, RetrievedPassage};
