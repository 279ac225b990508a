//! The retrieve → (cache gate) → generate pipeline
//!
//! A run is an explicit state machine over [`PipelineState`]:
//!
//! ```text
//! Start → Retrieving ─┬─ cache hit ──→ CacheHit ───┬→ Done
//!            │        └─ cache miss ─→ Generating ─┘
//!            └──────────────→ Failed ←──────┘
//! ```
//!
//! Retrieval always runs first, even when the cache is going to hit, so a
//! cached answer still comes back with fresh context. The question is
//! embedded once, by the retriever's provider, and that vector also keys the
//! cache lookup and store. The cache gate runs once per invocation. Cache failures are logged and treated as a miss;
//! retrieval and generation failures end the run.
//!
//! ## Key Components
//!
//! - **RagPipeline**: Owns the retriever, cache and generator; `run` is `&self`
//!   so one pipeline can serve concurrent requests behind an `Arc`
//! - **PipelineState**: Per-run record; rejects out-of-order stage changes
//! - **RagAnswer**: Answer, context and where the answer came from

use crate::cache::{CacheLookup, SemanticCache};
use crate::config::RagConfig;
use crate::error::{RagError, Result};
use crate::generator::AnswerGenerator;
use crate::llm::{LanguageModel, OllamaClient};
use crate::retriever::VectorRetriever;
use crate::types::{Query, RetrievedPassage};
use ragchat_embed::{EmbeddingProvider, create_provider};
use ragchat_store::SqliteStore;
use ragchat_store::storage::{CacheStore, DocumentStore};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

/// Where a run currently is. See module docs for the transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Start,
    Retrieving,
    CacheHit,
    Generating,
    Done,
    Failed,
}

impl Stage {
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        matches!(
            (self, next),
            (Start, Retrieving)
                | (Retrieving, CacheHit)
                | (Retrieving, Generating)
                | (Retrieving, Failed)
                | (CacheHit, Done)
                | (Generating, Done)
                | (Generating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }
}

/// A step attempted while the run was in the wrong stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action} while pipeline is in stage {stage:?}")]
pub struct StageError {
    pub stage: Stage,
    pub action: &'static str,
}

/// Per-run state threaded through the stages.
///
/// `context` can only be set while retrieving and `answer` only after the
/// cache gate chose a branch, each at most once.
#[derive(Debug, Clone)]
pub struct PipelineState {
    question: Query,
    context: Vec<RetrievedPassage>,
    answer: Option<String>,
    stage: Stage,
    retrieved: bool,
}

impl PipelineState {
    pub fn new(question: Query) -> Self {
        Self {
            question,
            context: Vec::new(),
            answer: None,
            stage: Stage::Start,
            retrieved: false,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn question(&self) -> &Query {
        &self.question
    }

    pub fn context(&self) -> &[RetrievedPassage] {
        &self.context
    }

    pub fn answer(&self) -> Option<&str> {
        self.answer.as_deref()
    }

    pub fn advance(&mut self, next: Stage) -> std::result::Result<(), StageError> {
        if !self.stage.can_advance_to(next) {
            return Err(StageError {
                stage: self.stage,
                action: "advance",
            });
        }
        tracing::debug!("stage {:?} -> {:?}", self.stage, next);
        self.stage = next;
        Ok(())
    }

    pub fn set_context(&mut self, context: Vec<RetrievedPassage>) -> std::result::Result<(), StageError> {
        if self.stage != Stage::Retrieving || self.retrieved {
            return Err(StageError {
                stage: self.stage,
                action: "set context",
            });
        }
        self.context = context;
        self.retrieved = true;
        Ok(())
    }

    pub fn set_answer(&mut self, answer: String) -> std::result::Result<(), StageError> {
        if !matches!(self.stage, Stage::CacheHit | Stage::Generating) || self.answer.is_some() {
            return Err(StageError {
                stage: self.stage,
                action: "set answer",
            });
        }
        self.answer = Some(answer);
        Ok(())
    }

    /// Move to `Failed` from wherever the run stopped
    fn fail(&mut self) {
        if !self.stage.is_terminal() {
            tracing::debug!("stage {:?} -> Failed", self.stage);
            self.stage = Stage::Failed;
        }
    }

    fn finish(self, source: AnswerSource) -> std::result::Result<RagAnswer, StageError> {
        match (self.stage, self.answer) {
            (Stage::Done, Some(answer)) => Ok(RagAnswer {
                answer,
                context: self.context,
                source,
            }),
            (stage, _) => Err(StageError {
                stage,
                action: "finish",
            }),
        }
    }
}

/// Where the returned answer came from
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnswerSource {
    Cache { similarity: f32 },
    Generated,
}

/// Result of a successful run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagAnswer {
    pub answer: String,
    pub context: Vec<RetrievedPassage>,
    pub source: AnswerSource,
}

impl RagAnswer {
    pub fn is_cached(&self) -> bool {
        matches!(self.source, AnswerSource::Cache { .. })
    }
}

/// Retrieval-augmented answering with a semantic cache. See module docs.
pub struct RagPipeline {
    retriever: VectorRetriever,
    cache: SemanticCache,
    generator: AnswerGenerator,
}

impl RagPipeline {
    /// The cache is keyed by the retriever's embeddings, so both should
    /// share one provider.
    pub fn new(retriever: VectorRetriever, cache: SemanticCache, generator: AnswerGenerator) -> Self {
        Self {
            retriever,
            cache,
            generator,
        }
    }

    /// Open the configured database, embedding provider and Ollama client
    pub async fn from_config(config: &RagConfig) -> Result<Self> {
        config.validate()?;
        let store = Arc::new(
            SqliteStore::open(&config.store.database)
                .await
                .map_err(RagError::storage)?,
        );
        let embedder = create_provider(config.embedding.clone())
            .await
            .map_err(RagError::retrieval)?;
        let model = Arc::new(OllamaClient::new(&config.generator)?);

        tracing::info!(
            "Pipeline ready: {} embeddings, {} generation, database {}",
            embedder.provider_name(),
            model.model_name(),
            config.store.database.display()
        );
        Ok(Self::with_collaborators(config, store.clone(), store, embedder, model))
    }

    /// Wire the pipeline from already-built collaborators
    pub fn with_collaborators(
        config: &RagConfig,
        documents: Arc<dyn DocumentStore>,
        cache_store: Arc<dyn CacheStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let retriever = VectorRetriever::new(embedder.clone(), documents, config.retriever.top_k);
        let cache = SemanticCache::new(embedder, cache_store, config.cache.similarity_threshold)
            .with_enabled(config.cache.enabled);
        let generator =
            AnswerGenerator::new(model).with_template(config.generator.prompt_template.clone());
        Self::new(retriever, cache, generator)
    }

    /// Answer `question`. Rejects blank input before any collaborator runs.
    pub async fn run(&self, question: &str) -> Result<RagAnswer> {
        let query = Query::new(question)?;
        self.run_query(query).await
    }

    pub async fn run_query(&self, query: Query) -> Result<RagAnswer> {
        let span = tracing::info_span!("rag_pipeline", question_len = query.as_str().len());
        self.execute(query).instrument(span).await
    }

    async fn execute(&self, query: Query) -> Result<RagAnswer> {
        let started = Instant::now();
        let mut state = PipelineState::new(query);

        state.advance(Stage::Retrieving)?;
        let retrieved = async {
            let embedding = self.retriever.embed(state.question()).await?;
            let context = self.retriever.retrieve_embedded(&embedding).await?;
            Ok::<_, RagError>((embedding, context))
        }
        .await;
        let (embedding, context) = match retrieved {
            Ok(retrieved) => retrieved,
            Err(e) => {
                state.fail();
                tracing::error!("Retrieval failed: {}", e);
                return Err(e);
            }
        };
        state.set_context(context)?;

        let lookup = match self.cache.lookup_embedded(&embedding).await {
            Ok(lookup) => lookup,
            Err(e) => {
                tracing::warn!("Semantic cache lookup failed, continuing as a miss: {}", e);
                CacheLookup::Miss
            }
        };

        let source = match lookup {
            CacheLookup::Hit(cached) => {
                state.advance(Stage::CacheHit)?;
                state.set_answer(cached.answer)?;
                AnswerSource::Cache {
                    similarity: cached.similarity,
                }
            }
            CacheLookup::Miss => {
                state.advance(Stage::Generating)?;
                let answer = match self.generator.generate(state.question(), state.context()).await {
                    Ok(answer) => answer,
                    Err(e) => {
                        state.fail();
                        tracing::error!("Generation failed: {}", e);
                        return Err(e);
                    }
                };
                if let Err(e) = self.cache.store_embedded(state.question(), &embedding, &answer).await {
                    tracing::warn!("Failed to store answer in semantic cache: {}", e);
                }
                state.set_answer(answer)?;
                AnswerSource::Generated
            }
        };

        state.advance(Stage::Done)?;
        let answer = state.finish(source)?;
        tracing::info!(
            "Answered ({}) with {} passages in {:?}",
            if answer.is_cached() { "cache hit" } else { "generated" },
            answer.context.len(),
            started.elapsed()
        );
        Ok(answer)
    }
}
