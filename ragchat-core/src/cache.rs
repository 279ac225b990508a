//! Semantic answer cache
//!
//! Questions are compared by embedding, not by string: a lookup embeds the
//! query, fetches the nearest stored entry and reports a hit only when the
//! cosine similarity reaches the configured threshold. The comparison is
//! inclusive, so a similarity exactly equal to the threshold is a hit.
//!
//! Failures come back as [`RagError::CacheUnavailable`]. The pipeline treats
//! that as a miss; the cache itself does not decide that.

use crate::error::{RagError, Result};
use crate::types::Query;
use half::f16;
use ragchat_embed::EmbeddingProvider;
use ragchat_store::storage::CacheStore;
use std::sync::Arc;

/// Answer reused from an earlier, similar question
#[derive(Debug, Clone, PartialEq)]
pub struct CachedAnswer {
    /// The earlier question the answer was generated for
    pub question: String,
    pub answer: String,
    pub similarity: f32,
}

/// Outcome of the cache gate
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(CachedAnswer),
    Miss,
}

impl CacheLookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// Similarity-keyed answer cache. See module docs for details.
pub struct SemanticCache {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn CacheStore>,
    threshold: f32,
    enabled: bool,
}

impl SemanticCache {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn CacheStore>, threshold: f32) -> Self {
        Self {
            embedder,
            store,
            threshold,
            enabled: true,
        }
    }

    /// A disabled cache misses every lookup and drops every store
    pub fn with_enabled(self, enabled: bool) -> Self {
        Self { enabled, ..self }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub async fn lookup(&self, query: &Query) -> Result<CacheLookup> {
        if !self.enabled {
            tracing::debug!("Semantic cache disabled, skipping lookup");
            return Ok(CacheLookup::Miss);
        }

        let embedding = self.embed(query).await?;
        self.lookup_embedded(&embedding).await
    }

    /// Cache gate for a question whose embedding is already known
    pub async fn lookup_embedded(&self, embedding: &[f16]) -> Result<CacheLookup> {
        if !self.enabled {
            tracing::debug!("Semantic cache disabled, skipping lookup");
            return Ok(CacheLookup::Miss);
        }

        let nearest = self
            .store
            .find_nearest(embedding)
            .await
            .map_err(RagError::cache)?;

        match nearest {
            Some(entry) if entry.similarity >= self.threshold => {
                tracing::debug!(
                    "Cache hit: similarity {:.4} >= {:.4} (entry {})",
                    entry.similarity,
                    self.threshold,
                    entry.id
                );
                Ok(CacheLookup::Hit(CachedAnswer {
                    question: entry.question,
                    answer: entry.answer,
                    similarity: entry.similarity,
                }))
            }
            Some(entry) => {
                tracing::debug!(
                    "Cache miss: best similarity {:.4} < {:.4}",
                    entry.similarity,
                    self.threshold
                );
                Ok(CacheLookup::Miss)
            }
            None => {
                tracing::debug!("Cache miss: no entries");
                Ok(CacheLookup::Miss)
            }
        }
    }

    /// Append `(query, answer)`. Entries are never overwritten.
    pub async fn store(&self, query: &Query, answer: &str) -> Result<()> {
        if !self.enabled {
            tracing::debug!("Semantic cache disabled, not storing answer");
            return Ok(());
        }

        let embedding = self.embed(query).await?;
        self.store_embedded(query, &embedding, answer).await
    }

    pub async fn store_embedded(&self, query: &Query, embedding: &[f16], answer: &str) -> Result<()> {
        if !self.enabled {
            tracing::debug!("Semantic cache disabled, not storing answer");
            return Ok(());
        }

        let id = self
            .store
            .insert(query.as_str(), embedding, answer)
            .await
            .map_err(RagError::cache)?;
        tracing::debug!("Stored cache entry {}", id);
        Ok(())
    }

    async fn embed(&self, query: &Query) -> Result<Vec<f16>> {
        self.embedder
            .embed_text(query.as_str())
            .await
            .map_err(RagError::cache)
    }
}
