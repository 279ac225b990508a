//! Vector retrieval over the document store
//!
//! The retriever embeds the question and asks the [`DocumentStore`] for the
//! nearest passages. Any failure on that path is reported as
//! [`RagError::RetrievalUnavailable`]; the caller never receives a silently
//! empty context in place of an error. An empty store is not a failure.

use crate::error::{RagError, Result};
use crate::types::{Query, RetrievedPassage};
use half::f16;
use ragchat_embed::EmbeddingProvider;
use ragchat_store::storage::DocumentStore;
use std::sync::Arc;

/// Top-k passage retriever. See module docs for details.
pub struct VectorRetriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn DocumentStore>,
    top_k: usize,
}

impl VectorRetriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn DocumentStore>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            store,
            top_k,
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Embed the question with the retriever's provider
    pub async fn embed(&self, query: &Query) -> Result<Vec<f16>> {
        self.embedder
            .embed_text(query.as_str())
            .await
            .map_err(RagError::retrieval)
    }

    /// Passages in retrieval-rank order, most relevant first
    pub async fn retrieve(&self, query: &Query) -> Result<Vec<RetrievedPassage>> {
        let embedding = self.embed(query).await?;
        self.retrieve_embedded(&embedding).await
    }

    /// Like [`retrieve`](Self::retrieve) for a question already embedded
    pub async fn retrieve_embedded(&self, embedding: &[f16]) -> Result<Vec<RetrievedPassage>> {
        let results = self
            .store
            .query_by_similarity(embedding, self.top_k)
            .await
            .map_err(RagError::retrieval)?;

        tracing::debug!(
            "Retrieved {} passages (top_k = {})",
            results.len(),
            self.top_k
        );
        Ok(results.into_iter().map(RetrievedPassage::from).collect())
    }
}
