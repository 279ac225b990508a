//! In-process fakes for the pipeline's collaborators

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use half::f16;
use ragchat_core::{LanguageModel, RagConfig, RagPipeline};
use ragchat_embed::{EmbeddingProvider, EmbeddingResult};
use ragchat_store::storage::{CacheEntryId, CacheStore, DocumentStore, NearestEntry, Passage};
use std::sync::{Arc, Mutex};

/// Ordered record of collaborator calls shared by all fakes in a test
#[derive(Clone, Default)]
pub struct Events(Arc<Mutex<Vec<&'static str>>>);

impl Events {
    pub fn push(&self, event: &'static str) {
        self.0.lock().unwrap().push(event);
    }

    pub fn all(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, event: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| **e == event).count()
    }
}

/// Deterministic embedder: a byte histogram folded into 8 dimensions
pub struct StubEmbedder;

impl StubEmbedder {
    pub fn vector(text: &str) -> Vec<f16> {
        let mut v = [0.0f32; 8];
        for b in text.bytes() {
            v[(b % 8) as usize] += 1.0;
        }
        v.iter().copied().map(f16::from_f32).collect()
    }
}

#[async_trait]
impl EmbeddingProvider for StubEmbedder {
    async fn embed_text(&self, text: &str) -> ragchat_embed::Result<Vec<f16>> {
        Ok(Self::vector(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> ragchat_embed::Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(texts.iter().map(|t| Self::vector(t)).collect()))
    }

    fn embedding_dimension(&self) -> usize {
        8
    }

    fn provider_name(&self) -> &str {
        "stub"
    }
}

/// [`StubEmbedder`] that records an "embed" event per question
pub struct CountingEmbedder {
    pub events: Events,
    pub offline: bool,
}

impl CountingEmbedder {
    pub fn new(events: &Events) -> Self {
        Self {
            events: events.clone(),
            offline: false,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for CountingEmbedder {
    async fn embed_text(&self, text: &str) -> ragchat_embed::Result<Vec<f16>> {
        self.events.push("embed");
        if self.offline {
            return Err(ragchat_embed::EmbedError::embedding_gen("embedding server offline"));
        }
        Ok(StubEmbedder::vector(text))
    }

    async fn embed_texts(&self, texts: &[String]) -> ragchat_embed::Result<EmbeddingResult> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(EmbeddingResult::new(embeddings))
    }

    fn embedding_dimension(&self) -> usize {
        8
    }

    fn provider_name(&self) -> &str {
        "counting"
    }
}

pub struct FakeDocuments {
    pub passages: Vec<Passage>,
    pub events: Events,
    pub offline: bool,
}

impl FakeDocuments {
    pub fn new(events: &Events, contents: &[&str]) -> Self {
        Self {
            passages: contents
                .iter()
                .map(|c| Passage::new("fixture.txt", *c, StubEmbedder::vector(c)))
                .collect(),
            events: events.clone(),
            offline: false,
        }
    }

    pub fn offline(events: &Events) -> Self {
        Self {
            passages: Vec::new(),
            events: events.clone(),
            offline: true,
        }
    }
}

#[async_trait]
impl DocumentStore for FakeDocuments {
    async fn insert_passages(&self, passages: Vec<Passage>) -> anyhow::Result<usize> {
        Ok(passages.len())
    }

    /// Returns passages in fixture order with descending fake scores
    async fn query_by_similarity(&self, _query: &[f16], limit: usize) -> anyhow::Result<Vec<(Passage, f32)>> {
        self.events.push("retrieve");
        if self.offline {
            return Err(anyhow!("document store offline"));
        }
        Ok(self
            .passages
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, p)| (p.clone(), 0.9 - i as f32 * 0.1))
            .collect())
    }

    async fn passage_count(&self) -> anyhow::Result<usize> {
        Ok(self.passages.len())
    }
}

/// Cache store that always reports the same nearest entry
pub struct FakeCache {
    pub nearest: Option<NearestEntry>,
    pub inserted: Mutex<Vec<(String, String)>>,
    pub events: Events,
    pub lookup_fails: bool,
    pub insert_fails: bool,
}

impl FakeCache {
    pub fn empty(events: &Events) -> Self {
        Self {
            nearest: None,
            inserted: Mutex::new(Vec::new()),
            events: events.clone(),
            lookup_fails: false,
            insert_fails: false,
        }
    }

    pub fn with_nearest(events: &Events, answer: &str, similarity: f32) -> Self {
        Self {
            nearest: Some(NearestEntry {
                id: 1,
                question: "an earlier question".to_string(),
                answer: answer.to_string(),
                similarity,
            }),
            ..Self::empty(events)
        }
    }

    pub fn inserted(&self) -> Vec<(String, String)> {
        self.inserted.lock().unwrap().clone()
    }
}

#[async_trait]
impl CacheStore for FakeCache {
    async fn find_nearest(&self, _query: &[f16]) -> anyhow::Result<Option<NearestEntry>> {
        self.events.push("cache_lookup");
        if self.lookup_fails {
            return Err(anyhow!("cache store unreachable"));
        }
        Ok(self.nearest.clone())
    }

    async fn insert(&self, question: &str, _embedding: &[f16], answer: &str) -> anyhow::Result<CacheEntryId> {
        self.events.push("cache_insert");
        if self.insert_fails {
            return Err(anyhow!("cache store is read-only"));
        }
        let mut inserted = self.inserted.lock().unwrap();
        inserted.push((question.to_string(), answer.to_string()));
        Ok(inserted.len() as CacheEntryId)
    }

    async fn entry_count(&self) -> anyhow::Result<usize> {
        Ok(self.inserted.lock().unwrap().len())
    }
}

pub struct FakeModel {
    pub answer: String,
    pub prompts: Mutex<Vec<String>>,
    pub events: Events,
    pub offline: bool,
}

impl FakeModel {
    pub fn answering(events: &Events, answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            prompts: Mutex::new(Vec::new()),
            events: events.clone(),
            offline: false,
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn complete(&self, prompt: &str) -> anyhow::Result<String> {
        self.events.push("generate");
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.offline {
            return Err(anyhow!("model server offline"));
        }
        Ok(self.answer.clone())
    }

    fn model_name(&self) -> &str {
        "fake"
    }
}

pub fn pipeline(
    config: &RagConfig,
    documents: Arc<dyn DocumentStore>,
    cache: Arc<dyn CacheStore>,
    model: Arc<dyn LanguageModel>,
) -> RagPipeline {
    RagPipeline::with_collaborators(config, documents, cache, Arc::new(StubEmbedder), model)
}
