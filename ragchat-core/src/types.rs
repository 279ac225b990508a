//! Values that flow through a pipeline run

use crate::error::{RagError, Result};
use ragchat_store::storage::Passage;
use serde::Serialize;
use std::fmt;

/// A user's question, verbatim. Never empty or whitespace-only.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Query(String);

impl Query {
    pub fn new(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RagError::EmptyQuery);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl AsRef<str> for Query {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A passage returned by retrieval, most relevant first in any sequence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedPassage {
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub source: String,
    /// Cosine similarity to the query
    pub score: f32,
}

impl RetrievedPassage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
            source: String::new(),
            score: 0.0,
        }
    }
}

impl From<(Passage, f32)> for RetrievedPassage {
    fn from((passage, score): (Passage, f32)) -> Self {
        Self {
            content: passage.content,
            metadata: passage.metadata,
            source: passage.source,
            score,
        }
    }
}
