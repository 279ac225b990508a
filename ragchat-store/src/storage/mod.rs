//! Storage abstraction layer for ragchat
//!
//! Trait-based abstractions over the three things the chat backend persists.
//! The pipeline crates only see these traits, so tests can swap in fakes and
//! a different backend can be added without touching retrieval or caching.
//!
//! ## Key Components
//!
//! - **DocumentStore**: Passages with embeddings, searched by cosine similarity
//! - **CacheStore**: Append-only semantic cache of question embedding to answer
//! - **ChatHistoryStore**: Sessions with an ordered message history and summary
//! - **Data Types**: Passage, NearestEntry, ChatMessage, ChatSession
//!
//! ## Architecture
//!
//! ```text
//! DocumentStore ────┐
//! CacheStore ───────┼── SqliteStore (concrete implementation)
//! ChatHistoryStore ─┘
//! ```

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod sqlite_store;

/// Hex blake3 hash of a passage's content.
pub type PassageId = String;

/// Database ID of a semantic cache entry.
pub type CacheEntryId = i64;

/// Content-addressed id for a passage, so re-ingesting text is a no-op
pub fn passage_id(content: &str) -> PassageId {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// A unit of retrievable document text. See module docs for details.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    pub id: PassageId,
    pub source: String,
    pub content: String,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub embedding: Vec<f16>,
}

impl Passage {
    pub fn new(source: impl Into<String>, content: impl Into<String>, embedding: Vec<f16>) -> Self {
        let content = content.into();
        Self {
            id: passage_id(&content),
            source: source.into(),
            content,
            metadata: serde_json::Map::new(),
            embedding,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Map<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Closest cache entry to a query embedding
#[derive(Debug, Clone, PartialEq)]
pub struct NearestEntry {
    pub id: CacheEntryId,
    pub question: String,
    pub answer: String,
    pub similarity: f32,
}

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(anyhow::anyhow!("unknown message role '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// A session with its full message history. See module docs for details.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    pub session_id: String,
    pub message_history: Vec<ChatMessage>,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Passage storage and similarity search. See module docs for details.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert passages, skipping ids already present. Returns how many were new.
    async fn insert_passages(&self, passages: Vec<Passage>) -> Result<usize>;

    /// Up to `limit` passages ordered by descending cosine similarity to `query`.
    /// Passages whose embedding dimension differs from the query are skipped.
    async fn query_by_similarity(&self, query: &[f16], limit: usize) -> Result<Vec<(Passage, f32)>>;

    /// Number of stored passages
    async fn passage_count(&self) -> Result<usize>;
}

/// Nearest-neighbour lookup over cached answers. See module docs for details.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// The most similar entry, or `None` when the cache is empty. On equal
    /// similarity the earliest inserted entry wins.
    async fn find_nearest(&self, query: &[f16]) -> Result<Option<NearestEntry>>;

    /// Append an entry. Existing entries are never overwritten.
    async fn insert(&self, question: &str, embedding: &[f16], answer: &str) -> Result<CacheEntryId>;

    async fn entry_count(&self) -> Result<usize>;
}

/// Session and message persistence. See module docs for details.
#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    /// Create an empty session and return its id
    async fn create_session(&self) -> Result<String>;

    /// Append a message. Returns false if the session does not exist.
    async fn append_message(&self, session_id: &str, role: Role, message: &str) -> Result<bool>;

    async fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>>;

    /// Store a summary on the session. Returns false if the session does not exist.
    async fn save_record(&self, session_id: &str, summary: &str) -> Result<bool>;

    async fn session_count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passage_id_is_content_addressed() {
        let a = Passage::new("a.txt", "The sky is blue.", vec![]);
        let b = Passage::new("b.txt", "The sky is blue.", vec![f16::ONE]);
        let c = Passage::new("a.txt", "The sky is green.", vec![]);

        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.id.len(), 64);
    }

    #[test]
    fn test_role_round_trip() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert_eq!(Role::Assistant.to_string(), "assistant");
        assert!("system".parse::<Role>().is_err());
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    }
}
