//! SQLite implementation of the ragchat storage traits
//!
//! Similarity search is a linear scan with cosine similarity computed in
//! memory. That is fine for the corpus sizes a single-node chat backend sees;
//! an ANN index would slot in behind the same traits.
//!
//! ## Key Components
//!
//! - **SqliteStore**: Implements DocumentStore, CacheStore and ChatHistoryStore
//! - **Vector Operations**: Cosine ranking over decoded f16 blobs

use super::{
    CacheEntryId, CacheStore, ChatHistoryStore, ChatMessage, ChatSession, DocumentStore,
    NearestEntry, Passage, Role,
};
use crate::database::Database;
use crate::similarity::{cosine_similarity, decode_embedding, encode_embedding};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use half::f16;
use sqlx::Row;
use std::path::Path;

/// SQLite-backed store. See module docs for details.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    database: Database,
}

impl SqliteStore {
    pub fn new(database: Database) -> Self {
        Self { database }
    }

    pub async fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub async fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory().await?))
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    async fn count(&self, table: &str) -> Result<usize> {
        let row = sqlx::query(&format!("SELECT COUNT(*) AS n FROM {table}"))
            .fetch_one(self.database.pool())
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as usize)
    }
}

#[async_trait]
impl DocumentStore for SqliteStore {
    async fn insert_passages(&self, passages: Vec<Passage>) -> Result<usize> {
        let mut tx = self.database.pool().begin().await?;
        let now = Utc::now();
        let mut inserted = 0;

        for passage in passages {
            let metadata = serde_json::to_string(&passage.metadata)?;
            let result = sqlx::query(
                r#"
                INSERT OR IGNORE INTO passages (id, source, content, metadata, embedding, created_at)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&passage.id)
            .bind(&passage.source)
            .bind(&passage.content)
            .bind(metadata)
            .bind(encode_embedding(&passage.embedding))
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += result.rows_affected() as usize;
        }

        tx.commit().await?;
        tracing::debug!("Inserted {} new passages", inserted);
        Ok(inserted)
    }

    async fn query_by_similarity(&self, query: &[f16], limit: usize) -> Result<Vec<(Passage, f32)>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            "SELECT id, source, content, metadata, embedding FROM passages ORDER BY rowid",
        )
        .fetch_all(self.database.pool())
        .await?;

        let mut scored = Vec::with_capacity(rows.len());
        let mut skipped = 0usize;
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let embedding = decode_embedding(&blob)?;
            let Some(score) = cosine_similarity(query, &embedding) else {
                skipped += 1;
                continue;
            };
            let metadata: String = row.try_get("metadata")?;
            let passage = Passage {
                id: row.try_get("id")?,
                source: row.try_get("source")?,
                content: row.try_get("content")?,
                metadata: serde_json::from_str(&metadata)
                    .context("passage metadata is not a JSON object")?,
                embedding,
            };
            scored.push((passage, score));
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} passages whose embedding dimension differs from the query ({})",
                skipped,
                query.len()
            );
        }

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn passage_count(&self) -> Result<usize> {
        self.count("passages").await
    }
}

#[async_trait]
impl CacheStore for SqliteStore {
    async fn find_nearest(&self, query: &[f16]) -> Result<Option<NearestEntry>> {
        let rows = sqlx::query("SELECT id, question, answer, embedding FROM cache_entries ORDER BY id")
            .fetch_all(self.database.pool())
            .await?;

        let mut best: Option<(sqlx::sqlite::SqliteRow, f32)> = None;
        let mut skipped = 0usize;
        for row in rows {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let Some(score) = cosine_similarity(query, &decode_embedding(&blob)?) else {
                skipped += 1;
                continue;
            };
            // Strictly greater, so the earliest entry wins a tie
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((row, score));
            }
        }

        if skipped > 0 {
            tracing::warn!(
                "Skipped {} cache entries whose embedding dimension differs from the query ({})",
                skipped,
                query.len()
            );
        }

        best.map(|(row, similarity)| {
            Ok(NearestEntry {
                id: row.try_get("id")?,
                question: row.try_get("question")?,
                answer: row.try_get("answer")?,
                similarity,
            })
        })
        .transpose()
    }

    async fn insert(&self, question: &str, embedding: &[f16], answer: &str) -> Result<CacheEntryId> {
        let result = sqlx::query(
            "INSERT INTO cache_entries (question, embedding, answer, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(question)
        .bind(encode_embedding(embedding))
        .bind(answer)
        .bind(Utc::now())
        .execute(self.database.pool())
        .await?;
        Ok(result.last_insert_rowid())
    }

    async fn entry_count(&self) -> Result<usize> {
        self.count("cache_entries").await
    }
}

#[async_trait]
impl ChatHistoryStore for SqliteStore {
    async fn create_session(&self) -> Result<String> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO sessions (session_id, summary, created_at, updated_at) VALUES (?, NULL, ?, ?)",
        )
        .bind(&session_id)
        .bind(now)
        .bind(now)
        .execute(self.database.pool())
        .await?;
        tracing::debug!("Created session {}", session_id);
        Ok(session_id)
    }

    async fn append_message(&self, session_id: &str, role: Role, message: &str) -> Result<bool> {
        let mut tx = self.database.pool().begin().await?;
        let now = Utc::now();

        let updated = sqlx::query("UPDATE sessions SET updated_at = ? WHERE session_id = ?")
            .bind(now)
            .bind(session_id)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            "INSERT INTO messages (session_id, role, message, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(role.as_str())
        .bind(message)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let Some(row) = sqlx::query(
            "SELECT session_id, summary, created_at, updated_at FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(self.database.pool())
        .await?
        else {
            return Ok(None);
        };

        let messages = sqlx::query(
            "SELECT role, message, created_at FROM messages WHERE session_id = ? ORDER BY id",
        )
        .bind(session_id)
        .fetch_all(self.database.pool())
        .await?;

        let mut message_history = Vec::with_capacity(messages.len());
        for m in messages {
            let role: String = m.try_get("role")?;
            message_history.push(ChatMessage {
                role: role.parse()?,
                message: m.try_get("message")?,
                created_at: m.try_get::<DateTime<Utc>, _>("created_at")?,
            });
        }

        Ok(Some(ChatSession {
            session_id: row.try_get("session_id")?,
            message_history,
            summary: row.try_get("summary")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        }))
    }

    async fn save_record(&self, session_id: &str, summary: &str) -> Result<bool> {
        let result =
            sqlx::query("UPDATE sessions SET summary = ?, updated_at = ? WHERE session_id = ?")
                .bind(summary)
                .bind(Utc::now())
                .bind(session_id)
                .execute(self.database.pool())
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn session_count(&self) -> Result<usize> {
        self.count("sessions").await
    }
}
