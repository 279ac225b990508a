//! SQLite connection setup and schema for ragchat.
//!
//! One database file holds everything the chat backend persists: document
//! passages for retrieval, semantic-cache entries, and chat sessions.
//!
//! ## Database Schema
//!
//! ```sql
//! -- Passages: retrievable document text with its f16 embedding
//! CREATE TABLE passages (
//!     id TEXT PRIMARY KEY,             -- blake3 hash of content (hex)
//!     source TEXT NOT NULL,            -- where the passage came from
//!     content TEXT NOT NULL,
//!     metadata TEXT NOT NULL,          -- JSON object
//!     embedding BLOB NOT NULL,         -- f16 vector
//!     created_at TEXT NOT NULL
//! );
//!
//! -- Semantic cache: append-only question embedding -> answer
//! CREATE TABLE cache_entries (
//!     id INTEGER PRIMARY KEY AUTOINCREMENT,
//!     question TEXT NOT NULL,
//!     embedding BLOB NOT NULL,
//!     answer TEXT NOT NULL,
//!     created_at TEXT NOT NULL
//! );
//!
//! -- Chat sessions and their linear message history
//! CREATE TABLE sessions (session_id TEXT PRIMARY KEY, summary TEXT, created_at, updated_at);
//! CREATE TABLE messages (id INTEGER PRIMARY KEY AUTOINCREMENT, session_id, role, message, created_at);
//! ```
//!
//! ## SQLite Settings
//!
//! - **WAL mode** so concurrent requests can read while one writes
//! - **Busy timeout** of 5 seconds instead of failing on a locked database
//! - **Foreign keys** so deleting a session removes its messages

use anyhow::Result;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default database file name, relative to the working directory
pub const DEFAULT_DATABASE_FILE: &str = ".ragchat.db";

/// Handle to the ragchat SQLite database.
///
/// Cloning is cheap; clones share the same connection pool.
#[derive(Clone, Debug)]
pub struct Database {
    path: Option<PathBuf>,
    pool: SqlitePool,
}

impl Database {
    /// Opens (creating if needed) a database file and ensures the schema exists.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let pool = SqlitePool::connect_with(
            SqliteConnectOptions::new()
                .filename(path)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
                .busy_timeout(Duration::from_secs(5))
                .foreign_keys(true)
                .create_if_missing(true),
        )
        .await?;

        tracing::debug!("Opened database at {}", path.display());
        Self::new_with_pool(Some(path.to_path_buf()), pool).await
    }

    /// Opens an in-memory database, used by tests.
    ///
    /// Every pooled connection to `sqlite::memory:` would get its own empty
    /// database, so the pool is pinned to a single long-lived connection.
    pub async fn open_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
            .await?;
        Self::new_with_pool(None, pool).await
    }

    async fn new_with_pool(path: Option<PathBuf>, pool: SqlitePool) -> Result<Self> {
        Self::create_tables(&pool).await?;
        Ok(Self { path, pool })
    }

    async fn create_tables(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS passages (
                id TEXT PRIMARY KEY,
                source TEXT NOT NULL,
                content TEXT NOT NULL,
                metadata TEXT NOT NULL DEFAULT '{}',
                embedding BLOB NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                question TEXT NOT NULL,
                embedding BLOB NOT NULL,
                answer TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                summary TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                message TEXT NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(session_id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(source)")
            .execute(pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id)")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Location of the database file, `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Get the underlying SQLite connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
