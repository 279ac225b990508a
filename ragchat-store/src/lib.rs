//! ragchat-store: SQLite persistence for the ragchat backend
//!
//! Holds the three kinds of state a retrieval-augmented chat service keeps:
//! embedded document passages, the semantic answer cache, and chat sessions.
//!
//! ## Key Modules
//!
//! - **[`database`]**: Connection setup, pragmas and schema
//! - **[`storage`]**: Storage traits with the SQLite implementation
//! - **[`similarity`]**: Cosine similarity and f16 blob encoding
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use half::f16;
//! use ragchat_store::storage::{DocumentStore, Passage, sqlite_store::SqliteStore};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = SqliteStore::open(Path::new(".ragchat.db")).await?;
//! let embedding = vec![f16::from_f32(0.5); 384];
//! store
//!     .insert_passages(vec![Passage::new("notes.md", "Paris is in France.", embedding.clone())])
//!     .await?;
//! let hits = store.query_by_similarity(&embedding, 4).await?;
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod similarity;
pub mod storage;

pub use database::{DEFAULT_DATABASE_FILE, Database};
pub use storage::sqlite_store::SqliteStore;
