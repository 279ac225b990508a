//! Integration tests for the on-disk store
//!
//! These cover behaviour that only shows up with a real database file:
//! - Data survives closing and reopening the database
//! - Cache entries are append-only and keep their insertion order
//! - Sessions stay isolated from each other

use anyhow::Result;
use half::f16;
use ragchat_store::SqliteStore;
use ragchat_store::storage::{CacheStore, ChatHistoryStore, DocumentStore, Passage, Role};
use tempfile::tempdir;

fn v(values: &[f32]) -> Vec<f16> {
    values.iter().copied().map(f16::from_f32).collect()
}

/// Everything written through one handle is visible after reopening the file
#[tokio::test]
async fn test_state_persists_across_reopen() -> Result<()> {
    let temp_dir = tempdir()?;
    let db_path = temp_dir.path().join("ragchat.db");

    let session_id = {
        let store = SqliteStore::open(&db_path).await?;
        store
            .insert_passages(vec![
                Passage::new("faq.md", "Refunds take five days.", v(&[1.0, 0.0])),
                Passage::new("faq.md", "Shipping is free over $50.", v(&[0.0, 1.0])),
            ])
            .await?;
        store.insert("How long do refunds take?", &v(&[1.0, 0.1]), "Five days.").await?;

        let id = store.create_session().await?;
        store.append_message(&id, Role::User, "How long do refunds take?").await?;
        store.database().pool().close().await;
        id
    };

    let store = SqliteStore::open(&db_path).await?;
    assert_eq!(store.passage_count().await?, 2);
    assert_eq!(store.entry_count().await?, 1);

    let hits = store.query_by_similarity(&v(&[1.0, 0.0]), 1).await?;
    assert_eq!(hits[0].0.content, "Refunds take five days.");

    let nearest = store.find_nearest(&v(&[1.0, 0.1])).await?.expect("cache entry");
    assert_eq!(nearest.answer, "Five days.");

    let session = store.get_session(&session_id).await?.expect("session");
    assert_eq!(session.message_history.len(), 1);
    assert_eq!(session.message_history[0].role, Role::User);
    Ok(())
}

/// Inserting the same question twice adds a second row rather than replacing
#[tokio::test]
async fn test_cache_is_append_only() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = SqliteStore::open(&temp_dir.path().join("cache.db")).await?;

    let first = store.insert("q", &v(&[1.0, 1.0]), "old answer").await?;
    let second = store.insert("q", &v(&[1.0, 1.0]), "new answer").await?;
    assert!(second > first);
    assert_eq!(store.entry_count().await?, 2);

    // Equal similarity: the earliest entry is returned
    let nearest = store.find_nearest(&v(&[1.0, 1.0])).await?.expect("cache entry");
    assert_eq!(nearest.id, first);
    assert_eq!(nearest.answer, "old answer");
    Ok(())
}

#[tokio::test]
async fn test_sessions_are_isolated() -> Result<()> {
    let temp_dir = tempdir()?;
    let store = SqliteStore::open(&temp_dir.path().join("sessions.db")).await?;

    let a = store.create_session().await?;
    let b = store.create_session().await?;
    assert_ne!(a, b);

    store.append_message(&a, Role::User, "question for a").await?;
    store.append_message(&b, Role::User, "question for b").await?;
    store.append_message(&a, Role::Assistant, "answer for a").await?;

    let session_a = store.get_session(&a).await?.expect("session a");
    let session_b = store.get_session(&b).await?.expect("session b");
    assert_eq!(session_a.message_history.len(), 2);
    assert_eq!(session_b.message_history.len(), 1);
    assert_eq!(session_b.message_history[0].message, "question for b");
    assert!(session_a.updated_at >= session_a.created_at);
    Ok(())
}
