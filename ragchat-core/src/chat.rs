//! Session-oriented chat flow on top of the pipeline
//!
//! A session is a linear list of messages. The client records a question,
//! asks for it to be answered, and may later attach a summary record. The
//! question answered is the first user message of the session; later
//! messages are kept as history only.
//!
//! Only [`ChatService::answer_session`] needs the pipeline. A service built
//! with [`ChatService::history_only`] handles every other operation without
//! loading an embedding model or contacting the language model.

use crate::error::{RagError, Result};
use crate::pipeline::{RagAnswer, RagPipeline};
use crate::types::Query;
use ragchat_store::storage::{ChatHistoryStore, ChatMessage, ChatSession, Role};
use std::sync::Arc;

pub struct ChatService {
    pipeline: Option<Arc<RagPipeline>>,
    history: Arc<dyn ChatHistoryStore>,
}

impl ChatService {
    pub fn new(pipeline: Arc<RagPipeline>, history: Arc<dyn ChatHistoryStore>) -> Self {
        Self {
            pipeline: Some(pipeline),
            history,
        }
    }

    /// Session bookkeeping without a pipeline; `answer_session` is refused
    pub fn history_only(history: Arc<dyn ChatHistoryStore>) -> Self {
        Self {
            pipeline: None,
            history,
        }
    }

    pub async fn create_session(&self) -> Result<String> {
        let session_id = self.history.create_session().await.map_err(RagError::storage)?;
        tracing::info!("Created session {}", session_id);
        Ok(session_id)
    }

    /// Append a user message to the session
    pub async fn record_question(&self, session_id: &str, message: &str) -> Result<()> {
        let query = Query::new(message)?;
        let appended = self
            .history
            .append_message(session_id, Role::User, query.as_str())
            .await
            .map_err(RagError::storage)?;
        if !appended {
            return Err(not_found(session_id));
        }
        Ok(())
    }

    /// Answer the session's question and append the answer to its history
    pub async fn answer_session(&self, session_id: &str) -> Result<RagAnswer> {
        let session = self.session(session_id).await?;
        let question = session
            .message_history
            .iter()
            .find(|m| m.role == Role::User)
            .ok_or_else(|| RagError::EmptyHistory {
                session_id: session_id.to_string(),
            })?;

        let pipeline = self.pipeline.as_ref().ok_or_else(|| {
            RagError::invalid_config("this chat service was built without a pipeline")
        })?;
        let answer = pipeline.run(&question.message).await?;

        let appended = self
            .history
            .append_message(session_id, Role::Assistant, &answer.answer)
            .await
            .map_err(RagError::storage)?;
        if !appended {
            return Err(not_found(session_id));
        }
        Ok(answer)
    }

    pub async fn session(&self, session_id: &str) -> Result<ChatSession> {
        self.history
            .get_session(session_id)
            .await
            .map_err(RagError::storage)?
            .ok_or_else(|| not_found(session_id))
    }

    pub async fn history(&self, session_id: &str) -> Result<Vec<ChatMessage>> {
        Ok(self.session(session_id).await?.message_history)
    }

    /// Attach a summary to the session
    pub async fn save_record(&self, session_id: &str, summary: &str) -> Result<()> {
        let saved = self
            .history
            .save_record(session_id, summary)
            .await
            .map_err(RagError::storage)?;
        if !saved {
            return Err(not_found(session_id));
        }
        tracing::info!("Saved record for session {}", session_id);
        Ok(())
    }
}

fn not_found(session_id: &str) -> RagError {
    RagError::SessionNotFound {
        session_id: session_id.to_string(),
    }
}
