//! Error taxonomy for a pipeline run and the chat session flow

/// Result type for ragchat-core operations.
pub type Result<T> = std::result::Result<T, RagError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Everything that can go wrong while answering a question.
///
/// Only [`RetrievalUnavailable`](RagError::RetrievalUnavailable) and
/// [`GenerationFailed`](RagError::GenerationFailed) abort a pipeline run.
/// [`CacheUnavailable`](RagError::CacheUnavailable) is reported by the cache
/// and absorbed by the pipeline, which then behaves as on a miss.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// The document store or the embedding call in front of it failed
    #[error("Retrieval unavailable: {source}")]
    RetrievalUnavailable {
        #[source]
        source: BoxError,
    },

    /// The cache store or its embedding call failed
    #[error("Semantic cache unavailable: {source}")]
    CacheUnavailable {
        #[source]
        source: BoxError,
    },

    /// The language model call failed or returned something unusable
    #[error("Answer generation failed: {source}")]
    GenerationFailed {
        #[source]
        source: BoxError,
    },

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Session {session_id} has no messages to answer")]
    EmptyHistory { session_id: String },

    /// Chat history persistence failed
    #[error("Storage error: {source}")]
    Storage {
        #[source]
        source: BoxError,
    },

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A pipeline step was attempted out of order
    #[error(transparent)]
    Stage(#[from] crate::pipeline::StageError),
}

impl RagError {
    pub fn retrieval<E: Into<BoxError>>(source: E) -> Self {
        Self::RetrievalUnavailable {
            source: source.into(),
        }
    }

    pub fn cache<E: Into<BoxError>>(source: E) -> Self {
        Self::CacheUnavailable {
            source: source.into(),
        }
    }

    pub fn generation<E: Into<BoxError>>(source: E) -> Self {
        Self::GenerationFailed {
            source: source.into(),
        }
    }

    pub fn storage<E: Into<BoxError>>(source: E) -> Self {
        Self::Storage {
            source: source.into(),
        }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// True for the failures that end a pipeline run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, RagError::CacheUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_constructors_keep_source() {
        let err = RagError::retrieval(anyhow::anyhow!("connection refused"));
        assert!(matches!(err, RagError::RetrievalUnavailable { .. }));
        assert_eq!(err.to_string(), "Retrieval unavailable: connection refused");
        assert!(err.source().is_some());

        let io = std::io::Error::new(std::io::ErrorKind::TimedOut, "timed out");
        let err = RagError::generation(io);
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn test_only_cache_failures_are_absorbed() {
        assert!(!RagError::cache("down").is_fatal());
        assert!(RagError::retrieval("down").is_fatal());
        assert!(RagError::generation("down").is_fatal());
        assert!(RagError::EmptyQuery.is_fatal());
    }
}
