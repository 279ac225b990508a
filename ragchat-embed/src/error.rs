//! Error types for the embedding service

/// Result type for embedding operations.
///
/// Convenience alias using [`EmbedError`] as the error type.
pub type Result<T> = std::result::Result<T, EmbedError>;

/// Error type for all embedding operations.
///
/// Covers configuration problems, model start-up failures, failures while
/// generating vectors, and transport errors when talking to a remote
/// embedding endpoint.
///
/// # Error Categories
///
/// - **Configuration Errors**: Unknown model names, bad endpoint URLs
/// - **Initialization Errors**: Failures while loading a local model
/// - **Runtime Errors**: Problems during actual embedding generation
/// - **Transport Errors**: HTTP failures against a remote provider
/// - **External Errors**: Failures bubbled up from dependencies
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    /// Error when model configuration is invalid
    #[error("Invalid embedding configuration: {message}")]
    InvalidConfig { message: String },

    /// Error during model initialization
    #[error("Model initialization failed: {source}")]
    ModelInitialization {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error during embedding generation
    #[error("Embedding generation failed: {source}")]
    EmbeddingGeneration {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Remote provider answered with a non-success status
    #[error("Embedding endpoint returned {status}: {body}")]
    RemoteStatus { status: u16, body: String },

    /// HTTP transport errors against a remote provider
    #[error("Embedding request failed: {source}")]
    Request {
        #[from]
        source: reqwest::Error,
    },

    /// IO errors while preparing the model cache directory
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// The shared model cache lock was poisoned by a panicking thread
    #[error("Model cache lock poisoned")]
    LockPoisoned,

    /// Async task join errors
    #[error("Async task failed: {source}")]
    AsyncTask {
        #[from]
        source: tokio::task::JoinError,
    },

    /// Generic errors from other libraries
    #[error("External error: {source}")]
    External {
        #[from]
        source: anyhow::Error,
    },
}

impl EmbedError {
    /// Create a model initialization error from any error type.
    pub fn model_init<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::ModelInitialization {
            source: Box::new(source),
        }
    }

    /// Create an embedding generation error from any error type.
    ///
    /// Use this for failures that happen after a provider is up and running,
    /// such as malformed responses or non-finite output values.
    pub fn embedding_gen<E>(source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::EmbeddingGeneration {
            source: source.into(),
        }
    }

    /// Create an invalid configuration error with a custom message.
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EmbedError::invalid_config("unknown model 'foo'");
        assert_eq!(
            err.to_string(),
            "Invalid embedding configuration: unknown model 'foo'"
        );

        let err = EmbedError::RemoteStatus {
            status: 503,
            body: "loading".to_string(),
        };
        assert_eq!(err.to_string(), "Embedding endpoint returned 503: loading");
    }

    #[test]
    fn test_embedding_gen_keeps_source() {
        let io = std::io::Error::other("boom");
        let err = EmbedError::embedding_gen(io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("boom"));
    }
}
