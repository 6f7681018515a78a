use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
///
/// This is the only failure class that crosses the question-load, submission
/// and leaderboard boundaries; callers turn it into a message or a flag.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend was reached but the operation failed.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Human readable description of the failure.
        message: String,
        /// Backend specific error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// No backend is installed (degraded mode).
    #[error("storage unavailable (degraded mode)")]
    Missing,
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }
}
