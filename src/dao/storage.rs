use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by persistence backends regardless of the underlying transport.
///
/// None of these are fatal: callers fall back to the next adapter in priority
/// order and keep serving the operator from local state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The transport could not be reached at all (connection refused, timeout).
    #[error("transport unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the failed call.
        message: String,
        /// Underlying transport failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// The backend answered with a non-success status.
    #[error("{backend} rejected the request with status {status}")]
    Rejected {
        /// Name of the backend that rejected the call.
        backend: &'static str,
        /// HTTP status (or equivalent) returned by the backend.
        status: u16,
    },
    /// A persisted document could not be decoded.
    #[error("malformed document: {message}")]
    Corrupt {
        /// Which document failed to decode.
        message: String,
        /// Underlying decode failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

impl StorageError {
    /// Construct an unavailable error from any transport failure.
    pub fn unavailable(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Construct a corrupt-document error from a decode failure.
    pub fn corrupt(message: impl Into<String>, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Corrupt {
            message: message.into(),
            source: Box::new(source),
        }
    }

    /// Whether this error means the persisted bytes were unreadable rather
    /// than the transport being down.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, StorageError::Corrupt { .. })
    }
}
