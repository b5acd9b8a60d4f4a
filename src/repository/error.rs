//! Error types for content repository operations
//!
//! Every remote call made through [`ContentRepository`](super::ContentRepository)
//! reports failures with [`RepositoryError`]. The variants separate transient
//! transport trouble (worth retrying) from definitive answers given by the
//! repository itself (bad credentials, rejected writes, malformed responses).

use thiserror::Error;

/// Result type alias for repository operations
pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

/// Unified error type for repository operations
#[derive(Debug, Clone, Error)]
pub enum RepositoryError {
    /// The request never produced an HTTP response (DNS, connect, reset, ...)
    #[error("Connection to {backend} ({endpoint}) failed: {message}")]
    Transport {
        backend: String,
        endpoint: String,
        message: String,
    },

    /// The request did not complete within the configured timeout
    #[error("Operation '{operation}' timed out after {duration_secs} seconds")]
    Timeout {
        operation: String,
        duration_secs: u64,
    },

    /// The repository refused the credentials (HTTP 401/403)
    #[error("Authentication failed for {backend} (HTTP {status}): {body}")]
    Authentication {
        backend: String,
        status: u16,
        body: String,
    },

    /// The repository answered with a status the operation does not accept
    #[error("{backend} rejected '{operation}' with HTTP {status}: {body}")]
    Rejected {
        backend: String,
        operation: String,
        status: u16,
        body: String,
    },

    /// A response body could not be decoded
    #[error("Failed to decode {backend} response: {message}")]
    Decode { backend: String, message: String },

    /// Invalid configuration for the repository client
    #[error("Invalid configuration for {backend}: {message}")]
    InvalidConfig { backend: String, message: String },
}

impl RepositoryError {
    /// Check if this error is retriable (transient)
    pub fn is_retriable(&self) -> bool {
        match self {
            RepositoryError::Transport { .. } => true,
            RepositoryError::Timeout { .. } => true,

            RepositoryError::Authentication { .. } => false,
            RepositoryError::Rejected { .. } => false,
            RepositoryError::Decode { .. } => false,
            RepositoryError::InvalidConfig { .. } => false,
        }
    }

    /// Check if this error is a credential rejection
    pub fn is_auth_error(&self) -> bool {
        matches!(self, RepositoryError::Authentication { .. })
    }

    /// HTTP status returned by the repository, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            RepositoryError::Authentication { status, .. }
            | RepositoryError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Raw response body returned by the repository, if one was received
    pub fn body(&self) -> Option<&str> {
        match self {
            RepositoryError::Authentication { body, .. }
            | RepositoryError::Rejected { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Build the error matching a non-success HTTP status
    pub fn from_status(backend: &str, operation: &str, status: u16, body: String) -> Self {
        match status {
            401 | 403 => RepositoryError::Authentication {
                backend: backend.to_string(),
                status,
                body,
            },
            _ => RepositoryError::Rejected {
                backend: backend.to_string(),
                operation: operation.to_string(),
                status,
                body,
            },
        }
    }
}
