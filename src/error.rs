/*!
 * Error types for gitgallery
 */

use std::fmt;
use std::io;

use thiserror::Error;

use crate::repository::RepositoryError;
use crate::sync::UploadError;

pub type Result<T> = std::result::Result<T, GalleryError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PARTIAL: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum GalleryError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local I/O error (reading images, config files, log files)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Listing or fetching from the content repository failed
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// An upload was not accepted
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),
}

impl GalleryError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self.category() {
            ErrorCategory::Configuration | ErrorCategory::Auth => EXIT_FATAL,
            _ => EXIT_PARTIAL,
        }
    }

    /// Check if retrying the same operation could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            GalleryError::Repository(e) => e.is_retriable(),
            GalleryError::Upload(e) => e.is_retriable(),
            GalleryError::Config(_) | GalleryError::Io(_) => false,
        }
    }

    /// Get error category for logging and reporting
    pub fn category(&self) -> ErrorCategory {
        match self {
            GalleryError::Config(_) => ErrorCategory::Configuration,
            GalleryError::Io(_) => ErrorCategory::Io,
            GalleryError::Repository(e) => ErrorCategory::of_repository(e),
            GalleryError::Upload(UploadError::Overwritten { .. }) => ErrorCategory::RemoteRejection,
            GalleryError::Upload(UploadError::Repository { source, .. }) => {
                ErrorCategory::of_repository(source)
            }
        }
    }
}

/// Coarse classification shared by every error the crate reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Network failure or timeout; no definitive answer from the repository
    Transport,
    /// Credentials rejected
    Auth,
    /// The repository answered with an unacceptable status
    RemoteRejection,
    /// Unreadable response
    Protocol,
    /// Local configuration problem
    Configuration,
    /// Local I/O
    Io,
}

impl ErrorCategory {
    /// Classify a repository error
    pub fn of_repository(err: &RepositoryError) -> Self {
        match err {
            RepositoryError::Transport { .. } | RepositoryError::Timeout { .. } => {
                ErrorCategory::Transport
            }
            RepositoryError::Authentication { .. } => ErrorCategory::Auth,
            RepositoryError::Rejected { .. } => ErrorCategory::RemoteRejection,
            RepositoryError::Decode { .. } => ErrorCategory::Protocol,
            RepositoryError::InvalidConfig { .. } => ErrorCategory::Configuration,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Transport => "transport",
            ErrorCategory::Auth => "auth",
            ErrorCategory::RemoteRejection => "remote-rejection",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Io => "io",
        };
        f.write_str(name)
    }
}
