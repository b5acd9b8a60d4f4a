//! Content repository abstraction
//!
//! The remote store behind the gallery is a flat, version-controlled file
//! directory that offers exactly three operations: create-or-overwrite a file,
//! list the directory, and fetch a file's raw bytes. There are no transactions
//! and no multi-file commits, so every higher-level guarantee has to be built
//! from these independent calls.
//!
//! # Implementations
//!
//! - [`GitHubRepository`]: the GitHub contents API plus the public raw-content host
//! - [`InMemoryRepository`]: in-process store with upsert semantics and failure
//!   injection, for tests and offline runs
//!
//! # Example
//!
//! ```no_run
//! use gitgallery::config::GalleryConfig;
//! use gitgallery::repository::{ContentRepository, GitHubRepository};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GalleryConfig::load(None, Default::default())?;
//!     let repository = GitHubRepository::new(&config.repository)?;
//!
//!     for entry in repository.list_dir().await? {
//!         println!("{} -> {}", entry.name, repository.raw_url(&entry.name));
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod types;

mod github;
mod memory;

pub use error::{RepositoryError, RepositoryResult};
pub use github::GitHubRepository;
pub use memory::{InMemoryRepository, WriteRecord};
pub use types::{DirEntry, PutRequest, PutResponse, WriteStatus};

use async_trait::async_trait;
use bytes::Bytes;

/// Flat file store addressed by file name within one configured directory
///
/// All names are relative to the directory the implementation was configured
/// with; callers never see repository, branch or directory coordinates.
///
/// # Thread Safety
///
/// Implementors must be `Send + Sync` so one instance can be shared behind an
/// `Arc` by the uploader and the catalog reader.
#[async_trait]
pub trait ContentRepository: Send + Sync {
    /// Create or overwrite a file
    ///
    /// # Returns
    ///
    /// The write status (created vs. updated) together with the raw response body
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Authentication` if the credentials are refused.
    /// Returns `RepositoryError::Rejected` for any other non-success status.
    /// Returns `RepositoryError::Timeout` / `Transport` if no response arrived.
    async fn put_file(&self, request: PutRequest) -> RepositoryResult<PutResponse>;

    /// List the configured directory in the order the repository reports it
    ///
    /// A single request is issued; no pagination is performed.
    async fn list_dir(&self) -> RepositoryResult<Vec<DirEntry>>;

    /// Fetch a file's raw bytes
    ///
    /// Returns `Ok(None)` when the file does not exist (HTTP 404).
    async fn fetch_raw(&self, file_name: &str) -> RepositoryResult<Option<Bytes>>;

    /// Public URL under which `file_name` can be fetched
    fn raw_url(&self, file_name: &str) -> String;

    /// String identifier for this backend (e.g. "github", "memory")
    fn backend_name(&self) -> &str;
}
