/*!
 * gitgallery - image and description sync for GitHub-style content repositories
 *
 * Images and optional text descriptions are stored as plain files in one
 * repository directory, linked only by a shared file-name prefix:
 * - `{timestamp}_{index}.jpg` holds the image
 * - `{timestamp}_{index}.txt` holds its description
 *
 * The repository offers nothing but create/overwrite-file, list-directory and
 * fetch-raw-file, so pairing, ordering and failure handling all live here.
 */

pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod sync;

// Re-export commonly used types
pub use config::{BatchMode, GalleryConfig, RepositoryConfig};
pub use error::{GalleryError, Result};
pub use repository::{ContentRepository, GitHubRepository, InMemoryRepository};
pub use sync::{
    ArtifactKey, BatchReport, CatalogEntry, Gallery, ItemState, OrphanReport, SubmitItem,
    UploadError, UploadOutcome,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
