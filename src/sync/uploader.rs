//! Uploader: one artifact in, one remote write out

use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::key::{ArtifactKey, ImageExtension};
use crate::config::UploadConfig;
use crate::repository::{ContentRepository, PutRequest, RepositoryError, WriteStatus};

/// What is being uploaded under a key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Image(ImageExtension),
    Description,
}

impl ArtifactKind {
    /// Remote file name for this artifact under `key`
    pub fn file_name(&self, key: &ArtifactKey) -> String {
        match self {
            ArtifactKind::Image(extension) => key.image_file_name(*extension),
            ArtifactKind::Description => key.description_file_name(),
        }
    }
}

/// Proof of a stored artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub file_name: String,
    pub url: String,
    pub status: WriteStatus,
}

/// Why an upload was not accepted
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    /// The path already existed and the policy does not accept overwrites
    #[error("{file_name} already existed and was overwritten (HTTP {status})")]
    Overwritten {
        file_name: String,
        status: u16,
        body: String,
    },

    /// The repository call itself failed
    #[error("upload of {file_name} failed: {source}")]
    Repository {
        file_name: String,
        #[source]
        source: RepositoryError,
    },
}

impl UploadError {
    pub fn file_name(&self) -> &str {
        match self {
            UploadError::Overwritten { file_name, .. } | UploadError::Repository { file_name, .. } => {
                file_name
            }
        }
    }

    /// Only transport failures are worth another attempt
    pub fn is_retriable(&self) -> bool {
        match self {
            UploadError::Overwritten { .. } => false,
            UploadError::Repository { source, .. } => source.is_retriable(),
        }
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self, UploadError::Repository { source, .. } if source.is_auth_error())
    }

    /// The content reached the repository even though the write is reported
    /// as a non-success
    pub fn was_stored(&self) -> bool {
        matches!(self, UploadError::Overwritten { .. })
    }

    /// HTTP status the repository answered with, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Overwritten { status, .. } => Some(*status),
            UploadError::Repository { source, .. } => source.status(),
        }
    }

    /// Raw response body, if any
    pub fn body(&self) -> Option<&str> {
        match self {
            UploadError::Overwritten { body, .. } => Some(body),
            UploadError::Repository { source, .. } => source.body(),
        }
    }
}

/// Which write outcomes count as success
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Accept HTTP 200 (existing path overwritten) as well as 201
    pub accept_overwrite: bool,
}

impl From<&UploadConfig> for UploadPolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            accept_overwrite: config.accept_overwrite,
        }
    }
}

/// Writes artifacts to the content repository
///
/// Every call is exactly one remote write. Nothing is retried or remembered
/// between calls.
#[derive(Clone)]
pub struct Uploader {
    repository: Arc<dyn ContentRepository>,
    policy: UploadPolicy,
}

impl Uploader {
    pub fn new(repository: Arc<dyn ContentRepository>, policy: UploadPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> UploadPolicy {
        self.policy
    }

    /// Store `content` as the `kind` artifact of `key`
    pub async fn upload(
        &self,
        key: &ArtifactKey,
        content: &[u8],
        kind: ArtifactKind,
    ) -> Result<UploadReceipt, UploadError> {
        self.upload_with(key, content, kind, self.policy).await
    }

    /// Like [`Uploader::upload`], judging the write by `policy` instead of
    /// the uploader's own
    pub async fn upload_with(
        &self,
        key: &ArtifactKey,
        content: &[u8],
        kind: ArtifactKind,
        policy: UploadPolicy,
    ) -> Result<UploadReceipt, UploadError> {
        let file_name = kind.file_name(key);
        debug!(
            file = %file_name,
            bytes = content.len(),
            backend = self.repository.backend_name(),
            "uploading"
        );

        let response = self
            .repository
            .put_file(PutRequest::new(file_name.as_str(), content))
            .await
            .map_err(|source| {
                warn!(file = %file_name, error = %source, "upload failed");
                UploadError::Repository {
                    file_name: file_name.clone(),
                    source,
                }
            })?;

        if response.status == WriteStatus::Updated && !policy.accept_overwrite {
            warn!(file = %file_name, "existing file was overwritten");
            return Err(UploadError::Overwritten {
                file_name,
                status: response.status_code,
                body: response.body,
            });
        }

        info!(file = %file_name, status = ?response.status, "uploaded");
        Ok(UploadReceipt {
            url: self.repository.raw_url(&file_name),
            file_name,
            status: response.status,
        })
    }

    /// Upload image bytes
    pub async fn upload_image(
        &self,
        key: &ArtifactKey,
        content: &Bytes,
        extension: ImageExtension,
    ) -> Result<UploadReceipt, UploadError> {
        self.upload(key, content, ArtifactKind::Image(extension)).await
    }

    /// Upload description text as UTF-8
    pub async fn upload_description(
        &self,
        key: &ArtifactKey,
        text: &str,
    ) -> Result<UploadReceipt, UploadError> {
        self.upload(key, text.as_bytes(), ArtifactKind::Description)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use chrono::NaiveDate;

    fn key() -> ArtifactKey {
        let ts = NaiveDate::from_ymd_opt(2024, 5, 1)
            .and_then(|d| d.and_hms_opt(10, 0, 0))
            .unwrap();
        ArtifactKey::new(ts, 0)
    }

    #[tokio::test]
    async fn test_upload_image_created() {
        let repo = InMemoryRepository::new();
        let uploader = Uploader::new(Arc::new(repo.clone()), UploadPolicy::default());

        let receipt = uploader
            .upload_image(&key(), &Bytes::from_static(b"\x89PNG"), ImageExtension::Png)
            .await
            .unwrap();

        assert_eq!(receipt.file_name, "20240501_100000_0.png");
        assert_eq!(receipt.status, WriteStatus::Created);
        assert_eq!(receipt.url, "memory://20240501_100000_0.png");
        assert_eq!(repo.get("20240501_100000_0.png").unwrap().as_ref(), b"\x89PNG");
    }

    #[tokio::test]
    async fn test_overwrite_rejected_by_default() {
        let repo = InMemoryRepository::new();
        repo.insert("20240501_100000_0.txt", &b"old"[..]);
        let uploader = Uploader::new(Arc::new(repo.clone()), UploadPolicy::default());

        let err = uploader.upload_description(&key(), "new").await.unwrap_err();
        assert!(matches!(err, UploadError::Overwritten { status: 200, .. }));
        assert_eq!(err.file_name(), "20240501_100000_0.txt");
        assert!(!err.is_retriable());
        assert!(err.was_stored());
        // the write still happened remotely
        assert_eq!(repo.get("20240501_100000_0.txt").unwrap().as_ref(), b"new");
    }

    #[tokio::test]
    async fn test_overwrite_accepted_by_policy() {
        let repo = InMemoryRepository::new();
        repo.insert("20240501_100000_0.txt", &b"old"[..]);
        let uploader = Uploader::new(
            Arc::new(repo),
            UploadPolicy {
                accept_overwrite: true,
            },
        );

        let receipt = uploader.upload_description(&key(), "new").await.unwrap();
        assert_eq!(receipt.status, WriteStatus::Updated);
    }

    #[tokio::test]
    async fn test_repository_failure_carries_status_and_body() {
        let repo = InMemoryRepository::new();
        repo.fail_put(
            "20240501_100000_0.jpg",
            RepositoryError::from_status("memory", "put_file", 422, "invalid".to_string()),
        );
        let uploader = Uploader::new(Arc::new(repo), UploadPolicy::default());

        let err = uploader
            .upload(&key(), b"x", ArtifactKind::Image(ImageExtension::Jpg))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert_eq!(err.body(), Some("invalid"));
        assert!(!err.is_auth_error());
        assert!(!err.was_stored());
    }

    #[tokio::test]
    async fn test_policy_override_for_one_call() {
        let repo = InMemoryRepository::new();
        repo.insert("20240501_100000_0.jpg", &b"old"[..]);
        let uploader = Uploader::new(Arc::new(repo.clone()), UploadPolicy::default());
        let lenient = UploadPolicy {
            accept_overwrite: true,
        };

        let receipt = uploader
            .upload_with(&key(), b"new", ArtifactKind::Image(ImageExtension::Jpg), lenient)
            .await
            .unwrap();
        assert_eq!(receipt.status, WriteStatus::Updated);
        assert_eq!(uploader.policy(), UploadPolicy::default());
    }
}
