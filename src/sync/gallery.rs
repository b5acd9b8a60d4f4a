//! Caller-facing gallery operations
//!
//! [`Gallery`] ties the uploader, the catalog reader and the key clock
//! together. Submissions run as a strictly ordered pipeline: item `i` gets key
//! `{timestamp}_{i}`, its image is written, then (only if the image was
//! stored) its description. An image that replaced an existing file always
//! gets its description rewritten, with empty text if none was given, so a
//! stale description never stays paired with it. Nothing is rolled back;
//! whatever was written stays written.

use std::collections::HashSet;
use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::catalog::{CatalogReader, ImageRef};
use super::clock::{Clock, SystemClock};
use super::key::{base_name, is_description_name, is_image_name, ArtifactKey, ImageExtension};
use super::retry::RetryPolicy;
use super::uploader::{ArtifactKind, UploadError, UploadPolicy, UploadReceipt, Uploader};
use crate::config::{BatchMode, GalleryConfig};
use crate::error::Result;
use crate::repository::{ContentRepository, GitHubRepository, RepositoryResult, WriteStatus};

/// One image to submit, with optional description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitItem {
    pub bytes: Bytes,
    pub description: Option<String>,

    /// Original file name; only its extension is used
    pub file_name: Option<String>,
}

impl SubmitItem {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }

    /// Description text, if any non-whitespace text was given
    pub fn description_text(&self) -> Option<&str> {
        self.description
            .as_deref()
            .filter(|text| !text.trim().is_empty())
    }
}

/// State of one submission after the pipeline ran
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    /// Image stored, and the description too if one was given
    Completed,
    /// Image not stored; no description was attempted
    Failed,
    /// Image stored but the description was not
    DescriptionFailed,
    /// Everything was stored, but an existing file was replaced
    Overwritten,
    /// Not attempted because an earlier item aborted the batch
    Skipped,
}

/// Result of submitting one image
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub key: ArtifactKey,
    pub image: std::result::Result<UploadReceipt, UploadError>,

    /// `None` when the image was not stored, or no description was given and
    /// nothing needed clearing
    pub description: Option<std::result::Result<UploadReceipt, UploadError>>,
}

impl UploadOutcome {
    pub fn state(&self) -> ItemState {
        if !self.image_stored() {
            return ItemState::Failed;
        }
        match self.description_error() {
            Some(e) if !e.was_stored() => ItemState::DescriptionFailed,
            Some(_) => ItemState::Overwritten,
            None if self.image.is_err() => ItemState::Overwritten,
            None => ItemState::Completed,
        }
    }

    /// The image bytes reached the repository
    pub fn image_stored(&self) -> bool {
        self.image.as_ref().map_or_else(UploadError::was_stored, |_| true)
    }

    pub fn is_success(&self) -> bool {
        self.state() == ItemState::Completed
    }

    /// Most severe error of this submission: a write that did not land
    /// comes before an overwrite, the image before the description
    pub fn error(&self) -> Option<&UploadError> {
        [self.image.as_ref().err(), self.description_error()]
            .into_iter()
            .flatten()
            .min_by_key(|e| e.was_stored())
    }

    fn description_error(&self) -> Option<&UploadError> {
        self.description.as_ref().and_then(|d| d.as_ref().err())
    }
}

/// One position in a batch
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub index: usize,

    /// `None` when the item was skipped
    pub outcome: Option<UploadOutcome>,
}

impl BatchItem {
    pub fn state(&self) -> ItemState {
        self.outcome
            .as_ref()
            .map_or(ItemState::Skipped, UploadOutcome::state)
    }
}

/// Ordered record of a batch submission
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub items: Vec<BatchItem>,
}

impl BatchReport {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn count(&self, state: ItemState) -> usize {
        self.items.iter().filter(|item| item.state() == state).count()
    }

    /// Every item completed
    pub fn is_success(&self) -> bool {
        self.items
            .iter()
            .all(|item| item.state() == ItemState::Completed)
    }

    /// Earliest error in batch order
    pub fn first_failure(&self) -> Option<&UploadError> {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref())
            .find_map(UploadOutcome::error)
    }

    /// Any credential rejection in the batch
    pub fn has_auth_failure(&self) -> bool {
        self.items
            .iter()
            .filter_map(|item| item.outcome.as_ref())
            .filter_map(UploadOutcome::error)
            .any(UploadError::is_auth_error)
    }
}

/// A browsed image with its description, if one could be fetched
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    #[serde(flatten)]
    pub image: ImageRef,
    pub description: Option<String>,
}

/// Files whose partner is missing from the listing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OrphanReport {
    /// Description files with no image of the same base name
    pub orphaned_descriptions: Vec<String>,

    /// Images with no description file
    pub undescribed_images: Vec<String>,
}

impl OrphanReport {
    /// No orphaned descriptions were found
    pub fn is_clean(&self) -> bool {
        self.orphaned_descriptions.is_empty()
    }
}

/// Submit and browse images with descriptions
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use gitgallery::repository::InMemoryRepository;
/// use gitgallery::sync::{Gallery, SubmitItem};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let gallery = Gallery::new(Arc::new(InMemoryRepository::new()));
///
/// let outcome = gallery
///     .submit_item(SubmitItem::new(&b"\xff\xd8"[..]).with_description("first light"))
///     .await;
/// assert!(outcome.is_success());
///
/// let entries = gallery.browse().await.unwrap();
/// assert_eq!(entries[0].description.as_deref(), Some("first light"));
/// # }
/// ```
pub struct Gallery {
    uploader: Uploader,
    catalog: CatalogReader,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    batch_mode: BatchMode,
}

impl Gallery {
    /// Gallery over `repository` with the system clock and default policies
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self {
            uploader: Uploader::new(Arc::clone(&repository), UploadPolicy::default()),
            catalog: CatalogReader::new(repository),
            clock: Arc::new(SystemClock),
            retry: RetryPolicy::none(),
            batch_mode: BatchMode::default(),
        }
    }

    /// Gallery backed by GitHub, with policies taken from `config`
    pub fn from_config(config: &GalleryConfig) -> Result<Self> {
        let repository: Arc<dyn ContentRepository> =
            Arc::new(GitHubRepository::new(&config.repository)?);

        Ok(Self::new(repository)
            .with_upload_policy(UploadPolicy::from(&config.upload))
            .with_batch_mode(config.upload.batch_mode)
            .with_retry(RetryPolicy::from_config(&config.retry)))
    }

    pub fn with_clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_upload_policy(mut self, policy: UploadPolicy) -> Self {
        self.uploader = Uploader::new(self.uploader_repository(), policy);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_batch_mode(mut self, batch_mode: BatchMode) -> Self {
        self.batch_mode = batch_mode;
        self
    }

    fn uploader_repository(&self) -> Arc<dyn ContentRepository> {
        self.catalog.repository()
    }

    /// Submit a single image, optionally with a description
    pub async fn submit(&self, bytes: impl Into<Bytes>, description: Option<&str>) -> UploadOutcome {
        let mut item = SubmitItem::new(bytes);
        item.description = description.map(str::to_string);
        self.submit_item(item).await
    }

    /// Submit a single prepared item under index 0
    pub async fn submit_item(&self, item: SubmitItem) -> UploadOutcome {
        let key = ArtifactKey::new(self.clock.now(), 0);
        self.submit_at(key, &item).await
    }

    /// Submit items in order; item `i` is stored under `{timestamp}_{i}`
    pub async fn submit_batch(&self, items: Vec<SubmitItem>) -> BatchReport {
        let total = items.len();
        let mut report = BatchReport {
            items: Vec::with_capacity(total),
        };
        let mut aborted = false;

        for (index, item) in items.into_iter().enumerate() {
            if aborted {
                report.items.push(BatchItem {
                    index,
                    outcome: None,
                });
                continue;
            }

            let key = ArtifactKey::new(self.clock.now(), index);
            let outcome = self.submit_at(key, &item).await;

            if outcome.state() == ItemState::Failed && self.batch_mode == BatchMode::Abort {
                warn!(index, total, "image not stored; aborting remaining items");
                aborted = true;
            }

            report.items.push(BatchItem {
                index,
                outcome: Some(outcome),
            });
        }

        info!(
            total,
            completed = report.count(ItemState::Completed),
            failed = report.count(ItemState::Failed),
            description_failed = report.count(ItemState::DescriptionFailed),
            overwritten = report.count(ItemState::Overwritten),
            skipped = report.count(ItemState::Skipped),
            "batch finished"
        );
        report
    }

    /// All images with their descriptions, in repository order
    ///
    /// Descriptions are fetched one at a time; a failed fetch only leaves that
    /// entry without a description. A failed listing is returned as an error.
    pub async fn browse(&self) -> RepositoryResult<Vec<CatalogEntry>> {
        let images = self.catalog.list().await?;
        let mut entries = Vec::with_capacity(images.len());

        for image in images {
            let description = self.catalog.fetch_description(&image).await;
            entries.push(CatalogEntry { image, description });
        }

        Ok(entries)
    }

    /// Find descriptions without images and images without descriptions
    ///
    /// Read-only: works from the directory listing alone and repairs nothing.
    pub async fn orphans(&self) -> RepositoryResult<OrphanReport> {
        let entries = self.catalog.list_entries().await?;

        let image_keys: HashSet<&str> = entries
            .iter()
            .filter(|e| is_image_name(&e.name))
            .map(|e| base_name(&e.name))
            .collect();
        let description_keys: HashSet<&str> = entries
            .iter()
            .filter(|e| is_description_name(&e.name))
            .map(|e| base_name(&e.name))
            .collect();

        let report = OrphanReport {
            orphaned_descriptions: entries
                .iter()
                .filter(|e| is_description_name(&e.name))
                .filter(|e| !image_keys.contains(base_name(&e.name)))
                .map(|e| e.name.clone())
                .collect(),
            undescribed_images: entries
                .iter()
                .filter(|e| is_image_name(&e.name))
                .filter(|e| !description_keys.contains(base_name(&e.name)))
                .map(|e| e.name.clone())
                .collect(),
        };

        if !report.is_clean() {
            warn!(
                orphans = report.orphaned_descriptions.len(),
                "descriptions without a matching image"
            );
        }
        Ok(report)
    }

    async fn submit_at(&self, key: ArtifactKey, item: &SubmitItem) -> UploadOutcome {
        let extension = ImageExtension::for_upload(item.file_name.as_deref());
        let image = self
            .upload(&key, &item.bytes, ArtifactKind::Image(extension))
            .await;

        let replaced = match &image {
            Ok(receipt) => receipt.status == WriteStatus::Updated,
            Err(e) => e.was_stored(),
        };

        let description = match (&image, item.description_text()) {
            (Err(e), Some(_)) if !e.was_stored() => {
                debug!(key = %key, "image not stored; description skipped");
                None
            }
            (_, Some(text)) => Some(
                self.upload(&key, text.as_bytes(), ArtifactKind::Description)
                    .await,
            ),
            (_, None) if replaced => {
                debug!(key = %key, "image replaced; clearing its description");
                Some(self.upload(&key, &[], ArtifactKind::Description).await)
            }
            (_, None) => None,
        };

        UploadOutcome {
            key,
            image,
            description,
        }
    }

    async fn upload(
        &self,
        key: &ArtifactKey,
        content: &[u8],
        kind: ArtifactKind,
    ) -> std::result::Result<UploadReceipt, UploadError> {
        let uploader = &self.uploader;
        let mut first_attempt = true;
        self.retry
            .run(move || {
                // A retry follows a timeout or dropped connection, after which
                // the previous attempt may already have created the file
                let policy = if first_attempt {
                    uploader.policy()
                } else {
                    UploadPolicy {
                        accept_overwrite: true,
                    }
                };
                first_attempt = false;
                uploader.upload_with(key, content, kind, policy)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryRepository;
    use crate::sync::FixedClock;
    use chrono::NaiveDate;

    fn gallery(repo: &InMemoryRepository) -> Gallery {
        let instant = NaiveDate::from_ymd_opt(2024, 6, 1)
            .and_then(|d| d.and_hms_opt(8, 30, 0))
            .unwrap();
        Gallery::new(Arc::new(repo.clone())).with_clock(FixedClock(instant))
    }

    #[tokio::test]
    async fn test_submit_with_description() {
        let repo = InMemoryRepository::new();
        let outcome = gallery(&repo).submit(&b"img"[..], Some("hello")).await;

        assert_eq!(outcome.key.as_str(), "20240601_083000_0");
        assert_eq!(outcome.state(), ItemState::Completed);
        assert_eq!(repo.file_names(), vec!["20240601_083000_0.jpg", "20240601_083000_0.txt"]);
    }

    #[tokio::test]
    async fn test_blank_description_not_uploaded() {
        let repo = InMemoryRepository::new();
        let outcome = gallery(&repo).submit(&b"img"[..], Some("  \n")).await;

        assert!(outcome.description.is_none());
        assert_eq!(repo.file_names(), vec!["20240601_083000_0.jpg"]);
    }

    #[tokio::test]
    async fn test_description_skipped_when_image_fails() {
        let repo = InMemoryRepository::new();
        repo.fail_put(
            "20240601_083000_0.jpg",
            crate::repository::RepositoryError::from_status("memory", "put_file", 500, String::new()),
        );
        let outcome = gallery(&repo).submit(&b"img"[..], Some("caption")).await;

        assert_eq!(outcome.state(), ItemState::Failed);
        assert!(outcome.description.is_none());
        assert!(repo.file_names().is_empty());
    }

    #[tokio::test]
    async fn test_overwritten_image_still_gets_description() {
        let repo = InMemoryRepository::new();
        repo.insert("20240601_083000_0.jpg", &b"old"[..]);
        repo.insert("20240601_083000_0.txt", &b"old caption"[..]);

        let outcome = gallery(&repo).submit(&b"new"[..], Some("new caption")).await;

        assert_eq!(outcome.state(), ItemState::Overwritten);
        assert!(outcome.image_stored());
        assert!(!outcome.is_success());
        assert_eq!(outcome.error().unwrap().file_name(), "20240601_083000_0.jpg");
        assert_eq!(repo.get("20240601_083000_0.txt").unwrap().as_ref(), b"new caption");
    }

    #[tokio::test]
    async fn test_description_failure_outranks_overwrite() {
        let repo = InMemoryRepository::new();
        repo.insert("20240601_083000_0.jpg", &b"old"[..]);
        repo.fail_put(
            "20240601_083000_0.txt",
            crate::repository::RepositoryError::from_status("memory", "put_file", 409, String::new()),
        );

        let outcome = gallery(&repo).submit(&b"new"[..], Some("caption")).await;

        assert_eq!(outcome.state(), ItemState::DescriptionFailed);
        assert_eq!(outcome.error().unwrap().status(), Some(409));
    }

    #[tokio::test]
    async fn test_original_extension_kept() {
        let repo = InMemoryRepository::new();
        let item = SubmitItem::new(&b"png"[..]).with_file_name("Screenshot.PNG");
        gallery(&repo).submit_item(item).await;

        assert!(repo.contains("20240601_083000_0.png"));
    }

    #[tokio::test]
    async fn test_orphans() {
        let repo = InMemoryRepository::new();
        repo.insert("a.jpg", &b"a"[..]);
        repo.insert("a.txt", &b"a"[..]);
        repo.insert("b.png", &b"b"[..]);
        repo.insert("c.txt", &b"c"[..]);
        repo.insert("notes.md", &b"n"[..]);

        let report = gallery(&repo).orphans().await.unwrap();
        assert_eq!(report.orphaned_descriptions, vec!["c.txt"]);
        assert_eq!(report.undescribed_images, vec!["b.png"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_catalog_entry_json() {
        let entry = CatalogEntry {
            image: ImageRef {
                name: "a.jpg".into(),
                url: "memory://a.jpg".into(),
            },
            description: None,
        };
        assert_eq!(
            serde_json::to_string(&entry).unwrap(),
            r#"{"name":"a.jpg","url":"memory://a.jpg","description":null}"#
        );
    }
}
