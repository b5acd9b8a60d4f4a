//! Catalog reader: lists stored images and re-pairs them with descriptions

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::key::{base_name, is_image_name, DESCRIPTION_EXTENSION};
use crate::repository::{ContentRepository, DirEntry, RepositoryResult};

/// A stored image as seen in a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
    pub name: String,
    pub url: String,
}

impl ImageRef {
    /// Name of the description file paired with this image
    pub fn description_file_name(&self) -> String {
        format!("{}.{}", base_name(&self.name), DESCRIPTION_EXTENSION)
    }
}

/// Read side of the gallery
#[derive(Clone)]
pub struct CatalogReader {
    repository: Arc<dyn ContentRepository>,
}

impl CatalogReader {
    pub fn new(repository: Arc<dyn ContentRepository>) -> Self {
        Self { repository }
    }

    pub(crate) fn repository(&self) -> Arc<dyn ContentRepository> {
        Arc::clone(&self.repository)
    }

    /// Every file in the content directory, in repository order
    pub async fn list_entries(&self) -> RepositoryResult<Vec<DirEntry>> {
        let entries = self.repository.list_dir().await?;
        Ok(entries.into_iter().filter(DirEntry::is_file).collect())
    }

    /// Images in the content directory, in repository order
    pub async fn list(&self) -> RepositoryResult<Vec<ImageRef>> {
        let entries = self.list_entries().await?;
        let images: Vec<ImageRef> = entries
            .into_iter()
            .filter(|entry| is_image_name(&entry.name))
            .map(|entry| ImageRef {
                url: self.repository.raw_url(&entry.name),
                name: entry.name,
            })
            .collect();

        debug!(images = images.len(), "listed catalog");
        Ok(images)
    }

    /// Description text for `image`, trimmed
    ///
    /// Invalid UTF-8 is replaced rather than rejected. A missing or blank
    /// file, or any fetch failure, yields `None` and never affects other
    /// images.
    pub async fn fetch_description(&self, image: &ImageRef) -> Option<String> {
        let file_name = image.description_file_name();
        match self.repository.fetch_raw(&file_name).await {
            Ok(Some(bytes)) => {
                let text = String::from_utf8_lossy(&bytes);
                Some(text.trim().to_string()).filter(|text| !text.is_empty())
            }
            Ok(None) => None,
            Err(e) => {
                debug!(file = %file_name, error = %e, "description fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{InMemoryRepository, RepositoryError};

    fn reader(repo: &InMemoryRepository) -> CatalogReader {
        CatalogReader::new(Arc::new(repo.clone()))
    }

    #[tokio::test]
    async fn test_list_filters_images() {
        let repo = InMemoryRepository::new();
        repo.insert("a.JPG", &b"a"[..]);
        repo.insert("a.txt", &b"desc"[..]);
        repo.insert("b.gif", &b"b"[..]);
        repo.insert("c.png", &b"c"[..]);

        let names: Vec<String> = reader(&repo).list().await.unwrap().into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["a.JPG", "c.png"]);
    }

    #[tokio::test]
    async fn test_description_is_trimmed() {
        let repo = InMemoryRepository::new();
        repo.insert("a.jpg", &b"a"[..]);
        repo.insert("a.txt", &b"  sunset over the bay \n"[..]);

        let reader = reader(&repo);
        let images = reader.list().await.unwrap();
        assert_eq!(
            reader.fetch_description(&images[0]).await.as_deref(),
            Some("sunset over the bay")
        );
    }

    #[tokio::test]
    async fn test_description_failure_is_none() {
        let repo = InMemoryRepository::new();
        repo.insert("a.jpg", &b"a"[..]);
        repo.insert("b.jpg", &b"b"[..]);
        repo.insert("a.txt", &b"x"[..]);
        repo.fail_fetch(
            "a.txt",
            RepositoryError::Transport {
                backend: "memory".into(),
                endpoint: "memory".into(),
                message: "reset".into(),
            },
        );
        repo.insert("c.jpg", &b"c"[..]);
        repo.insert("c.txt", &b" \n"[..]);

        let reader = reader(&repo);
        for image in reader.list().await.unwrap() {
            assert_eq!(reader.fetch_description(&image).await, None, "{}", image.name);
        }
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let repo = InMemoryRepository::new();
        repo.insert("a.jpg", &b"a"[..]);
        repo.insert("a.txt", &b"caf\xe9 au lait"[..]);

        let reader = reader(&repo);
        let images = reader.list().await.unwrap();
        assert_eq!(
            reader.fetch_description(&images[0]).await.as_deref(),
            Some("caf\u{fffd} au lait")
        );
    }

    #[tokio::test]
    async fn test_list_failure_propagates() {
        let repo = InMemoryRepository::new();
        repo.fail_list(RepositoryError::from_status("memory", "list_dir", 404, String::new()));
        assert!(reader(&repo).list().await.is_err());
    }
}
