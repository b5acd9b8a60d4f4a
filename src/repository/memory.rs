//! In-memory repository implementation
//!
//! Behaves like the GitHub contents API as far as the sync protocol can tell:
//! writes upsert (201 for a new path, 200 for an existing one), payloads arrive
//! base64-encoded and are decoded before storing, and listings come back
//! sorted by name. Failures can be injected per file name to exercise error
//! paths without a network.

use super::error::{RepositoryError, RepositoryResult};
use super::types::{DirEntry, PutRequest, PutResponse, WriteStatus};
use super::ContentRepository;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

const BACKEND: &str = "memory";

/// One accepted write, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub file_name: String,
    pub message: String,
    pub status: WriteStatus,
}

#[derive(Debug, Default)]
struct MemoryState {
    files: BTreeMap<String, Bytes>,
    writes: Vec<WriteRecord>,
    put_failures: HashMap<String, RepositoryError>,
    fetch_failures: HashMap<String, RepositoryError>,
    list_failure: Option<RepositoryError>,
    fetch_count: usize,
}

/// In-memory content repository
///
/// Cloning yields a handle to the same store, so a test can keep one clone for
/// assertions while the gallery owns another.
///
/// # Example
///
/// ```rust
/// use gitgallery::repository::{ContentRepository, InMemoryRepository, PutRequest, WriteStatus};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let repository = InMemoryRepository::new();
/// let first = repository.put_file(PutRequest::new("a.txt", b"one")).await.unwrap();
/// let second = repository.put_file(PutRequest::new("a.txt", b"two")).await.unwrap();
///
/// assert_eq!(first.status, WriteStatus::Created);
/// assert_eq!(second.status, WriteStatus::Updated);
/// assert_eq!(repository.get("a.txt").unwrap().as_ref(), b"two");
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file directly, bypassing the write path
    pub fn insert(&self, file_name: impl Into<String>, content: impl Into<Bytes>) {
        self.write().files.insert(file_name.into(), content.into());
    }

    /// Current content of a file
    pub fn get(&self, file_name: &str) -> Option<Bytes> {
        self.read().files.get(file_name).cloned()
    }

    /// Check whether a file exists
    pub fn contains(&self, file_name: &str) -> bool {
        self.read().files.contains_key(file_name)
    }

    /// All file names, sorted
    pub fn file_names(&self) -> Vec<String> {
        self.read().files.keys().cloned().collect()
    }

    /// Accepted writes in order
    pub fn writes(&self) -> Vec<WriteRecord> {
        self.read().writes.clone()
    }

    /// Number of raw fetches served (including failed ones)
    pub fn fetch_count(&self) -> usize {
        self.read().fetch_count
    }

    /// Make every write to `file_name` fail with `error`
    pub fn fail_put(&self, file_name: impl Into<String>, error: RepositoryError) {
        self.write().put_failures.insert(file_name.into(), error);
    }

    /// Make every raw fetch of `file_name` fail with `error`
    pub fn fail_fetch(&self, file_name: impl Into<String>, error: RepositoryError) {
        self.write().fetch_failures.insert(file_name.into(), error);
    }

    /// Make directory listings fail with `error`
    pub fn fail_list(&self, error: RepositoryError) {
        self.write().list_failure = Some(error);
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        let mut state = self.write();
        state.put_failures.clear();
        state.fetch_failures.clear();
        state.list_failure = None;
    }

    fn read(&self) -> RwLockReadGuard<'_, MemoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MemoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ContentRepository for InMemoryRepository {
    async fn put_file(&self, request: PutRequest) -> RepositoryResult<PutResponse> {
        let mut state = self.write();

        if let Some(error) = state.put_failures.get(&request.file_name) {
            return Err(error.clone());
        }

        let content = request.decode_content().map_err(|e| RepositoryError::Rejected {
            backend: BACKEND.to_string(),
            operation: "put_file".to_string(),
            status: 422,
            body: format!(r#"{{"message":"content is not valid Base64: {}"}}"#, e),
        })?;

        let status = if state.files.contains_key(&request.file_name) {
            WriteStatus::Updated
        } else {
            WriteStatus::Created
        };

        let body = serde_json::json!({
            "content": {
                "name": request.file_name,
                "size": content.len(),
                "type": "file",
            },
            "commit": { "message": request.message },
        })
        .to_string();

        state
            .files
            .insert(request.file_name.clone(), Bytes::from(content));
        state.writes.push(WriteRecord {
            file_name: request.file_name,
            message: request.message,
            status,
        });

        Ok(PutResponse::new(status, body))
    }

    async fn list_dir(&self) -> RepositoryResult<Vec<DirEntry>> {
        let state = self.read();

        if let Some(error) = &state.list_failure {
            return Err(error.clone());
        }

        Ok(state
            .files
            .iter()
            .map(|(name, content)| DirEntry::file(name.clone()).with_size(content.len() as u64))
            .collect())
    }

    async fn fetch_raw(&self, file_name: &str) -> RepositoryResult<Option<Bytes>> {
        let mut state = self.write();
        state.fetch_count += 1;

        if let Some(error) = state.fetch_failures.get(file_name) {
            return Err(error.clone());
        }

        Ok(state.files.get(file_name).cloned())
    }

    fn raw_url(&self, file_name: &str) -> String {
        format!("memory://{}", file_name)
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_then_fetch_returns_original_bytes() {
        let repository = InMemoryRepository::new();
        let payload: Vec<u8> = (0..=255u8).collect();

        let response = repository
            .put_file(PutRequest::new("all-bytes.jpg", &payload))
            .await
            .unwrap();
        assert_eq!(response.status, WriteStatus::Created);
        assert_eq!(response.status_code, 201);

        let fetched = repository.fetch_raw("all-bytes.jpg").await.unwrap().unwrap();
        assert_eq!(fetched.as_ref(), payload.as_slice());
    }

    #[tokio::test]
    async fn test_second_write_is_an_update() {
        let repository = InMemoryRepository::new();
        repository.put_file(PutRequest::new("a.jpg", b"1")).await.unwrap();
        let second = repository.put_file(PutRequest::new("a.jpg", b"2")).await.unwrap();

        assert_eq!(second.status, WriteStatus::Updated);
        assert_eq!(second.status_code, 200);
        assert_eq!(repository.get("a.jpg").unwrap().as_ref(), b"2");
        assert_eq!(repository.writes().len(), 2);
        assert_eq!(repository.writes()[0].message, "Add a.jpg");
    }

    #[tokio::test]
    async fn test_invalid_base64_is_rejected() {
        let repository = InMemoryRepository::new();
        let request = PutRequest {
            file_name: "bad.jpg".to_string(),
            message: "Add bad.jpg".to_string(),
            content: "***".to_string(),
        };

        let err = repository.put_file(request).await.unwrap_err();
        assert_eq!(err.status(), Some(422));
        assert!(!repository.contains("bad.jpg"));
    }

    #[tokio::test]
    async fn test_missing_file_is_none() {
        let repository = InMemoryRepository::new();
        assert!(repository.fetch_raw("nope.txt").await.unwrap().is_none());
        assert_eq!(repository.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_listing_is_sorted() {
        let repository = InMemoryRepository::new();
        repository.insert("b.jpg", &b"b"[..]);
        repository.insert("a.txt", &b"a"[..]);

        let names: Vec<String> = repository
            .list_dir()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["a.txt", "b.jpg"]);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let repository = InMemoryRepository::new();
        repository.insert("a.txt", &b"a"[..]);
        repository.fail_fetch(
            "a.txt",
            RepositoryError::Timeout {
                operation: "fetch_raw".into(),
                duration_secs: 1,
            },
        );
        repository.fail_put("x.jpg", RepositoryError::from_status(BACKEND, "put_file", 401, String::new()));
        repository.fail_list(RepositoryError::from_status(BACKEND, "list_dir", 500, String::new()));

        assert!(repository.fetch_raw("a.txt").await.unwrap_err().is_retriable());
        assert!(repository
            .put_file(PutRequest::new("x.jpg", b"x"))
            .await
            .unwrap_err()
            .is_auth_error());
        assert!(repository.list_dir().await.is_err());

        repository.clear_failures();
        assert!(repository.fetch_raw("a.txt").await.unwrap().is_some());
        assert!(repository.list_dir().await.is_ok());
    }
}
