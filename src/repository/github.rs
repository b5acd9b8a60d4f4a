//! GitHub contents API backend
//!
//! Writes and listings go through the authenticated REST API
//! (`/repos/{owner}/{name}/contents/{path}`); raw bytes are fetched from the
//! public raw-content host (`{raw_base}/{owner}/{name}/{branch}/{path}/{file}`).

use super::error::{RepositoryError, RepositoryResult};
use super::types::{DirEntry, PutRequest, PutResponse, WriteStatus};
use super::ContentRepository;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use secrecy::ExposeSecret;
use serde::Serialize;
use url::Url;

use crate::config::RepositoryConfig;

const BACKEND: &str = "github";
const ACCEPT: &str = "application/vnd.github.v3+json";

/// The contents API never returns more entries than this for one directory
const LISTING_CAP: usize = 1000;

#[derive(Serialize)]
struct PutPayload<'a> {
    message: &'a str,
    content: &'a str,
    branch: &'a str,
}

/// GitHub repository adapter
///
/// # Example
///
/// ```no_run
/// use gitgallery::config::RepositoryConfig;
/// use gitgallery::repository::{ContentRepository, GitHubRepository, PutRequest};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RepositoryConfig::new("ghp_...", "octo/photos", "main", "gallery");
///     let repository = GitHubRepository::new(&config)?;
///
///     let response = repository.put_file(PutRequest::new("hello.txt", b"hi")).await?;
///     println!("{:?} -> {}", response.status, repository.raw_url("hello.txt"));
///     Ok(())
/// }
/// ```
pub struct GitHubRepository {
    client: Client,
    auth_headers: HeaderMap,
    owner: String,
    name: String,
    branch: String,
    path_segments: Vec<String>,
    api_base: Url,
    raw_base: Url,
    timeout_secs: u64,
}

impl GitHubRepository {
    /// Create a client for the configured repository
    pub fn new(config: &RepositoryConfig) -> RepositoryResult<Self> {
        let (owner, name) = config
            .repo
            .split_once('/')
            .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
            .ok_or_else(|| invalid_config(format!("repository '{}' is not 'owner/name'", config.repo)))?;

        let api_base = parse_base(&config.api_base, "api_base")?;
        let raw_base = parse_base(&config.raw_base, "raw_base")?;

        let mut authorization =
            HeaderValue::from_str(&format!("token {}", config.token.expose_secret()))
                .map_err(|_| invalid_config("token contains characters not allowed in a header"))?;
        authorization.set_sensitive(true);

        let mut auth_headers = HeaderMap::new();
        auth_headers.insert(header::AUTHORIZATION, authorization);
        auth_headers.insert(header::ACCEPT, HeaderValue::from_static(ACCEPT));

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("gitgallery/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| invalid_config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            auth_headers,
            owner: owner.to_string(),
            name: name.to_string(),
            branch: config.branch.clone(),
            path_segments: config.path_segments().map(str::to_string).collect(),
            api_base,
            raw_base,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Contents API URL for the directory, or a file inside it
    pub fn contents_url(&self, file_name: Option<&str>) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push("repos")
                .push(&self.owner)
                .push(&self.name)
                .push("contents")
                .extend(&self.path_segments);
            if let Some(file_name) = file_name {
                segments.push(file_name);
            }
        }
        url
    }

    fn raw_file_url(&self, file_name: &str) -> Url {
        let mut url = self.raw_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(&self.owner)
                .push(&self.name)
                .extend(self.branch.split('/').filter(|s| !s.is_empty()))
                .extend(&self.path_segments)
                .push(file_name);
        }
        url
    }

    fn map_send_error(&self, operation: &str, url: &Url, err: reqwest::Error) -> RepositoryError {
        if err.is_timeout() {
            RepositoryError::Timeout {
                operation: operation.to_string(),
                duration_secs: self.timeout_secs,
            }
        } else {
            RepositoryError::Transport {
                backend: BACKEND.to_string(),
                endpoint: url.host_str().unwrap_or_default().to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn read_body(
        &self,
        operation: &str,
        url: &Url,
        response: reqwest::Response,
    ) -> RepositoryResult<String> {
        response
            .text()
            .await
            .map_err(|e| self.map_send_error(operation, url, e))
    }
}

#[async_trait]
impl ContentRepository for GitHubRepository {
    async fn put_file(&self, request: PutRequest) -> RepositoryResult<PutResponse> {
        let url = self.contents_url(Some(&request.file_name));
        let payload = PutPayload {
            message: &request.message,
            content: &request.content,
            branch: &self.branch,
        };

        tracing::debug!(file = %request.file_name, bytes = request.content.len(), "PUT contents");

        let response = self
            .client
            .put(url.clone())
            .headers(self.auth_headers.clone())
            .json(&payload)
            .send()
            .await
            .map_err(|e| self.map_send_error("put_file", &url, e))?;

        let status = response.status().as_u16();
        let body = self.read_body("put_file", &url, response).await?;

        match WriteStatus::from_status_code(status) {
            Some(write_status) => Ok(PutResponse {
                status_code: status,
                status: write_status,
                body,
            }),
            None => Err(RepositoryError::from_status(BACKEND, "put_file", status, body)),
        }
    }

    async fn list_dir(&self) -> RepositoryResult<Vec<DirEntry>> {
        let url = self.contents_url(None);

        let response = self
            .client
            .get(url.clone())
            .headers(self.auth_headers.clone())
            .query(&[("ref", self.branch.as_str())])
            .send()
            .await
            .map_err(|e| self.map_send_error("list_dir", &url, e))?;

        let status = response.status();
        let body = self.read_body("list_dir", &url, response).await?;

        if status != StatusCode::OK {
            return Err(RepositoryError::from_status(
                BACKEND,
                "list_dir",
                status.as_u16(),
                body,
            ));
        }

        let entries: Vec<DirEntry> =
            serde_json::from_str(&body).map_err(|e| RepositoryError::Decode {
                backend: BACKEND.to_string(),
                message: format!("directory listing: {}", e),
            })?;

        if entries.len() >= LISTING_CAP {
            tracing::warn!(
                entries = entries.len(),
                "directory listing reached the contents API limit; some files may be missing"
            );
        }

        Ok(entries)
    }

    async fn fetch_raw(&self, file_name: &str) -> RepositoryResult<Option<Bytes>> {
        let url = self.raw_file_url(file_name);

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error("fetch_raw", &url, e))?;

        match response.status() {
            StatusCode::OK => {
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| self.map_send_error("fetch_raw", &url, e))?;
                Ok(Some(bytes))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => {
                let body = self.read_body("fetch_raw", &url, response).await?;
                Err(RepositoryError::from_status(
                    BACKEND,
                    "fetch_raw",
                    status.as_u16(),
                    body,
                ))
            }
        }
    }

    fn raw_url(&self, file_name: &str) -> String {
        self.raw_file_url(file_name).to_string()
    }

    fn backend_name(&self) -> &str {
        BACKEND
    }
}

fn parse_base(value: &str, field: &str) -> RepositoryResult<Url> {
    let url = Url::parse(value).map_err(|e| invalid_config(format!("invalid {}: {}", field, e)))?;
    if url.cannot_be_a_base() {
        return Err(invalid_config(format!("{} is not a base URL", field)));
    }
    Ok(url)
}

fn invalid_config(message: impl Into<String>) -> RepositoryError {
    RepositoryError::InvalidConfig {
        backend: BACKEND.to_string(),
        message: message.into(),
    }
}
