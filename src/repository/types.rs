//! Common types for repository access

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

/// A single content-write request
///
/// The payload is carried base64-encoded, exactly as it travels over the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    /// File name relative to the configured content directory
    pub file_name: String,

    /// Commit message recorded by the repository
    pub message: String,

    /// Base64 (standard alphabet, padded) file content
    pub content: String,
}

impl PutRequest {
    /// Encode `content` for transport and attach the default commit message
    pub fn new(file_name: impl Into<String>, content: &[u8]) -> Self {
        let file_name = file_name.into();
        Self {
            message: format!("Add {}", file_name),
            content: STANDARD.encode(content),
            file_name,
        }
    }

    /// Decode the payload back into raw bytes
    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(self.content.as_bytes())
    }
}

/// What a successful content write did to the target path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WriteStatus {
    /// The path did not exist before (HTTP 201)
    Created,

    /// The path existed and was overwritten (HTTP 200)
    Updated,
}

impl WriteStatus {
    /// Map an HTTP status code onto a write status
    pub fn from_status_code(code: u16) -> Option<Self> {
        match code {
            201 => Some(WriteStatus::Created),
            200 => Some(WriteStatus::Updated),
            _ => None,
        }
    }

    /// HTTP status code the repository uses for this outcome
    pub fn status_code(&self) -> u16 {
        match self {
            WriteStatus::Created => 201,
            WriteStatus::Updated => 200,
        }
    }
}

/// Response to an accepted content write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutResponse {
    /// HTTP status code returned by the repository
    pub status_code: u16,

    /// Created vs. updated
    pub status: WriteStatus,

    /// Raw response body (JSON describing the written file)
    pub body: String,
}

impl PutResponse {
    /// Build a response for the given write status
    pub fn new(status: WriteStatus, body: impl Into<String>) -> Self {
        Self {
            status_code: status.status_code(),
            status,
            body: body.into(),
        }
    }
}

/// Directory entry from listing operations
///
/// Only `name` is guaranteed; the remaining fields mirror what the GitHub
/// contents API reports and are absent for other backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// File name (no directory component)
    pub name: String,

    /// Path within the repository
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Git blob SHA
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha: Option<String>,

    /// Size in bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,

    /// Entry type (`file`, `dir`, `symlink`, `submodule`)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Direct download URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

impl DirEntry {
    /// Create a file entry with just a name
    pub fn file(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            sha: None,
            size: None,
            kind: Some("file".to_string()),
            download_url: None,
        }
    }

    /// Builder pattern: set size
    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }

    /// Check if this is a file; entries without a type are treated as files
    pub fn is_file(&self) -> bool {
        self.kind.as_deref().map_or(true, |kind| kind == "file")
    }
}
