/*!
 * Configuration types for gitgallery
 *
 * Settings come from three layers, lowest precedence first:
 * a TOML file, `GITHUB_*` environment variables, then command-line flags.
 * The merged result is validated once at startup and treated as immutable
 * for the rest of the process.
 */

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{GalleryError, Result};

/// Default GitHub REST API endpoint
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default public raw-content host
pub const DEFAULT_RAW_BASE: &str = "https://raw.githubusercontent.com";

/// Environment variable holding the access token
pub const ENV_TOKEN: &str = "GITHUB_TOKEN";
/// Environment variable holding `owner/name`
pub const ENV_REPO: &str = "GITHUB_REPO";
/// Environment variable holding the target branch
pub const ENV_BRANCH: &str = "GITHUB_BRANCH";
/// Environment variable holding the content directory
pub const ENV_PATH: &str = "GITHUB_PATH";

/// Validated repository coordinates and endpoint settings
#[derive(Debug)]
pub struct RepositoryConfig {
    /// Access token (never logged or displayed)
    pub token: SecretString,

    /// Repository identifier, `owner/name`
    pub repo: String,

    /// Branch all reads and writes target
    pub branch: String,

    /// Content directory, without leading/trailing slashes ("" = repository root)
    pub path: String,

    /// REST API base URL
    pub api_base: String,

    /// Raw-content base URL
    pub raw_base: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl RepositoryConfig {
    /// Create a configuration with default endpoints and timeout
    pub fn new(
        token: impl Into<String>,
        repo: impl Into<String>,
        branch: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            token: SecretString::new(token.into().into_boxed_str()),
            repo: repo.into(),
            branch: branch.into(),
            path: normalize_path(&path.into()),
            api_base: DEFAULT_API_BASE.to_string(),
            raw_base: DEFAULT_RAW_BASE.to_string(),
            timeout_secs: default_timeout_secs(),
        }
    }

    /// Builder pattern: override both endpoint bases
    pub fn with_endpoints(mut self, api_base: impl Into<String>, raw_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.raw_base = raw_base.into();
        self
    }

    /// Builder pattern: set the request timeout
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Request timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Non-empty segments of the content directory
    pub fn path_segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('/').filter(|s| !s.is_empty())
    }

    /// Check the coordinates are usable
    pub fn validate(&self) -> Result<()> {
        if self.token.expose_secret().trim().is_empty() {
            return Err(missing("token", ENV_TOKEN));
        }
        if self.branch.trim().is_empty() {
            return Err(missing("branch", ENV_BRANCH));
        }

        let mut parts = self.repo.split('/');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(owner), Some(name), None) if !owner.is_empty() && !name.is_empty() => {}
            _ => {
                return Err(GalleryError::Config(format!(
                    "repository must be given as 'owner/name', got '{}'",
                    self.repo
                )))
            }
        }

        for (field, value) in [("api_base", &self.api_base), ("raw_base", &self.raw_base)] {
            let url = url::Url::parse(value).map_err(|e| {
                GalleryError::Config(format!("invalid {} '{}': {}", field, value, e))
            })?;
            if url.cannot_be_a_base() {
                return Err(GalleryError::Config(format!(
                    "invalid {} '{}': not a base URL",
                    field, value
                )));
            }
        }

        if self.timeout_secs == 0 {
            return Err(GalleryError::Config(
                "timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Unvalidated repository settings as they appear in one configuration layer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_base: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl RepositorySettings {
    /// Read the `GITHUB_*` environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            token: get(ENV_TOKEN),
            repo: get(ENV_REPO),
            branch: get(ENV_BRANCH),
            path: get(ENV_PATH),
            ..Default::default()
        }
    }

    /// Layer `higher` on top of `self`; values set in `higher` win
    pub fn overlay(self, higher: RepositorySettings) -> Self {
        Self {
            token: higher.token.or(self.token),
            repo: higher.repo.or(self.repo),
            branch: higher.branch.or(self.branch),
            path: higher.path.or(self.path),
            api_base: higher.api_base.or(self.api_base),
            raw_base: higher.raw_base.or(self.raw_base),
            timeout_secs: higher.timeout_secs.or(self.timeout_secs),
        }
    }

    /// Turn merged settings into a validated configuration
    ///
    /// Fails fast naming the first required setting that is absent or blank.
    pub fn into_config(self) -> Result<RepositoryConfig> {
        let required = |value: Option<String>, field: &str, env: &str| {
            value
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| missing(field, env))
        };

        let token = required(self.token, "token", ENV_TOKEN)?;
        let repo = required(self.repo, "repo", ENV_REPO)?;
        let branch = required(self.branch, "branch", ENV_BRANCH)?;
        let path = required(self.path, "path", ENV_PATH)?;

        let mut config = RepositoryConfig::new(token, repo.trim(), branch.trim(), path);
        if let Some(api_base) = self.api_base {
            config.api_base = api_base;
        }
        if let Some(raw_base) = self.raw_base {
            config.raw_base = raw_base;
        }
        if let Some(timeout_secs) = self.timeout_secs {
            config.timeout_secs = timeout_secs;
        }

        config.validate()?;
        Ok(config)
    }
}

/// What to do with the rest of a batch after an item fails
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BatchMode {
    /// Attempt every item regardless of earlier failures
    #[default]
    Continue,

    /// Stop at the first item whose image could not be stored
    Abort,
}

/// Upload behaviour
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Treat "updated" (HTTP 200, path already existed) as success
    #[serde(default)]
    pub accept_overwrite: bool,

    /// Batch failure handling
    #[serde(default)]
    pub batch_mode: BatchMode,
}

/// Caller-side retry policy for uploads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Number of retries after the first attempt (0 = no retry)
    #[serde(default)]
    pub attempts: u32,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_retry_delay_ms")]
    pub delay_ms: u64,

    /// Double the delay after every retry
    #[serde(default)]
    pub exponential_backoff: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 0,
            delay_ms: default_retry_delay_ms(),
            exponential_backoff: false,
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    #[default]
    Warn,

    /// Info, warnings, and errors
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

/// On-disk configuration file layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryConfigFile {
    #[serde(default)]
    pub log_level: LogLevel,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,

    #[serde(default)]
    pub verbose: bool,

    #[serde(default)]
    pub repository: RepositorySettings,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

impl GalleryConfigFile {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| {
            GalleryError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| GalleryError::Config(format!("failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}

/// Complete, validated configuration for one process
#[derive(Debug)]
pub struct GalleryConfig {
    pub repository: RepositoryConfig,
    pub upload: UploadConfig,
    pub retry: RetryConfig,
    pub log_level: LogLevel,
    pub log_file: Option<PathBuf>,
    pub verbose: bool,
}

impl GalleryConfig {
    /// Load the file (if any), overlay the environment, then `overrides`
    pub fn load(path: Option<&Path>, overrides: RepositorySettings) -> Result<Self> {
        let file = match path {
            Some(path) => GalleryConfigFile::from_file(path)?,
            None => GalleryConfigFile::default(),
        };
        Self::from_sources(file, RepositorySettings::from_env(), overrides)
    }

    /// Merge explicit layers: file < env < overrides
    pub fn from_sources(
        file: GalleryConfigFile,
        env: RepositorySettings,
        overrides: RepositorySettings,
    ) -> Result<Self> {
        let repository = file
            .repository
            .overlay(env)
            .overlay(overrides)
            .into_config()?;

        Ok(Self {
            repository,
            upload: file.upload,
            retry: file.retry,
            log_level: file.log_level,
            log_file: file.log_file,
            verbose: file.verbose,
        })
    }
}

fn missing(field: &str, env: &str) -> GalleryError {
    GalleryError::Config(format!(
        "missing required setting '{}' (set repository.{} in the config file or {})",
        field, field, env
    ))
}

fn normalize_path(path: &str) -> String {
    path.trim().trim_matches('/').to_string()
}

// Default value functions for serde
fn default_timeout_secs() -> u64 {
    30
}

fn default_retry_delay_ms() -> u64 {
    1000
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn full_settings() -> RepositorySettings {
        RepositorySettings {
            token: Some("ghp_test".to_string()),
            repo: Some("octo/photos".to_string()),
            branch: Some("main".to_string()),
            path: Some("gallery".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_complete_settings_validate() {
        let config = full_settings().into_config().unwrap();
        assert_eq!(config.repo, "octo/photos");
        assert_eq!(config.branch, "main");
        assert_eq!(config.path, "gallery");
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.raw_base, DEFAULT_RAW_BASE);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.token.expose_secret(), "ghp_test");
    }

    #[test]
    fn test_missing_settings_fail_fast() {
        for field in ["token", "repo", "branch", "path"] {
            let mut settings = full_settings();
            match field {
                "token" => settings.token = None,
                "repo" => settings.repo = None,
                "branch" => settings.branch = None,
                _ => settings.path = None,
            }
            let err = settings.into_config().unwrap_err();
            assert!(
                err.to_string().contains(&format!("'{}'", field)),
                "unexpected error for {}: {}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_blank_settings_count_as_missing() {
        let settings = RepositorySettings {
            branch: Some("   ".to_string()),
            ..full_settings()
        };
        let err = settings.into_config().unwrap_err();
        assert!(err.to_string().contains("'branch'"));
    }

    #[test]
    fn test_repo_must_be_owner_slash_name() {
        for repo in ["photos", "octo/", "/photos", "a/b/c"] {
            let settings = RepositorySettings {
                repo: Some(repo.to_string()),
                ..full_settings()
            };
            assert!(settings.into_config().is_err(), "accepted repo '{}'", repo);
        }
    }

    #[test]
    fn test_path_is_normalized() {
        let settings = RepositorySettings {
            path: Some("/assets/gallery/".to_string()),
            ..full_settings()
        };
        let config = settings.into_config().unwrap();
        assert_eq!(config.path, "assets/gallery");
        assert_eq!(
            config.path_segments().collect::<Vec<_>>(),
            vec!["assets", "gallery"]
        );

        let root = RepositoryConfig::new("t", "o/r", "main", "/");
        assert_eq!(root.path, "");
        assert_eq!(root.path_segments().count(), 0);
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let settings = RepositorySettings {
            api_base: Some("not a url".to_string()),
            ..full_settings()
        };
        assert!(settings.into_config().is_err());

        let settings = RepositorySettings {
            raw_base: Some("mailto:someone@example.com".to_string()),
            ..full_settings()
        };
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let settings = RepositorySettings {
            timeout_secs: Some(0),
            ..full_settings()
        };
        assert!(settings.into_config().is_err());
    }

    #[test]
    fn test_env_lookup_ignores_blank_values() {
        let vars: HashMap<&str, &str> = [
            (ENV_TOKEN, "from-env"),
            (ENV_REPO, "octo/env"),
            (ENV_BRANCH, ""),
        ]
        .into_iter()
        .collect();

        let settings = RepositorySettings::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(settings.token.as_deref(), Some("from-env"));
        assert_eq!(settings.repo.as_deref(), Some("octo/env"));
        assert_eq!(settings.branch, None);
        assert_eq!(settings.path, None);
    }

    #[test]
    fn test_layer_precedence() {
        let file = GalleryConfigFile {
            repository: full_settings(),
            ..Default::default()
        };
        let env = RepositorySettings {
            branch: Some("env-branch".to_string()),
            path: Some("env-path".to_string()),
            ..Default::default()
        };
        let overrides = RepositorySettings {
            path: Some("cli-path".to_string()),
            ..Default::default()
        };

        let config = GalleryConfig::from_sources(file, env, overrides).unwrap();
        assert_eq!(config.repository.repo, "octo/photos");
        assert_eq!(config.repository.branch, "env-branch");
        assert_eq!(config.repository.path, "cli-path");
    }

    #[test]
    fn test_config_file_example() {
        let toml_str = r#"
log_level = "debug"
verbose = false

[repository]
token = "ghp_file"
repo = "octo/photos"
branch = "main"
path = "uploads/images"
timeout_secs = 10

[upload]
accept_overwrite = true
batch_mode = "abort"

[retry]
attempts = 2
delay_ms = 250
exponential_backoff = true
"#;

        let file: GalleryConfigFile = toml::from_str(toml_str).unwrap();
        assert_eq!(file.log_level, LogLevel::Debug);
        assert!(file.upload.accept_overwrite);
        assert_eq!(file.upload.batch_mode, BatchMode::Abort);
        assert_eq!(file.retry.attempts, 2);
        assert_eq!(file.retry.delay_ms, 250);
        assert!(file.retry.exponential_backoff);

        let config =
            GalleryConfig::from_sources(file, RepositorySettings::default(), Default::default())
                .unwrap();
        assert_eq!(config.repository.timeout_secs, 10);
        assert_eq!(config.repository.path, "uploads/images");
    }

    #[test]
    fn test_config_file_defaults() {
        let file: GalleryConfigFile = toml::from_str("").unwrap();
        assert_eq!(file.upload.batch_mode, BatchMode::Continue);
        assert!(!file.upload.accept_overwrite);
        assert_eq!(file.retry.attempts, 0);
        assert_eq!(file.retry.delay_ms, 1000);
        assert_eq!(file.log_level, LogLevel::Warn);
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gitgallery.toml");

        let file = GalleryConfigFile {
            repository: full_settings(),
            retry: RetryConfig {
                attempts: 3,
                ..Default::default()
            },
            ..Default::default()
        };
        file.to_file(&path).unwrap();

        let loaded = GalleryConfigFile::from_file(&path).unwrap();
        assert_eq!(loaded, file);
    }

    #[test]
    fn test_debug_does_not_leak_token() {
        let config = full_settings().into_config().unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("ghp_test"));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
