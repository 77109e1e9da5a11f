//! Runtime configuration.
//!
//! Configuration comes from an optional YAML file (path in `EDGE_CONFIG`)
//! and is then overridden by the `LISTEN` and `BACKEND_API_URL` environment
//! variables. Values are read once at startup and passed down explicitly.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_VAR: &str = "EDGE_CONFIG";
/// Environment variable overriding `server.listen_addr`.
pub const LISTEN_VAR: &str = "LISTEN";
/// Environment variable overriding `backend.api_url`.
pub const BACKEND_URL_VAR: &str = "BACKEND_API_URL";

/// Body size cap used when the config file does not set one (16 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path namespace relayed to the backend.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    /// Largest client request body accepted; bigger ones get `413`.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            api_prefix: default_api_prefix(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Where and how API calls are relayed.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackendConfig {
    /// Backend base URL, e.g. `http://localhost:4000/api`
    pub api_url: Option<String>,

    pub connect_timeout_ms: Option<u64>,

    pub request_timeout_ms: Option<u64>,

    /// Largest backend response body relayed.
    pub max_body_bytes: Option<usize>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_api_prefix() -> String {
    "/api".to_string()
}

fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

impl BackendConfig {
    /// Base URL if one is set and non-blank.
    pub fn base_url(&self) -> Option<&str> {
        self.api_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }

    pub fn response_body_limit(&self) -> usize {
        self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES)
    }
}

impl Config {
    /// Loads the config file named by `EDGE_CONFIG` (if any) and applies
    /// environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(path.trim())?,
            _ => Self::default(),
        };

        Ok(base.with_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml_str(&raw)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Applies `LISTEN` / `BACKEND_API_URL` overrides taken from `lookup`.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(LISTEN_VAR) {
            self.server.listen_addr = addr;
        }

        if let Some(url) = lookup(BACKEND_URL_VAR) {
            self.backend.api_url = Some(url);
        }

        self
    }
}
