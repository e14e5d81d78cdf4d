//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables**: `CPECTL_URL`, `CPECTL_USERNAME`,
//!    `CPECTL_SESSION_FILE`
//! 2. **Config file**: path via `--config <path>`, `CPECTL_CONFIG`, or
//!    `cpectl.toml` in CWD
//! 3. **Compiled defaults**: see each field's default value below
//!
//! ```toml
//! [device]
//! url = "http://192.168.0.1"
//! endpoint_path = "/cgi-bin/http.cgi"
//! upload_path = "/cgi-bin/upload.cgi"
//!
//! [http]
//! connect_timeout_secs = 10
//! # timeout_secs = 60
//!
//! [session]
//! file = "~/.cache/cpectl/session"
//! persist = true
//!
//! [auth]
//! username = "admin"
//!
//! [logging]
//! level = "warn"
//! ```
//!
//! The password is never read from the file; pass it on the command line or
//! through `CPECTL_PASSWORD`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::client::{
    ClientError, ClientOptions, CommandClient, DEFAULT_ENDPOINT_PATH, DEFAULT_UPLOAD_PATH,
};
use crate::session::SessionStore;

const DEFAULT_CONFIG_FILE: &str = "cpectl.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the gateway lives.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    /// Base URL of the gateway (default `http://192.168.0.1`). Override with `CPECTL_URL`.
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// TCP connect timeout in seconds (default 10).
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Total request timeout in seconds. Unset means no limit.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

/// Session persistence between CLI invocations.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Where the session id is kept. Override with `CPECTL_SESSION_FILE`.
    #[serde(default = "default_session_file")]
    pub file: PathBuf,
    /// Keep the session id on disk (default true).
    #[serde(default = "default_persist")]
    pub persist: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// Login name (default `admin`). Override with `CPECTL_USERNAME`.
    #[serde(default = "default_username")]
    pub username: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `warn`). Overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_url() -> String {
    "http://192.168.0.1".to_string()
}
fn default_endpoint_path() -> String {
    DEFAULT_ENDPOINT_PATH.to_string()
}
fn default_upload_path() -> String {
    DEFAULT_UPLOAD_PATH.to_string()
}
fn default_connect_timeout_secs() -> u64 {
    10
}
fn default_session_file() -> PathBuf {
    PathBuf::from("~/.cache/cpectl/session")
}
fn default_persist() -> bool {
    true
}
fn default_username() -> String {
    "admin".to_string()
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            endpoint_path: default_endpoint_path(),
            upload_path: default_upload_path(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout_secs(),
            timeout_secs: None,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            file: default_session_file(),
            persist: default_persist(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    ///
    /// An explicit `path` (or `CPECTL_CONFIG`) must exist. `cpectl.toml` in the
    /// current directory is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let explicit = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("CPECTL_CONFIG").map(PathBuf::from));

        let mut config = match explicit {
            Some(p) => Self::from_file(&expand_tilde(&p))?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        if let Ok(url) = std::env::var("CPECTL_URL") {
            config.device.url = url;
        }
        if let Ok(username) = std::env::var("CPECTL_USERNAME") {
            config.auth.username = username;
        }
        if let Ok(file) = std::env::var("CPECTL_SESSION_FILE") {
            config.session.file = PathBuf::from(file);
        }

        config.session.file = expand_tilde(&config.session.file);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            endpoint_path: self.device.endpoint_path.clone(),
            upload_path: self.device.upload_path.clone(),
            connect_timeout: Duration::from_secs(self.http.connect_timeout_secs),
            timeout: self.http.timeout_secs.map(Duration::from_secs),
        }
    }

    /// Build a [`CommandClient`] for the configured device, restoring a
    /// persisted session when enabled.
    pub fn connect(&self) -> Result<CommandClient, ClientError> {
        let url = reqwest::Url::parse(self.device.url.trim())
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {e}", self.device.url)))?;
        let session = if self.session.persist {
            SessionStore::with_file(url, self.session.file.clone())
        } else {
            SessionStore::new(url)
        };
        CommandClient::with_options(&self.device.url, Arc::new(session), &self.client_options())
    }
}

/// Expand a leading `~` to `$HOME`.
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(rest);
        }
    }
    path.to_path_buf()
}
