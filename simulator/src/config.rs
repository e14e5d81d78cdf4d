//! Configuration loading and defaults.
//!
//! Configuration is resolved in order of precedence (highest wins):
//!
//! 1. **Environment variables**: `CPESIM_LISTEN`, `CPESIM_PASSWORD`
//! 2. **Config file**: path via `--config <path>`, or `cpe-sim.toml` in CWD
//! 3. **Compiled defaults**: see each field's default value below
//!
//! The TOML file mirrors the struct hierarchy:
//!
//! ```toml
//! [server]
//! listen = "127.0.0.1:8080"
//! endpoint_path = "/cgi-bin/http.cgi"
//! upload_path = "/cgi-bin/upload.cgi"
//! max_upload_size = 67108864  # 64 MB
//!
//! [auth]
//! username = "admin"
//! password = "admin"
//! max_attempts = 5
//! lock_secs = 300
//! session_ttl_secs = 600
//! token_ttl_secs = 60
//!
//! [device]
//! serial = "CPE-0000-SIM-001"
//! model = "CPE-SIM"
//! firmware = "SIM_1.0.0"
//!
//! [logging]
//! level = "info"
//! ```

use serde::Deserialize;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "cpe-sim.toml";

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP listener and endpoint layout.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Socket address to bind (default `127.0.0.1:8080`).
    #[serde(default = "default_listen")]
    pub listen: String,
    /// JSON command endpoint (default `/cgi-bin/http.cgi`).
    #[serde(default = "default_endpoint_path")]
    pub endpoint_path: String,
    /// Multipart upload endpoint (default `/cgi-bin/upload.cgi`).
    #[serde(default = "default_upload_path")]
    pub upload_path: String,
    /// Largest accepted upload body in bytes (default 64 MB).
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: usize,
}

/// Account and session policy.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_username")]
    pub username: String,
    /// Initial password. Override with `CPESIM_PASSWORD`.
    #[serde(default = "default_password")]
    pub password: String,
    /// Wrong passwords allowed before lockout (default 5).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Lockout duration in seconds (default 300).
    #[serde(default = "default_lock_secs")]
    pub lock_secs: u64,
    /// Idle seconds before a session expires (default 600).
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Seconds a login token stays valid (default 60).
    #[serde(default = "default_token_ttl_secs")]
    pub token_ttl_secs: u64,
}

/// Device identity, embedded in device-info responses.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_serial")]
    pub serial: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_firmware")]
    pub firmware: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// tracing filter level (default `info`). Overridden by `RUST_LOG` env var.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}
fn default_endpoint_path() -> String {
    "/cgi-bin/http.cgi".to_string()
}
fn default_upload_path() -> String {
    "/cgi-bin/upload.cgi".to_string()
}
fn default_max_upload_size() -> usize {
    64 * 1024 * 1024 // 64 MB
}
fn default_username() -> String {
    "admin".to_string()
}
fn default_password() -> String {
    "admin".to_string()
}
fn default_max_attempts() -> u32 {
    5
}
fn default_lock_secs() -> u64 {
    300
}
fn default_session_ttl_secs() -> u64 {
    600
}
fn default_token_ttl_secs() -> u64 {
    60
}
fn default_serial() -> String {
    "CPE-0000-SIM-001".to_string()
}
fn default_model() -> String {
    "CPE-SIM".to_string()
}
fn default_firmware() -> String {
    "SIM_1.0.0".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            endpoint_path: default_endpoint_path(),
            upload_path: default_upload_path(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            username: default_username(),
            password: default_password(),
            max_attempts: default_max_attempts(),
            lock_secs: default_lock_secs(),
            session_ttl_secs: default_session_ttl_secs(),
            token_ttl_secs: default_token_ttl_secs(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            serial: default_serial(),
            model: default_model(),
            firmware: default_firmware(),
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

impl Config {
    /// Load configuration with the precedence chain: env vars > file > defaults.
    pub fn load(path: Option<&str>) -> Result<Self, String> {
        let mut config = if let Some(p) = path {
            Self::from_file(p)?
        } else if Path::new(DEFAULT_CONFIG_FILE).exists() {
            Self::from_file(DEFAULT_CONFIG_FILE)?
        } else {
            Self::default()
        };

        // Env var overrides
        if let Ok(listen) = std::env::var("CPESIM_LISTEN") {
            config.server.listen = listen;
        }
        if let Ok(password) = std::env::var("CPESIM_PASSWORD") {
            config.auth.password = password;
        }

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {path}: {e}"))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config file {path}: {e}"))
    }
}
