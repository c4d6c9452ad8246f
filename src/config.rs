//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::credentials::AuthMode;
use crate::http::DEFAULT_REFRESH_PATH;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default = "default_timeout")]
    pub timeout_ms: u64,

    #[serde(default = "default_refresh_path")]
    pub refresh_path: String,

    #[serde(default)]
    pub mode: AuthMode,
}

fn default_api_url() -> String {
    "http://localhost:3000/api".to_string()
}

fn default_timeout() -> u64 {
    10_000 // 10 seconds
}

fn default_refresh_path() -> String {
    DEFAULT_REFRESH_PATH.to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_ms: default_timeout(),
            refresh_path: default_refresh_path(),
            mode: AuthMode::default(),
        }
    }
}

/// Where credentials are kept
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialBackend {
    #[default]
    File,
    Memory,
}

/// Credential storage configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default)]
    pub backend: CredentialBackend,

    #[serde(default = "default_credentials_path")]
    pub path: String,

    #[serde(default = "default_access_ttl")]
    pub access_token_ttl_days: u32,

    #[serde(default = "default_refresh_ttl")]
    pub refresh_token_ttl_days: u32,
}

fn default_credentials_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("halolight")
                .join("credentials.json")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./.halolight/credentials.json".to_string())
}

fn default_access_ttl() -> u32 {
    7
}

fn default_refresh_ttl() -> u32 {
    30
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            backend: CredentialBackend::default(),
            path: default_credentials_path(),
            access_token_ttl_days: default_access_ttl(),
            refresh_token_ttl_days: default_refresh_ttl(),
        }
    }
}

/// Session behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Where the application sends users whose session expired
    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Simulated latency of mock-mode auth calls
    #[serde(default = "default_mock_latency")]
    pub mock_latency_ms: u64,

    /// Where the non-secret session state is persisted
    #[serde(default = "default_session_path")]
    pub state_path: String,
}

fn default_login_path() -> String {
    "/login".to_string()
}

fn default_mock_latency() -> u64 {
    500
}

fn default_session_path() -> String {
    dirs::data_local_dir()
        .map(|p| {
            p.join("halolight")
                .join("session.json")
                .to_string_lossy()
                .to_string()
        })
        .unwrap_or_else(|| "./.halolight/session.json".to_string())
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            login_path: default_login_path(),
            mock_latency_ms: default_mock_latency(),
            state_path: default_session_path(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("halolight").join("config.toml")),
            Some(PathBuf::from("./halolight.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("HALOLIGHT_API_URL") {
            self.api.url = url;
        }
        if let Some(mock) = var("HALOLIGHT_MOCK") {
            self.api.mode = if mock == "true" {
                AuthMode::Mock
            } else {
                AuthMode::Live
            };
        }

        if let Some(path) = var("HALOLIGHT_CREDENTIALS_PATH") {
            self.credentials.path = path;
        }

        if let Some(level) = var("HALOLIGHT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = var("HALOLIGHT_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# HaloLight Configuration
#
# Environment variables override these settings:
# - HALOLIGHT_API_URL
# - HALOLIGHT_MOCK ("true" selects mock mode)
# - HALOLIGHT_CREDENTIALS_PATH
# - HALOLIGHT_LOG_LEVEL
# - HALOLIGHT_LOG_FORMAT

[api]
# Backend base URL
url = "http://localhost:3000/api"

# Request timeout (ms)
timeout_ms = 10000

# Token refresh endpoint, relative to url
refresh_path = "/auth/refresh"

# live: real backend with token refresh
# mock: demo accounts, any 401 ends the session
mode = "live"

[credentials]
# Storage backend: file or memory
backend = "file"

# Credential file location
# path = "~/.local/share/halolight/credentials.json"

# Token lifetimes (days)
access_token_ttl_days = 7
refresh_token_ttl_days = 30

[session]
# Login entry point used when a session expires
login_path = "/login"

# Simulated latency of mock-mode auth calls (ms)
mock_latency_ms = 500

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
