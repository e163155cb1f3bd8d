//! Configuration management for chatstream
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::error::{ChatStreamError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Main configuration structure for chatstream
///
/// Holds the agent service connection settings, chat turn defaults,
/// session storage location and logging options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Agent service connection
    #[serde(default)]
    pub server: ServerConfig,
    /// Chat turn behavior
    #[serde(default)]
    pub chat: ChatConfig,
    /// Local session store
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent service connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Base URL of the agent service (scheme, host, port)
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// TCP connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,

    /// Upper bound on one whole streamed turn
    ///
    /// Agent turns with many tool calls can run for minutes, so this is
    /// much larger than a typical request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,
}

fn default_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    600
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout_seconds: default_connect_timeout(),
            request_timeout_seconds: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    /// Request timeout as a [`Duration`]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Chat turn configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Ask the agent to stream its reasoning by default
    #[serde(default)]
    pub enable_deep_think: bool,

    /// Maximum characters of user text used for a fallback session title
    #[serde(default = "default_title_max_chars")]
    pub title_max_chars: usize,

    /// Title used when neither the server nor the user input provides one
    #[serde(default = "default_title")]
    pub default_title: String,
}

fn default_title_max_chars() -> usize {
    12
}

fn default_title() -> String {
    "New chat".to_string()
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            enable_deep_think: false,
            title_max_chars: default_title_max_chars(),
            default_title: default_title(),
        }
    }
}

/// Session store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path; the platform data directory when unset
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level for the `chatstream` target
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON formatted log lines
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Returns
    ///
    /// Returns the loaded and merged configuration
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ChatStreamError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| ChatStreamError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(base_url) = std::env::var("CHATSTREAM_BASE_URL") {
            self.server.base_url = base_url;
        }

        if let Ok(timeout) = std::env::var("CHATSTREAM_CONNECT_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.server.connect_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATSTREAM_CONNECT_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(timeout) = std::env::var("CHATSTREAM_REQUEST_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.server.request_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid CHATSTREAM_REQUEST_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(deep_think) = std::env::var("CHATSTREAM_DEEP_THINK") {
            match deep_think.to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => self.chat.enable_deep_think = true,
                "0" | "false" | "no" | "off" => self.chat.enable_deep_think = false,
                _ => tracing::warn!("Invalid CHATSTREAM_DEEP_THINK: {}", deep_think),
            }
        }

        if let Ok(db_path) = std::env::var("CHATSTREAM_HISTORY_DB") {
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        if let Ok(level) = std::env::var("CHATSTREAM_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
            self.logging.level = "debug".to_string();
        }

        if let Some(base_url) = &cli.base_url {
            self.server.base_url = base_url.clone();
        }

        if let Some(path) = &cli.storage_path {
            self.storage.db_path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if the base URL is not an http(s) URL, or if a timeout
    /// or the title length is zero
    pub fn validate(&self) -> Result<()> {
        let url = url::Url::parse(&self.server.base_url).map_err(|e| {
            ChatStreamError::Config(format!(
                "Invalid server.base_url '{}': {}",
                self.server.base_url, e
            ))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ChatStreamError::Config(format!(
                "server.base_url must use http or https, got '{}'",
                url.scheme()
            ))
            .into());
        }

        if self.server.connect_timeout_seconds == 0 {
            return Err(ChatStreamError::Config(
                "server.connect_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.server.request_timeout_seconds == 0 {
            return Err(ChatStreamError::Config(
                "server.request_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.chat.title_max_chars == 0 {
            return Err(ChatStreamError::Config(
                "chat.title_max_chars must be greater than 0".to_string(),
            )
            .into());
        }

        Ok(())
    }
}
