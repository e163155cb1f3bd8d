//! Error types for chatstream
//!
//! This module defines all error types used throughout the crate,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for chatstream operations
///
/// Covers configuration loading, the HTTP transport, events reported by the
/// agent service itself, and the local session store.
#[derive(Error, Debug)]
pub enum ChatStreamError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Transport failure before or during streaming (non-success status,
    /// network error, unreadable body)
    #[error("Transport error{}: {message}", status_suffix(.status))]
    Transport {
        /// HTTP status code, when the failure came with a response
        status: Option<u16>,
        /// Human readable failure description
        message: String,
    },

    /// The service reported an `error` event on the stream
    #[error("Agent service error: {0}")]
    StreamEvent(String),

    /// Session storage errors (database operations)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Session lookup by id found nothing
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl ChatStreamError {
    /// Build a transport error without an HTTP status
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            status: None,
            message: message.into(),
        }
    }
}

/// Result type alias for chatstream operations
///
/// Uses `anyhow::Error` so callers get rich context while typed
/// [`ChatStreamError`] values remain downcastable.
pub type Result<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_display() {
        let error = ChatStreamError::Config("invalid format".to_string());
        assert_eq!(error.to_string(), "Configuration error: invalid format");
    }

    #[test]
    fn test_transport_error_with_status_display() {
        let error = ChatStreamError::Transport {
            status: Some(400),
            message: "message must not be empty".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Transport error (HTTP 400): message must not be empty"
        );
    }

    #[test]
    fn test_transport_error_without_status_display() {
        let error = ChatStreamError::transport("connection reset");
        assert_eq!(error.to_string(), "Transport error: connection reset");
    }

    #[test]
    fn test_stream_event_error_display() {
        let error = ChatStreamError::StreamEvent("session does not exist".to_string());
        assert_eq!(
            error.to_string(),
            "Agent service error: session does not exist"
        );
    }

    #[test]
    fn test_session_not_found_display() {
        let error = ChatStreamError::SessionNotFound("s1".to_string());
        assert_eq!(error.to_string(), "Session not found: s1");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let error: ChatStreamError = io_error.into();
        assert!(matches!(error, ChatStreamError::Io(_)));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{invalid json}").unwrap_err();
        let error: ChatStreamError = json_error.into();
        assert!(matches!(error, ChatStreamError::Serialization(_)));
    }

    #[test]
    fn test_yaml_error_conversion() {
        let yaml_error = serde_yaml::from_str::<serde_yaml::Value>("invalid: : yaml").unwrap_err();
        let error: ChatStreamError = yaml_error.into();
        assert!(matches!(error, ChatStreamError::Yaml(_)));
    }

    #[test]
    fn test_storage_error_display() {
        let error = ChatStreamError::Storage("database connection failed".to_string());
        assert_eq!(
            error.to_string(),
            "Storage error: database connection failed"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ChatStreamError>();
    }
}
