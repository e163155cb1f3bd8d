//! HTTP transport for the agent service
//!
//! `POST {base_url}/api/chat/stream` returns `text/event-stream`; the body is
//! handed to the frame decoder untouched. Failures before the body starts
//! (connection errors, non-success status) become
//! [`ChatStreamError::Transport`] carrying the service's `detail` message.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;

use super::{ByteStream, ChatRequest, ChatTransport, RemoteSession};
use crate::config::ServerConfig;
use crate::error::{ChatStreamError, Result};

/// reqwest-backed [`ChatTransport`]
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client initialization fails
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::config::ServerConfig;
    /// use chatstream::transport::HttpTransport;
    ///
    /// let transport = HttpTransport::new(&ServerConfig::default()).unwrap();
    /// assert_eq!(transport.base_url(), "http://localhost:8000");
    /// ```
    pub fn new(config: &ServerConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .user_agent(concat!("chatstream/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                ChatStreamError::Config(format!("Failed to create HTTP client: {}", e))
            })?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        tracing::debug!("Initialized HTTP transport: base_url={}", base_url);

        Ok(Self { client, base_url })
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        let url = self.endpoint("/api/chat/stream");
        tracing::debug!(
            "Opening chat stream: url={}, session={:?}, files={}",
            url,
            request.session_id,
            request.files.len()
        );

        let response = self
            .client
            .post(&url)
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Chat request failed: {}", e);
                ChatStreamError::transport(format!("Chat request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            tracing::error!("Agent service returned error {}: {}", status, message);
            return Err(ChatStreamError::Transport {
                status: Some(status.as_u16()),
                message,
            }
            .into());
        }

        let stream = response.bytes_stream().map(|chunk| {
            chunk.map_err(|e| {
                anyhow::anyhow!(ChatStreamError::transport(format!(
                    "Stream read failed: {}",
                    e
                )))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn list_sessions(&self, limit: u32, offset: u32) -> Result<Vec<RemoteSession>> {
        let url = self.endpoint("/api/sessions");
        tracing::debug!("Listing remote sessions: limit={}, offset={}", limit, offset);

        let response = self
            .client
            .get(&url)
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await
            .map_err(|e| ChatStreamError::transport(format!("Session list request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_detail(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            return Err(ChatStreamError::Transport {
                status: Some(status.as_u16()),
                message,
            }
            .into());
        }

        let sessions: Vec<RemoteSession> = response.json().await.map_err(|e| {
            ChatStreamError::transport(format!("Failed to parse session list: {}", e))
        })?;

        Ok(sessions)
    }
}

/// Extract the human readable message from an error body
///
/// Prefers `{"detail": "..."}`; non-string details (validation error lists)
/// are rendered as JSON. Falls back to the trimmed body text.
fn error_detail(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) => Some(other.to_string()),
            None => Some(trimmed.to_string()),
        },
        _ => Some(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_detail_prefers_detail_field() {
        assert_eq!(
            error_detail(r#"{"detail":"Session not found"}"#).as_deref(),
            Some("Session not found")
        );
    }

    #[test]
    fn test_error_detail_renders_structured_detail() {
        let detail = error_detail(r#"{"detail":[{"loc":["body","message"]}]}"#).unwrap();
        assert!(detail.starts_with('['));
        assert!(detail.contains("message"));
    }

    #[test]
    fn test_error_detail_falls_back_to_body() {
        assert_eq!(
            error_detail("  Bad Gateway \n").as_deref(),
            Some("Bad Gateway")
        );
        assert_eq!(error_detail(""), None);
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let config = ServerConfig {
            base_url: "http://agent.local:8000/".to_string(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        assert_eq!(
            transport.endpoint("/api/chat/stream"),
            "http://agent.local:8000/api/chat/stream"
        );
    }
}
