//! Chat transport abstraction
//!
//! The turn controller only needs a byte-chunk source for one chat request,
//! plus enough HTTP detail to report failures that happen before streaming
//! starts. [`ChatTransport`] is that seam:
//!
//! - [`http::HttpTransport`] talks to the agent service over reqwest
//! - [`replay::ReplayTransport`] plays back captured bytes (tests, `replay`)

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::pin::Pin;

use crate::error::{ChatStreamError, Result};

pub mod http;
pub mod replay;

pub use http::HttpTransport;
pub use replay::ReplayTransport;

/// Raw response body of one streamed turn
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Descriptor of a file attached to a turn
///
/// Opaque to the streaming core; serialized as-is into the request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// File name shown to the user
    pub filename: String,
    /// Size in bytes
    pub size: u64,
    /// MIME type
    pub content_type: String,
    /// Location of the file as known to the agent service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

impl Attachment {
    /// Build a descriptor from a local file's metadata
    ///
    /// Nothing is uploaded; `file_path` is set to the path as given.
    ///
    /// # Errors
    ///
    /// Returns an IO error if the file does not exist or is not a regular file
    pub fn from_path(path: &Path) -> Result<Self> {
        let metadata = std::fs::metadata(path)?;
        if !metadata.is_file() {
            return Err(anyhow::anyhow!(ChatStreamError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ))));
        }

        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            content_type: content_type_for(&filename).to_string(),
            filename,
            size: metadata.len(),
            file_path: Some(path.display().to_string()),
        })
    }
}

/// MIME type for a file name, by extension
pub fn content_type_for(filename: &str) -> &'static str {
    let extension = Path::new(filename)
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => "application/octet-stream",
    }
}

/// Body of one chat turn request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The user's message text
    pub message: String,
    /// Existing session to continue; the service creates one when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Client-chosen id for the assistant message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Ask the agent to stream its reasoning
    #[serde(default)]
    pub enable_deep_think: bool,
    /// Attached file descriptors
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<Attachment>,
}

impl ChatRequest {
    /// Create a request for `message` with no session
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Continue the given session
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Set the deep-think flag
    pub fn with_deep_think(mut self, enabled: bool) -> Self {
        self.enable_deep_think = enabled;
        self
    }

    /// Attach a file descriptor
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.files.push(attachment);
        self
    }
}

/// Session summary as listed by the agent service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteSession {
    pub session_id: String,
    pub title: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub message_count: u64,
}

/// Source of chat turn byte streams
///
/// # Examples
///
/// ```
/// use chatstream::transport::{ByteStream, ChatRequest, ChatTransport, RemoteSession};
/// use chatstream::error::Result;
/// use async_trait::async_trait;
/// use futures::StreamExt;
///
/// #[derive(Debug)]
/// struct Silent;
///
/// #[async_trait]
/// impl ChatTransport for Silent {
///     async fn open_stream(&self, _request: &ChatRequest) -> Result<ByteStream> {
///         Ok(futures::stream::empty().boxed())
///     }
///
///     async fn list_sessions(&self, _limit: u32, _offset: u32) -> Result<Vec<RemoteSession>> {
///         Ok(Vec::new())
///     }
/// }
/// ```
#[async_trait]
pub trait ChatTransport: Send + Sync + std::fmt::Debug {
    /// Submit one turn and return its response body
    ///
    /// Resolves once the response headers arrived. A non-success status is
    /// an `Err` carrying [`ChatStreamError::Transport`].
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream>;

    /// List sessions known to the agent service
    async fn list_sessions(&self, limit: u32, offset: u32) -> Result<Vec<RemoteSession>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_content_type_for_known_extensions() {
        assert_eq!(content_type_for("report.PDF"), "application/pdf");
        assert_eq!(content_type_for("photo.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("photo.jpg"), "image/jpeg");
        assert_eq!(
            content_type_for("sheet.xlsx"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        );
    }

    #[test]
    fn test_content_type_for_unknown_extension() {
        assert_eq!(content_type_for("archive.tar.zst"), "application/octet-stream");
        assert_eq!(content_type_for("Makefile"), "application/octet-stream");
    }

    #[test]
    fn test_attachment_from_path_reads_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(b"# hello").unwrap();

        let attachment = Attachment::from_path(&path).unwrap();
        assert_eq!(attachment.filename, "notes.md");
        assert_eq!(attachment.size, 7);
        assert_eq!(attachment.content_type, "text/markdown");
        assert!(attachment.file_path.unwrap().ends_with("notes.md"));
    }

    #[test]
    fn test_attachment_from_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Attachment::from_path(&dir.path().join("missing.pdf")).is_err());
        assert!(Attachment::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_chat_request_serializes_server_shape() {
        let request = ChatRequest::new("hi")
            .with_session_id("s1")
            .with_deep_think(true)
            .with_attachment(Attachment {
                filename: "a.pdf".to_string(),
                size: 10,
                content_type: "application/pdf".to_string(),
                file_path: None,
            });
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["message"], "hi");
        assert_eq!(value["session_id"], "s1");
        assert_eq!(value["enable_deep_think"], true);
        assert_eq!(value["files"][0]["filename"], "a.pdf");
        assert!(value.get("message_id").is_none());
        assert!(value["files"][0].get("file_path").is_none());
    }

    #[test]
    fn test_chat_request_omits_empty_files() {
        let value = serde_json::to_value(ChatRequest::new("hi")).unwrap();
        assert!(value.get("files").is_none());
        assert!(value.get("session_id").is_none());
        assert_eq!(value["enable_deep_think"], false);
    }

    #[test]
    fn test_remote_session_tolerates_missing_fields() {
        let session: RemoteSession =
            serde_json::from_str(r#"{"session_id":"s1","title":"Hello"}"#).unwrap();
        assert_eq!(session.message_count, 0);
        assert!(session.created_at.is_none());
    }
}
