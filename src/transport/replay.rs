//! Replay transport
//!
//! Plays back a captured response body instead of talking to the service.
//! Used by the `replay` command and as a scripted byte source in tests.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{ByteStream, ChatRequest, ChatTransport, RemoteSession};
use crate::error::{ChatStreamError, Result};

#[derive(Debug, Clone)]
enum Tail {
    /// End the stream after the last chunk
    Close,
    /// Never end; only cancellation stops the consumer
    HoldOpen,
    /// Yield a transport error after the last chunk
    Fail(String),
}

/// [`ChatTransport`] that replays fixed chunks for every request
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    chunks: Vec<Bytes>,
    tail: Tail,
    refuse: Option<(u16, String)>,
    sessions: Vec<RemoteSession>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ReplayTransport {
    /// Replay the given chunks in order
    pub fn from_chunks<I, B>(chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            tail: Tail::Close,
            refuse: None,
            sessions: Vec::new(),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Replay `body`, split into chunks of at most `chunk_size` bytes
    ///
    /// Chunk boundaries fall at arbitrary byte offsets, including inside
    /// multi-byte characters.
    pub fn from_body(body: impl Into<Bytes>, chunk_size: usize) -> Self {
        let body: Bytes = body.into();
        let size = chunk_size.max(1);
        let chunks = (0..body.len())
            .step_by(size)
            .map(|start| body.slice(start..(start + size).min(body.len())))
            .collect::<Vec<_>>();
        Self::from_chunks(chunks)
    }

    /// Replay a captured transcript file
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read
    pub fn from_file(path: &Path, chunk_size: usize) -> Result<Self> {
        let body = std::fs::read(path).map_err(|e| {
            ChatStreamError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to read transcript {}: {}", path.display(), e),
            ))
        })?;
        Ok(Self::from_body(body, chunk_size))
    }

    /// Refuse every request with the given HTTP status and detail message
    pub fn refusing(status: u16, message: impl Into<String>) -> Self {
        let mut transport = Self::from_chunks(Vec::<Bytes>::new());
        transport.refuse = Some((status, message.into()));
        transport
    }

    /// Keep the stream open after the last chunk
    pub fn hold_open(mut self) -> Self {
        self.tail = Tail::HoldOpen;
        self
    }

    /// Fail the stream with a transport error after the last chunk
    pub fn then_fail(mut self, message: impl Into<String>) -> Self {
        self.tail = Tail::Fail(message.into());
        self
    }

    /// Sessions returned by [`ChatTransport::list_sessions`]
    pub fn with_sessions(mut self, sessions: Vec<RemoteSession>) -> Self {
        self.sessions = sessions;
        self
    }

    /// Requests received so far
    pub async fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl ChatTransport for ReplayTransport {
    async fn open_stream(&self, request: &ChatRequest) -> Result<ByteStream> {
        self.requests.lock().await.push(request.clone());

        if let Some((status, message)) = &self.refuse {
            return Err(ChatStreamError::Transport {
                status: Some(*status),
                message: message.clone(),
            }
            .into());
        }

        let body = futures::stream::iter(self.chunks.clone().into_iter().map(Ok));
        let stream: ByteStream = match &self.tail {
            Tail::Close => body.boxed(),
            Tail::HoldOpen => body.chain(futures::stream::pending()).boxed(),
            Tail::Fail(message) => {
                let error = ChatStreamError::transport(message.clone());
                body.chain(futures::stream::once(async move {
                    Err(anyhow::anyhow!(error))
                }))
                .boxed()
            }
        };
        Ok(stream)
    }

    async fn list_sessions(&self, limit: u32, offset: u32) -> Result<Vec<RemoteSession>> {
        Ok(self
            .sessions
            .iter()
            .skip(offset as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(transport: &ReplayTransport) -> Vec<Result<Bytes>> {
        let stream = transport
            .open_stream(&ChatRequest::new("hi"))
            .await
            .unwrap();
        stream.collect().await
    }

    #[tokio::test]
    async fn test_from_body_splits_into_chunks() {
        let transport = ReplayTransport::from_body("abcdefg", 3);
        let chunks: Vec<Bytes> = collect(&transport)
            .await
            .into_iter()
            .map(|c| c.unwrap())
            .collect();
        assert_eq!(
            chunks,
            vec![
                Bytes::from_static(b"abc"),
                Bytes::from_static(b"def"),
                Bytes::from_static(b"g")
            ]
        );
    }

    #[tokio::test]
    async fn test_refusing_returns_transport_error() {
        let transport = ReplayTransport::refusing(404, "Session not found");
        let err = transport
            .open_stream(&ChatRequest::new("hi"))
            .await
            .err()
            .unwrap();
        match err.downcast_ref::<ChatStreamError>() {
            Some(ChatStreamError::Transport { status, message }) => {
                assert_eq!(*status, Some(404));
                assert_eq!(message, "Session not found");
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_then_fail_appends_error() {
        let transport = ReplayTransport::from_chunks(["a"]).then_fail("reset");
        let items = collect(&transport).await;
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn test_records_requests() {
        let transport = ReplayTransport::from_chunks(Vec::<Bytes>::new());
        transport
            .open_stream(&ChatRequest::new("first").with_session_id("s1"))
            .await
            .unwrap();
        let requests = transport.requests().await;
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].session_id.as_deref(), Some("s1"));
    }

    #[tokio::test]
    async fn test_list_sessions_pages() {
        let sessions = (0..5)
            .map(|i| RemoteSession {
                session_id: format!("s{}", i),
                title: format!("t{}", i),
                created_at: None,
                updated_at: None,
                message_count: 0,
            })
            .collect();
        let transport = ReplayTransport::from_chunks(Vec::<Bytes>::new()).with_sessions(sessions);
        let page = transport.list_sessions(2, 1).await.unwrap();
        let ids: Vec<&str> = page.iter().map(|s| s.session_id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
    }
}
