//! Turn controller
//!
//! A [`Turn`] drives one chat request end to end:
//!
//! ```text
//! IDLE -> SUBMITTING -> STREAMING -> { COMPLETED | CANCELLED | FAILED }
//! ```
//!
//! It opens the byte stream through a [`ChatTransport`], feeds it through
//! the frame decoder and the dispatcher, and applies every event to its own
//! [`TimelineAssembler`] and [`SessionReconciler`], in arrival order. The
//! timeline is owned by the turn; observers get read-only snapshots through
//! [`Turn::subscribe`].
//!
//! Transport failures and `error` events end the turn as `Failed` inside the
//! returned [`TurnOutcome`]. Cancellation ends it as `Cancelled`. Only
//! session store failures are returned as `Err`.
//!
//! Callers must not start a second turn for a session while one is still
//! streaming; nothing here guards against that.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ChatConfig;
use crate::error::Result;
use crate::session::{fallback_title, SessionChange, SessionReconciler, SessionRecord, SessionStore};
use crate::stream::{decode_frames, dispatch, ChatEvent};
use crate::timeline::{AssistantMessage, TimelineAssembler};
use crate::transport::{ChatRequest, ChatTransport};

/// Message used when the byte stream ends before `done`
pub const STREAM_CLOSED_EARLY: &str = "stream closed before the reply completed";

/// Lifecycle state of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnState {
    Idle,
    Submitting,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl TurnState {
    /// Whether the turn has ended
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TurnState::Completed | TurnState::Cancelled | TurnState::Failed
        )
    }
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TurnState::Idle => "idle",
            TurnState::Submitting => "submitting",
            TurnState::Streaming => "streaming",
            TurnState::Completed => "completed",
            TurnState::Cancelled => "cancelled",
            TurnState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Snapshot of a turn published to observers
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnView {
    pub state: TurnState,
    /// Session id, once known
    pub session_id: Option<String>,
    /// Assistant message; absent until the first block exists
    pub message: Option<AssistantMessage>,
    /// User-visible failure description
    pub error: Option<String>,
}

/// Final result of [`Turn::run`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    /// Terminal state
    pub state: TurnState,
    /// Session the turn belongs to, once known
    pub session_id: Option<String>,
    /// Session record as left by the reconciler
    pub session: Option<SessionRecord>,
    /// Assistant message; `None` when no block was ever created
    pub message: Option<AssistantMessage>,
    /// User-visible failure description for `Failed`
    pub error: Option<String>,
}

/// One user-initiated request/response cycle
#[derive(Debug)]
pub struct Turn {
    request: ChatRequest,
    fallback_title: String,
    token: CancellationToken,
    state: TurnState,
    views: watch::Sender<TurnView>,
}

impl Turn {
    /// Create an idle turn for `request`
    ///
    /// Assigns a fresh assistant message id when the request has none.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::config::ChatConfig;
    /// use chatstream::transport::ChatRequest;
    /// use chatstream::turn::{Turn, TurnState};
    ///
    /// let turn = Turn::new(ChatRequest::new("hello"), &ChatConfig::default());
    /// assert_eq!(turn.state(), TurnState::Idle);
    /// assert!(turn.request().message_id.is_some());
    /// ```
    pub fn new(mut request: ChatRequest, chat: &ChatConfig) -> Self {
        if request.message_id.is_none() {
            request.message_id = Some(Uuid::new_v4().to_string());
        }

        let fallback_title = fallback_title(
            &request.message,
            request.files.first().map(|file| file.filename.as_str()),
            chat,
        );

        let (views, _) = watch::channel(TurnView {
            state: TurnState::Idle,
            session_id: request.session_id.clone(),
            message: None,
            error: None,
        });

        Self {
            request,
            fallback_title,
            token: CancellationToken::new(),
            state: TurnState::Idle,
            views,
        }
    }

    /// Use `token` for cancellation instead of a private one
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.token = token;
        self
    }

    /// Token that cancels this turn
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Observe the turn; a new [`TurnView`] is published after every state
    /// transition and every applied event
    pub fn subscribe(&self) -> watch::Receiver<TurnView> {
        self.views.subscribe()
    }

    /// Current state
    pub fn state(&self) -> TurnState {
        self.state
    }

    /// The request this turn submits
    pub fn request(&self) -> &ChatRequest {
        &self.request
    }

    /// Run the turn to a terminal state
    ///
    /// # Errors
    ///
    /// Returns error only when the session store fails; every other failure
    /// is reported through [`TurnOutcome::error`]
    pub async fn run(
        mut self,
        transport: &dyn ChatTransport,
        store: &dyn SessionStore,
    ) -> Result<TurnOutcome> {
        let mut assembler = TimelineAssembler::new();
        let mut reconciler =
            SessionReconciler::new(self.fallback_title.clone(), self.request.session_id.clone());
        let mut session: Option<SessionRecord> = None;

        if let Some(id) = &self.request.session_id {
            session = store.get_session(id).await?;
        }

        self.transition(TurnState::Submitting, &assembler, &reconciler, None);

        let opened = tokio::select! {
            biased;
            _ = self.token.cancelled() => None,
            opened = transport.open_stream(&self.request) => Some(opened),
        };

        let stream = match opened {
            None => {
                return Ok(self.finish(TurnState::Cancelled, None, assembler, &reconciler, session));
            }
            Some(Err(e)) => {
                tracing::warn!("Chat request failed: {:#}", e);
                return Ok(self.finish(
                    TurnState::Failed,
                    Some(e.to_string()),
                    assembler,
                    &reconciler,
                    session,
                ));
            }
            Some(Ok(stream)) => stream,
        };

        self.transition(TurnState::Streaming, &assembler, &reconciler, None);

        let mut events = Box::pin(decode_frames(stream, self.token.clone()));
        let mut terminal: Option<(TurnState, Option<String>)> = None;

        while let Some(item) = events.next().await {
            let record = match item {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Chat stream failed: {:#}", e);
                    terminal = Some((TurnState::Failed, Some(e.to_string())));
                    break;
                }
            };

            let event = dispatch(record);
            let mut changed = assembler.apply(&event);

            match reconciler.apply(&event, store).await {
                Ok(Some(change)) => {
                    if let SessionChange::Created(record) = &change {
                        tracing::debug!("Turn created session {}", record.id);
                    }
                    session = Some(change.record().clone());
                    changed = true;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::error!("Session store failed: {:#}", e);
                    self.transition(
                        TurnState::Failed,
                        &assembler,
                        &reconciler,
                        Some(e.to_string()),
                    );
                    return Err(e);
                }
            }

            if changed {
                self.publish(&assembler, &reconciler, None);
            }

            match event {
                ChatEvent::Done { .. } => {
                    terminal = Some((TurnState::Completed, None));
                    break;
                }
                ChatEvent::Error { message } => {
                    terminal = Some((TurnState::Failed, Some(message)));
                    break;
                }
                _ => {}
            }
        }
        drop(events);

        let (state, error) = match terminal {
            Some(terminal) => terminal,
            None if self.token.is_cancelled() => (TurnState::Cancelled, None),
            None => (TurnState::Failed, Some(STREAM_CLOSED_EARLY.to_string())),
        };

        Ok(self.finish(state, error, assembler, &reconciler, session))
    }

    fn view(
        &self,
        assembler: &TimelineAssembler,
        reconciler: &SessionReconciler,
        error: Option<String>,
    ) -> TurnView {
        TurnView {
            state: self.state,
            session_id: reconciler.session_id().map(str::to_string),
            message: assembler
                .has_blocks()
                .then(|| assembler.message().clone()),
            error,
        }
    }

    fn publish(
        &self,
        assembler: &TimelineAssembler,
        reconciler: &SessionReconciler,
        error: Option<String>,
    ) {
        self.views
            .send_replace(self.view(assembler, reconciler, error));
    }

    fn transition(
        &mut self,
        next: TurnState,
        assembler: &TimelineAssembler,
        reconciler: &SessionReconciler,
        error: Option<String>,
    ) {
        tracing::debug!("Turn {} -> {}", self.state, next);
        self.state = next;
        self.publish(assembler, reconciler, error);
    }

    fn finish(
        mut self,
        state: TurnState,
        error: Option<String>,
        assembler: TimelineAssembler,
        reconciler: &SessionReconciler,
        session: Option<SessionRecord>,
    ) -> TurnOutcome {
        match (&state, &error) {
            (TurnState::Failed, Some(error)) => tracing::warn!("Turn failed: {}", error),
            (TurnState::Cancelled, _) if !assembler.has_blocks() => {
                tracing::debug!("Turn cancelled before any block; dropping assistant placeholder")
            }
            _ => {}
        }

        self.transition(state, &assembler, reconciler, error.clone());

        let message = assembler
            .has_blocks()
            .then(|| assembler.into_message());

        TurnOutcome {
            state,
            session_id: reconciler.session_id().map(str::to_string),
            session,
            message,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::timeline::BlockKind;
    use crate::transport::ReplayTransport;
    use std::time::Duration;

    const SCENARIO: &str = concat!(
        "data: {\"type\":\"start\",\"session_id\":\"s1\"}\n",
        "data: {\"type\":\"thinking\",\"content\":\"step1\"}\n",
        "data: {\"type\":\"thinking\",\"content\":\"step2\"}\n",
        "data: {\"type\":\"thinking_end\",\"duration\":2.0}\n",
        "data: {\"type\":\"content\",\"content\":\"Hello\"}\n",
        "data: {\"type\":\"done\",\"content\":\"Hello\",\"session_id\":\"s1\"}\n",
    );

    fn turn(message: &str) -> Turn {
        Turn::new(ChatRequest::new(message), &ChatConfig::default())
    }

    #[tokio::test]
    async fn test_scenario_completes_with_two_blocks() {
        let transport = ReplayTransport::from_body(SCENARIO, 7);
        let store = MemorySessionStore::new();

        let outcome = turn("hi").run(&transport, &store).await.unwrap();

        assert_eq!(outcome.state, TurnState::Completed);
        assert_eq!(outcome.session_id.as_deref(), Some("s1"));
        let message = outcome.message.expect("assistant message");
        assert!(message.complete);
        let blocks = message.timeline.blocks();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].kind(), BlockKind::Thinking);
        assert_eq!(blocks[0].text(), Some("step1step2"));
        assert_eq!(blocks[0].duration_seconds, Some(2.0));
        assert_eq!(blocks[1].kind(), BlockKind::Content);
        assert_eq!(blocks[1].text(), Some("Hello"));

        let sessions = store.list_sessions().await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "s1");
        assert_eq!(sessions[0].title, "hi");
    }

    #[tokio::test]
    async fn test_refused_request_fails_without_message() {
        let transport = ReplayTransport::refusing(400, "message must not be empty");
        let store = MemorySessionStore::new();

        let outcome = turn("x").run(&transport, &store).await.unwrap();

        assert_eq!(outcome.state, TurnState::Failed);
        assert!(outcome.message.is_none());
        let error = outcome.error.unwrap();
        assert!(error.contains("400"));
        assert!(error.contains("message must not be empty"));
    }

    #[tokio::test]
    async fn test_error_event_fails_and_keeps_populated_timeline() {
        let body = concat!(
            "data: {\"type\":\"content\",\"content\":\"partial\"}\n",
            "data: {\"type\":\"error\",\"content\":\"LLM unavailable\"}\n",
            "data: {\"type\":\"content\",\"content\":\"ignored\"}\n",
        );
        let transport = ReplayTransport::from_body(body, 64);
        let store = MemorySessionStore::new();

        let outcome = turn("x").run(&transport, &store).await.unwrap();

        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(outcome.error.as_deref(), Some("LLM unavailable"));
        let message = outcome.message.unwrap();
        assert_eq!(message.timeline.len(), 1);
        assert_eq!(message.timeline.blocks()[0].text(), Some("partial"));
    }

    #[tokio::test]
    async fn test_stream_end_without_done_fails() {
        let transport =
            ReplayTransport::from_body("data: {\"type\":\"content\",\"content\":\"a\"}\n", 5);
        let store = MemorySessionStore::new();

        let outcome = turn("x").run(&transport, &store).await.unwrap();

        assert_eq!(outcome.state, TurnState::Failed);
        assert_eq!(outcome.error.as_deref(), Some(STREAM_CLOSED_EARLY));
        assert!(outcome.message.is_some());
    }

    #[tokio::test]
    async fn test_cancel_before_open_is_cancelled() {
        let transport = ReplayTransport::from_body(SCENARIO, 64);
        let store = MemorySessionStore::new();
        let turn = turn("x");
        turn.token().cancel();

        let outcome = turn.run(&transport, &store).await.unwrap();

        assert_eq!(outcome.state, TurnState::Cancelled);
        assert!(outcome.message.is_none());
        assert!(outcome.error.is_none());
        assert!(store.list_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_mid_stream_keeps_timeline() {
        let transport = ReplayTransport::from_body(
            "data: {\"type\":\"content\",\"content\":\"Hel\"}\n",
            64,
        )
        .hold_open();
        let store = MemorySessionStore::new();
        let turn = turn("x");
        let token = turn.token();
        let mut views = turn.subscribe();

        let handle = tokio::spawn(async move { turn.run(&transport, &store).await });

        // Wait until the first block is visible, then cancel.
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                views.changed().await.unwrap();
                if views.borrow().message.is_some() {
                    break;
                }
            }
        })
        .await
        .unwrap();
        token.cancel();

        let outcome = handle.await.unwrap().unwrap();
        assert_eq!(outcome.state, TurnState::Cancelled);
        assert!(outcome.error.is_none());
        let message = outcome.message.unwrap();
        assert_eq!(message.timeline.blocks()[0].text(), Some("Hel"));
        assert!(!message.complete);
    }

    #[tokio::test]
    async fn test_subscribe_sees_terminal_view() {
        let transport = ReplayTransport::from_body(SCENARIO, 3);
        let store = MemorySessionStore::new();
        let turn = turn("hi");
        let views = turn.subscribe();

        turn.run(&transport, &store).await.unwrap();

        let last = views.borrow().clone();
        assert_eq!(last.state, TurnState::Completed);
        assert_eq!(last.session_id.as_deref(), Some("s1"));
        assert_eq!(last.message.unwrap().timeline.len(), 2);
    }

    #[tokio::test]
    async fn test_request_carries_message_id_and_session() {
        let transport = ReplayTransport::from_body(SCENARIO, 64);
        let store = MemorySessionStore::new();
        let request = ChatRequest::new("again").with_session_id("s1");

        Turn::new(request, &ChatConfig::default())
            .run(&transport, &store)
            .await
            .unwrap();

        let sent = transport.requests().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].session_id.as_deref(), Some("s1"));
        assert!(sent[0].message_id.is_some());
    }

    #[test]
    fn test_terminal_states() {
        assert!(!TurnState::Idle.is_terminal());
        assert!(!TurnState::Streaming.is_terminal());
        assert!(TurnState::Completed.is_terminal());
        assert!(TurnState::Cancelled.is_terminal());
        assert!(TurnState::Failed.is_terminal());
        assert_eq!(TurnState::Cancelled.to_string(), "cancelled");
    }
}
