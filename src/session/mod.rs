//! Session directory and the session reconciler
//!
//! A chat turn may start without a session; the agent service then assigns
//! one and announces it on the `start` (and again on the `done`) event.
//! [`SessionReconciler`] watches for those identity-bearing events and makes
//! sure the session directory holds exactly one [`SessionRecord`] per id,
//! titled from the server's title or a fallback derived from the user input.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ChatConfig;
use crate::error::Result;
use crate::stream::event::ChatEvent;

pub mod memory;

pub use memory::MemorySessionStore;

/// One entry of the session directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Server-assigned session id
    pub id: String,
    /// Display title
    pub title: String,
    /// When this client first saw the session
    pub created_at: DateTime<Utc>,
}

impl SessionRecord {
    /// Create a record stamped with the current time
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }
}

/// Session directory
///
/// Only ever appended to or renamed; streaming never deletes or reorders
/// entries. Implementations must make [`SessionStore::get_or_create`]
/// atomic so concurrent turns cannot create the same id twice.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// All sessions, in creation order
    async fn list_sessions(&self) -> Result<Vec<SessionRecord>>;

    /// Look up a session by id
    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>>;

    /// Return the session with `id`, creating it with `title` if absent
    ///
    /// The boolean is `true` when this call created the record.
    async fn get_or_create(&self, id: &str, title: &str) -> Result<(SessionRecord, bool)>;

    /// Replace the title of an existing session
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ChatStreamError::SessionNotFound`] if no
    /// session has that id
    async fn rename(&self, id: &str, title: &str) -> Result<SessionRecord>;
}

/// Fallback title for a session created from a turn
///
/// Uses the trimmed user text, else the first attachment's file name, cut to
/// `title_max_chars` characters with `...` appended when cut; else the
/// configured default title.
///
/// # Examples
///
/// ```
/// use chatstream::config::ChatConfig;
/// use chatstream::session::fallback_title;
///
/// let chat = ChatConfig::default();
/// assert_eq!(fallback_title("  hi there  ", None, &chat), "hi there");
/// assert_eq!(fallback_title("summarize this report", None, &chat), "summarize th...");
/// assert_eq!(fallback_title("", Some("q3.pdf"), &chat), "q3.pdf");
/// assert_eq!(fallback_title(" ", None, &chat), "New chat");
/// ```
pub fn fallback_title(user_text: &str, attachment_name: Option<&str>, chat: &ChatConfig) -> String {
    let source = Some(user_text.trim())
        .filter(|text| !text.is_empty())
        .or_else(|| attachment_name.map(str::trim).filter(|name| !name.is_empty()));

    match source {
        Some(text) => truncate_title(text, chat.title_max_chars),
        None => chat.default_title.clone(),
    }
}

fn truncate_title(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// What a reconciliation step did to the session directory
#[derive(Debug, Clone, PartialEq)]
pub enum SessionChange {
    /// A new record was created
    Created(SessionRecord),
    /// An existing record got a new title
    Renamed(SessionRecord),
    /// The record already matched the event
    Unchanged(SessionRecord),
}

impl SessionChange {
    /// The record after the change
    pub fn record(&self) -> &SessionRecord {
        match self {
            SessionChange::Created(record)
            | SessionChange::Renamed(record)
            | SessionChange::Unchanged(record) => record,
        }
    }
}

/// Creates or updates the session record of one turn
///
/// Idempotent: applying the same `start`/`done` events again never creates
/// a second record and leaves an already matching title alone.
#[derive(Debug, Clone)]
pub struct SessionReconciler {
    fallback_title: String,
    session_id: Option<String>,
}

impl SessionReconciler {
    /// Create a reconciler for a turn
    ///
    /// `session_id` is the session the turn was submitted to, if any.
    pub fn new(fallback_title: impl Into<String>, session_id: Option<String>) -> Self {
        Self {
            fallback_title: fallback_title.into(),
            session_id,
        }
    }

    /// Session id known so far
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Apply one event
    ///
    /// Events without a session identity are ignored and return `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Propagates session store failures
    pub async fn apply(
        &mut self,
        event: &ChatEvent,
        store: &dyn SessionStore,
    ) -> Result<Option<SessionChange>> {
        let Some(identity) = event.identity() else {
            return Ok(None);
        };

        if let Some(previous) = &self.session_id {
            if previous != &identity.session_id {
                tracing::warn!(
                    "Service switched session mid-turn: {} -> {}",
                    previous,
                    identity.session_id
                );
            }
        }
        self.session_id = Some(identity.session_id.clone());

        let event_title = identity
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty());
        let initial_title = event_title.unwrap_or(&self.fallback_title);

        let (record, created) = store
            .get_or_create(&identity.session_id, initial_title)
            .await?;
        if created {
            tracing::debug!("Created session {} ({})", record.id, record.title);
            return Ok(Some(SessionChange::Created(record)));
        }

        match event_title {
            Some(title) if title != record.title => {
                let record = store.rename(&record.id, title).await?;
                tracing::debug!("Renamed session {} to {}", record.id, record.title);
                Ok(Some(SessionChange::Renamed(record)))
            }
            _ => Ok(Some(SessionChange::Unchanged(record))),
        }
    }
}
