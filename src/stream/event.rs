//! Wire event records and the typed event dispatcher
//!
//! Every `data: ` frame of a chat stream carries one JSON object tagged by a
//! `type` field. [`EventRecord`] is the loosely typed wire shape: every field
//! except `type` is optional, because each event kind only uses a few of them.
//!
//! [`dispatch`] turns a record into a [`ChatEvent`], a closed sum type that
//! the timeline assembler and the session reconciler match on exhaustively.
//! Tags this client does not know map to [`ChatEvent::Unknown`] so that new
//! server event kinds never break an older client.

use serde::{Deserialize, Serialize};

/// One decoded SSE frame
///
/// Transient: built by the frame decoder, consumed by [`dispatch`], then
/// dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event tag (`thinking`, `content`, `tool_call`, ...)
    #[serde(rename = "type")]
    pub event_type: String,

    /// Text payload for `thinking`, `content`, `done` and `error`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Tool name for `tool_call` and `tool_result`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Tool call id for `tool_call` and `tool_result`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// Tool arguments for `tool_call`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<serde_json::Value>,

    /// Tool output for `tool_result`; any JSON value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Tool success flag for `tool_result`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,

    /// Duration in seconds for `tool_result` and `thinking_end`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,

    /// Thinking duration in seconds carried by `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_duration: Option<f64>,

    /// Session identity for `start` and `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Session title for `start` and `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Assistant message id for `start` and `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,

    /// Agent step count reported by `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps: Option<u64>,

    /// Tool call count reported by `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<u64>,
}

impl EventRecord {
    /// Create a record with only the `type` tag set
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    /// Builder helper setting `content`
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Builder helper setting `session_id`
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Builder helper setting `title`
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Builder helper setting `duration`
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration = Some(seconds);
        self
    }
}

/// Session identity carried by `start` and `done`
#[derive(Debug, Clone, PartialEq)]
pub struct SessionIdentity {
    /// Server-assigned session id
    pub session_id: String,
    /// Title suggested by the server, if any
    pub title: Option<String>,
}

/// Agent statistics reported with `done`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnStats {
    /// Number of agent steps
    pub steps: Option<u64>,
    /// Number of tool calls
    pub tool_calls: Option<u64>,
}

/// Typed chat stream event
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// The service failed the turn
    Error { message: String },
    /// Turn accepted; may assign the session
    Start {
        identity: Option<SessionIdentity>,
        message_id: Option<String>,
    },
    /// Marker before the first thinking chunk
    ThinkingStart,
    /// A chunk of reasoning text
    Thinking { content: String },
    /// Reasoning finished
    ThinkingEnd { duration: Option<f64> },
    /// Marker before the first answer chunk
    AssistantStart,
    /// A chunk of answer text
    Content { content: String },
    /// The agent invoked a tool
    ToolCall {
        tool_name: String,
        tool_call_id: Option<String>,
        arguments: serde_json::Value,
    },
    /// A tool returned
    ToolResult {
        tool_name: Option<String>,
        tool_call_id: Option<String>,
        result: String,
        success: bool,
        duration: Option<f64>,
    },
    /// Turn complete
    Done {
        content: Option<String>,
        identity: Option<SessionIdentity>,
        message_id: Option<String>,
        thinking_duration: Option<f64>,
        stats: TurnStats,
    },
    /// A tag this client does not understand
    Unknown { event_type: String },
}

impl ChatEvent {
    /// The session identity carried by this event, if any
    pub fn identity(&self) -> Option<&SessionIdentity> {
        match self {
            ChatEvent::Start { identity, .. } | ChatEvent::Done { identity, .. } => {
                identity.as_ref()
            }
            _ => None,
        }
    }

    /// Whether this event terminates the turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, ChatEvent::Done { .. } | ChatEvent::Error { .. })
    }
}

/// Map a decoded record onto its typed event
///
/// Dispatch is a pure function of the record. Missing optional fields fall
/// back to empty values rather than failing, since the stream must stay
/// renderable even when the server omits something.
pub fn dispatch(record: EventRecord) -> ChatEvent {
    let identity = record.session_id.map(|session_id| SessionIdentity {
        session_id,
        title: record.title,
    });

    match record.event_type.as_str() {
        "error" => ChatEvent::Error {
            message: record.content.unwrap_or_default(),
        },
        "start" => ChatEvent::Start {
            identity,
            message_id: record.message_id,
        },
        "thinking_start" => ChatEvent::ThinkingStart,
        "thinking" => ChatEvent::Thinking {
            content: record.content.unwrap_or_default(),
        },
        "thinking_end" => ChatEvent::ThinkingEnd {
            duration: record.duration,
        },
        "assistant_start" => ChatEvent::AssistantStart,
        "content" => ChatEvent::Content {
            content: record.content.unwrap_or_default(),
        },
        "tool_call" => ChatEvent::ToolCall {
            tool_name: record.tool_name.unwrap_or_default(),
            tool_call_id: record.tool_call_id,
            arguments: record.arguments.unwrap_or(serde_json::Value::Null),
        },
        "tool_result" => ChatEvent::ToolResult {
            tool_name: record.tool_name,
            tool_call_id: record.tool_call_id,
            result: result_text(record.result),
            success: record.success.unwrap_or(false),
            duration: record.duration,
        },
        "done" => ChatEvent::Done {
            content: record.content,
            identity,
            message_id: record.message_id,
            thinking_duration: record.thinking_duration,
            stats: TurnStats {
                steps: record.steps,
                tool_calls: record.tool_calls,
            },
        },
        _ => ChatEvent::Unknown {
            event_type: record.event_type,
        },
    }
}

/// Strings are kept verbatim, other JSON values as compact JSON text
fn result_text(result: Option<serde_json::Value>) -> String {
    match result {
        None | Some(serde_json::Value::Null) => String::new(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}
