//! chatstream - Streaming client library for an AI agent chat service
//!
//! This library turns the server-sent event stream of a chat turn into a
//! structured assistant message and keeps the local session directory in
//! step with what the service reports.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `stream`: SSE frame decoding and event dispatch
//! - `timeline`: Assembly of the ordered block timeline of a reply
//! - `session`: Session directory abstraction and reconciliation
//! - `storage`: SQLite-backed session directory
//! - `transport`: Chat service transports (HTTP, replay)
//! - `turn`: Turn lifecycle controller
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//!
//! # Example
//!
//! ```
//! use chatstream::config::ChatConfig;
//! use chatstream::session::MemorySessionStore;
//! use chatstream::transport::{ChatRequest, ReplayTransport};
//! use chatstream::{Turn, TurnState};
//!
//! # tokio_test::block_on(async {
//! let transport = ReplayTransport::from_body(
//!     "data: {\"type\":\"content\",\"content\":\"Hello\"}\n\
//!      data: {\"type\":\"done\",\"content\":\"Hello\"}\n",
//!     16,
//! );
//! let store = MemorySessionStore::new();
//!
//! let turn = Turn::new(ChatRequest::new("Hi"), &ChatConfig::default());
//! let outcome = turn.run(&transport, &store).await.unwrap();
//! assert_eq!(outcome.state, TurnState::Completed);
//! assert_eq!(outcome.message.unwrap().answer(), "Hello");
//! # });
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod session;
pub mod storage;
pub mod stream;
pub mod timeline;
pub mod transport;
pub mod turn;

// Re-export commonly used types
pub use config::Config;
pub use error::{ChatStreamError, Result};
pub use session::{SessionRecord, SessionReconciler, SessionStore};
pub use stream::{decode_frames, dispatch, ChatEvent, EventRecord};
pub use timeline::{AssistantMessage, Block, BlockKind, TimelineAssembler};
pub use turn::{Turn, TurnOutcome, TurnState, TurnView};
