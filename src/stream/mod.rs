//! Chat stream decoding and event dispatch
//!
//! - [`decoder`]: bytes -> [`EventRecord`] (line framing, `data:` extraction,
//!   JSON decode, cancellation)
//! - [`event`]: [`EventRecord`] -> [`ChatEvent`] (the typed dispatcher)

pub mod decoder;
pub mod event;

pub use decoder::{decode_frames, FrameDecoder};
pub use event::{dispatch, ChatEvent, EventRecord, SessionIdentity, TurnStats};
