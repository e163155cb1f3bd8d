//! SSE frame decoding
//!
//! [`FrameDecoder`] is the synchronous half: it accumulates raw bytes, cuts
//! them into complete lines, and decodes every `data:` line into an
//! [`EventRecord`]. Framing happens on bytes rather than text, so a
//! multi-byte UTF-8 character split across two chunks is reassembled before
//! it is ever decoded (a `\n` byte never occurs inside a multi-byte
//! sequence).
//!
//! [`decode_frames`] is the asynchronous half: it pulls chunks from a byte
//! source one at a time, checks the cancellation token before each pull, and
//! yields records lazily. Cancellation ends the stream cleanly; a transport
//! error is yielded once and then the stream ends.
//!
//! Malformed frames (invalid UTF-8, invalid JSON, JSON without a `type`) are
//! dropped and decoding continues. A trailing partial line left when the
//! source ends is discarded, never parsed.

use std::collections::VecDeque;

use bytes::{Bytes, BytesMut};
use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::stream::event::EventRecord;

/// Prefix identifying payload lines
pub const DATA_PREFIX: &str = "data:";

/// Incremental line framer and JSON decoder for `data:` frames
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes received but not yet terminated by `\n`
    buffer: BytesMut,
    /// Prefix of `buffer` already known to contain no `\n`
    scanned: usize,
    /// Number of malformed frames dropped so far
    dropped: usize,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every record completed by it, in order
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::stream::FrameDecoder;
    ///
    /// let mut decoder = FrameDecoder::new();
    /// assert!(decoder.push(b"data: {\"type\":\"con").is_empty());
    /// let records = decoder.push(b"tent\",\"content\":\"hi\"}\n");
    /// assert_eq!(records.len(), 1);
    /// assert_eq!(records[0].content.as_deref(), Some("hi"));
    /// ```
    pub fn push(&mut self, chunk: &[u8]) -> Vec<EventRecord> {
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..].iter().position(|b| *b == b'\n') {
            let end = self.scanned + offset;
            let line = self.buffer.split_to(end + 1);
            self.scanned = 0;
            if let Some(record) = self.decode_line(&line[..end]) {
                records.push(record);
            }
        }
        self.scanned = self.buffer.len();

        records
    }

    /// Number of malformed frames dropped so far
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Number of buffered bytes not yet terminated by a newline
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Discard any incomplete trailing frame at end of input
    ///
    /// Returns the number of bytes thrown away.
    pub fn finish(&mut self) -> usize {
        let leftover = self.buffer.len();
        if leftover > 0 {
            tracing::debug!(bytes = leftover, "Discarding incomplete trailing frame");
        }
        self.buffer.clear();
        self.scanned = 0;
        leftover
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<EventRecord> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);

        let line = match std::str::from_utf8(raw) {
            Ok(line) => line,
            Err(e) => {
                self.dropped += 1;
                tracing::debug!("Dropping frame with invalid UTF-8: {}", e);
                return None;
            }
        };

        // Blank separators, comments and non-data fields carry nothing.
        let payload = line.strip_prefix(DATA_PREFIX)?;
        let payload = payload.strip_prefix(' ').unwrap_or(payload);

        match serde_json::from_str::<EventRecord>(payload) {
            Ok(record) => Some(record),
            Err(e) => {
                self.dropped += 1;
                tracing::debug!(payload = %payload, "Dropping malformed frame: {}", e);
                None
            }
        }
    }
}

struct DecodeState<S> {
    source: S,
    decoder: FrameDecoder,
    pending: VecDeque<EventRecord>,
    token: CancellationToken,
    finished: bool,
}

/// Decode a cancellable byte source into a lazy sequence of event records
///
/// The token is checked before every record is handed out and before every
/// chunk is requested; while waiting for a chunk the wait itself is raced
/// against the token. Either way a cancelled decode simply ends.
///
/// # Arguments
///
/// * `source` - Chunked response body
/// * `token` - Cancellation token for the owning turn
///
/// # Returns
///
/// A finite, non-restartable stream. Items are `Err` only for transport
/// failures reported by `source`; the stream ends right after such an item.
pub fn decode_frames<S>(
    source: S,
    token: CancellationToken,
) -> impl Stream<Item = Result<EventRecord>> + Send
where
    S: Stream<Item = Result<Bytes>> + Unpin + Send,
{
    let state = DecodeState {
        source,
        decoder: FrameDecoder::new(),
        pending: VecDeque::new(),
        token,
        finished: false,
    };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if st.token.is_cancelled() {
                tracing::debug!("Frame decoding cancelled");
                return None;
            }

            if let Some(record) = st.pending.pop_front() {
                return Some((Ok(record), st));
            }

            if st.finished {
                return None;
            }

            let next = tokio::select! {
                biased;
                _ = st.token.cancelled() => {
                    tracing::debug!("Frame decoding cancelled while awaiting chunk");
                    return None;
                }
                next = st.source.next() => next,
            };

            match next {
                Some(Ok(chunk)) => {
                    let records = st.decoder.push(&chunk);
                    st.pending.extend(records);
                }
                Some(Err(e)) => {
                    st.finished = true;
                    st.decoder.finish();
                    return Some((Err(e), st));
                }
                None => {
                    st.finished = true;
                    st.decoder.finish();
                    if st.decoder.dropped() > 0 {
                        tracing::debug!(
                            dropped = st.decoder.dropped(),
                            "Byte source ended with malformed frames dropped"
                        );
                    }
                }
            }
        }
    })
}
