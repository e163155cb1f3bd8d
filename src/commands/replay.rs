//! Replay a captured chat stream transcript
//!
//! Feeds a file of raw `data: ` frames through the same decoder, dispatcher,
//! assembler and reconciler as a live turn, using an in-memory session
//! store, then prints the assembled reply.

use crate::config::Config;
use crate::error::{ChatStreamError, Result};
use crate::session::MemorySessionStore;
use crate::transport::{ChatRequest, ReplayTransport};
use crate::turn::{Turn, TurnOutcome};
use colored::Colorize;
use std::path::Path;

use super::render::{render_message, summary_line};

/// Chunk size used when replaying a transcript
///
/// Small on purpose so frames straddle chunk boundaries the way they do on
/// a slow network.
pub const REPLAY_CHUNK_BYTES: usize = 61;

/// Replay `file` and return the outcome
///
/// # Errors
///
/// Returns error if the transcript cannot be read
///
/// # Examples
///
/// ```
/// use chatstream::commands::replay::replay_transcript;
/// use chatstream::config::Config;
/// use chatstream::turn::TurnState;
/// use std::io::Write;
///
/// # tokio_test::block_on(async {
/// let mut file = tempfile::NamedTempFile::new().unwrap();
/// writeln!(file, r#"data: {{"type":"content","content":"Hi"}}"#).unwrap();
/// writeln!(file, r#"data: {{"type":"done","content":"Hi"}}"#).unwrap();
///
/// let outcome = replay_transcript(&Config::default(), file.path()).await.unwrap();
/// assert_eq!(outcome.state, TurnState::Completed);
/// # });
/// ```
pub async fn replay_transcript(config: &Config, file: &Path) -> Result<TurnOutcome> {
    let transport = ReplayTransport::from_file(file, REPLAY_CHUNK_BYTES)?;
    let store = MemorySessionStore::new();

    tracing::debug!("Replaying transcript {}", file.display());
    Turn::new(ChatRequest::new(""), &config.chat)
        .run(&transport, &store)
        .await
}

/// Run the replay command
///
/// # Arguments
///
/// * `config` - Global configuration
/// * `file` - Transcript file
/// * `json` - Print the outcome as JSON
///
/// # Errors
///
/// Returns error if the transcript cannot be read or serialized
pub async fn run_replay(config: &Config, file: &Path, json: bool) -> Result<()> {
    let outcome = replay_transcript(config, file).await?;

    if json {
        let rendered = serde_json::to_string_pretty(&outcome).map_err(ChatStreamError::from)?;
        println!("{}", rendered);
        return Ok(());
    }

    match &outcome.message {
        Some(message) => println!("{}", render_message(message)),
        None => println!("{}", "(no assistant message)".yellow()),
    }
    println!();
    println!("{}", summary_line(&outcome));

    Ok(())
}
