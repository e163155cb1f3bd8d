//! Command-line interface definition for chatstream
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for streaming chat turns, managing sessions and
//! replaying captured event streams.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatstream - Streaming client for an AI agent chat service
///
/// Sends chat turns to the agent service and renders the streamed reply
/// (thinking, tool calls, tool results, answer) as it arrives.
#[derive(Parser, Debug, Clone)]
#[command(name = "chatstream")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/config.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the agent service base URL
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Override the session history database path
    #[arg(long, global = true)]
    pub storage_path: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for chatstream
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Chat with the agent (one turn with --message, otherwise interactive)
    Chat {
        /// Send a single message and exit when the reply completes
        #[arg(short, long)]
        message: Option<String>,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,

        /// Ask the agent to stream its reasoning
        #[arg(long)]
        deep_think: bool,

        /// Attach a local file (metadata only); may be repeated
        #[arg(long = "attach", value_name = "PATH")]
        attachments: Vec<PathBuf>,

        /// Print the final turn outcome as JSON instead of live rendering
        #[arg(long)]
        json: bool,
    },

    /// Manage chat sessions
    Sessions {
        /// Session management subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Replay a captured event stream transcript
    Replay {
        /// File containing raw `data: ` frames
        file: PathBuf,

        /// Print the assembled message as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Session management subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// List known sessions
    List {
        /// List sessions from the agent service instead of the local store
        #[arg(long)]
        remote: bool,

        /// Maximum number of remote sessions to fetch
        #[arg(long, default_value_t = 50)]
        limit: u32,

        /// Offset into the remote session list
        #[arg(long, default_value_t = 0)]
        offset: u32,
    },

    /// Rename a session in the local store
    Rename {
        /// Session id
        id: String,

        /// New title
        title: String,
    },

    /// Copy the agent service's session list into the local store
    Sync {
        /// Maximum number of remote sessions to fetch
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/config.yaml".to_string()),
            verbose: false,
            base_url: None,
            storage_path: None,
            command: Commands::Sessions {
                command: SessionCommand::List {
                    remote: false,
                    limit: 50,
                    offset: 0,
                },
            },
        }
    }
}
