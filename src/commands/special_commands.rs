//! Special commands parser for interactive chat mode
//!
//! Lines starting with `/` are handled locally instead of being sent to the
//! agent. They let the user:
//! - Start a new session or show the current one
//! - Attach and detach local files for the next turn
//! - Toggle deep-think streaming
//! - Display help information
//! - Exit the session
//!
//! Commands are case-insensitive; arguments (such as file paths) keep
//! their case.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Forget the current session; the next turn starts a new one
    NewSession,

    /// Show the current session id and title
    ShowSession,

    /// List sessions from the local store
    ListSessions,

    /// Attach a local file to the next turn
    Attach(PathBuf),

    /// Drop all pending attachments
    Detach,

    /// Turn deep-think streaming on or off
    DeepThink(bool),

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command; send the input to the agent
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns [`CommandError::UnknownCommand`] for an unrecognised `/` command,
/// [`CommandError::MissingArgument`] or [`CommandError::UnsupportedArgument`]
/// for malformed arguments.
///
/// # Examples
///
/// ```
/// use chatstream::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(parse_special_command("/new").unwrap(), SpecialCommand::NewSession);
/// assert_eq!(parse_special_command("/deep on").unwrap(), SpecialCommand::DeepThink(true));
/// assert_eq!(parse_special_command("hello agent").unwrap(), SpecialCommand::None);
/// assert!(parse_special_command("/foo").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') && lower != "exit" && lower != "quit" {
        return Ok(SpecialCommand::None);
    }

    // Only the command word is case-folded; arguments may be file paths.
    let (command, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((command, arg)) => (command.to_lowercase(), arg.trim()),
        None => (lower, ""),
    };

    match command.as_str() {
        "exit" | "quit" | "/exit" | "/quit" => Ok(SpecialCommand::Exit),
        "/new" => Ok(SpecialCommand::NewSession),
        "/session" => Ok(SpecialCommand::ShowSession),
        "/sessions" => Ok(SpecialCommand::ListSessions),
        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/detach" => Ok(SpecialCommand::Detach),

        "/attach" if arg.is_empty() => Err(CommandError::MissingArgument {
            command: "/attach".to_string(),
            usage: "/attach <path>".to_string(),
        }),
        "/attach" => Ok(SpecialCommand::Attach(PathBuf::from(arg))),

        "/deep" => match arg.to_lowercase().as_str() {
            "on" => Ok(SpecialCommand::DeepThink(true)),
            "off" => Ok(SpecialCommand::DeepThink(false)),
            "" => Err(CommandError::MissingArgument {
                command: "/deep".to_string(),
                usage: "/deep <on|off>".to_string(),
            }),
            other => Err(CommandError::UnsupportedArgument {
                command: "/deep".to_string(),
                arg: other.to_string(),
            }),
        },

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print help for the interactive chat commands
pub fn print_help() {
    println!(
        r#"
Special Commands for Interactive Chat Mode
==========================================

SESSIONS:
  /new            - Start a new session with the next message
  /session        - Show the current session
  /sessions       - List sessions in the local store

ATTACHMENTS:
  /attach <path>  - Attach a local file to the next message
  /detach         - Drop all pending attachments

STREAMING:
  /deep on        - Stream the agent's reasoning
  /deep off       - Only stream the answer

SESSION CONTROL:
  Ctrl-C          - Cancel the reply that is currently streaming
  /help, /?       - Show this help message
  exit, quit      - Exit interactive mode

NOTES:
  - Commands are case-insensitive
  - Regular text (not starting with /) is sent to the agent
"#
    );
}
