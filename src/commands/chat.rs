//! Chat command handler
//!
//! One turn with `--message`, otherwise a readline loop that keeps the
//! session between turns. While a reply streams, Ctrl-C cancels that turn
//! only; the loop continues.

use std::io::Write;
use std::path::PathBuf;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use super::render::{summary_line, LiveRenderer};
use super::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::{ChatConfig, Config};
use crate::error::{ChatStreamError, Result};
use crate::session::SessionStore;
use crate::transport::{Attachment, ChatRequest, ChatTransport};
use crate::turn::{Turn, TurnOutcome, TurnState};

/// Options for the chat command
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    /// Single message to send; interactive mode when absent
    pub message: Option<String>,
    /// Session to continue
    pub session: Option<String>,
    /// Stream the agent's reasoning
    pub deep_think: bool,
    /// Local files to attach
    pub attachments: Vec<PathBuf>,
    /// Print the outcome as JSON
    pub json: bool,
}

/// Run the chat command
///
/// # Errors
///
/// Returns error if an attachment cannot be read, the session store fails,
/// or a one-shot turn does not complete
pub async fn run_chat(
    config: Config,
    options: ChatOptions,
    transport: &dyn ChatTransport,
    store: &dyn SessionStore,
) -> Result<()> {
    let attachments = options
        .attachments
        .iter()
        .map(|path| Attachment::from_path(path))
        .collect::<Result<Vec<_>>>()?;
    let deep_think = options.deep_think || config.chat.enable_deep_think;

    match options.message {
        Some(message) => {
            let mut request = ChatRequest::new(message).with_deep_think(deep_think);
            request.session_id = options.session;
            request.files = attachments;

            let outcome = execute_turn(request, &config.chat, transport, store, options.json).await?;
            match outcome.state {
                TurnState::Completed | TurnState::Cancelled => Ok(()),
                _ => Err(ChatStreamError::StreamEvent(
                    outcome.error.unwrap_or_else(|| "turn failed".to_string()),
                )
                .into()),
            }
        }
        None => {
            let state = InteractiveState {
                session_id: options.session,
                attachments,
                deep_think,
                json: options.json,
            };
            run_interactive(&config.chat, state, transport, store).await
        }
    }
}

/// Run one turn, rendering it live unless `json` is set
///
/// Ctrl-C while the turn runs cancels it.
pub async fn execute_turn(
    request: ChatRequest,
    chat: &ChatConfig,
    transport: &dyn ChatTransport,
    store: &dyn SessionStore,
    json: bool,
) -> Result<TurnOutcome> {
    let turn = Turn::new(request, chat);

    let token = turn.token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Interrupt received, cancelling turn");
            token.cancel();
        }
    });

    let render_task = (!json).then(|| {
        let mut views = turn.subscribe();
        tokio::spawn(async move {
            let mut renderer = LiveRenderer::new();
            loop {
                let (chunk, done) = {
                    let view = views.borrow_and_update();
                    (renderer.render(&view), view.state.is_terminal())
                };
                print!("{}", chunk);
                let _ = std::io::stdout().flush();
                if done || views.changed().await.is_err() {
                    break;
                }
            }
            // Pick up a final snapshot published right before the turn ended.
            let chunk = renderer.render(&views.borrow());
            print!("{}", chunk);
            println!();
        })
    });

    let result = turn.run(transport, store).await;
    interrupt.abort();
    if let Some(task) = render_task {
        if let Err(e) = task.await {
            tracing::warn!("Renderer task failed: {}", e);
        }
    }
    let outcome = result?;

    if json {
        let rendered = serde_json::to_string_pretty(&outcome).map_err(ChatStreamError::from)?;
        println!("{}", rendered);
    } else {
        println!("{}\n", summary_line(&outcome));
    }

    Ok(outcome)
}

/// Mutable state of an interactive chat
#[derive(Debug, Clone, Default)]
struct InteractiveState {
    session_id: Option<String>,
    attachments: Vec<Attachment>,
    deep_think: bool,
    json: bool,
}

impl InteractiveState {
    /// Build the next request; pending attachments go with it
    fn next_request(&mut self, message: &str) -> ChatRequest {
        let mut request = ChatRequest::new(message).with_deep_think(self.deep_think);
        request.session_id = self.session_id.clone();
        request.files = std::mem::take(&mut self.attachments);
        request
    }

    fn prompt(&self) -> String {
        let session = self
            .session_id
            .as_deref()
            .map(|id| id.chars().take(8).collect::<String>())
            .unwrap_or_else(|| "new".to_string());
        let attached = if self.attachments.is_empty() {
            String::new()
        } else {
            format!(" +{}", self.attachments.len())
        };
        format!("[{}{}] >> ", session.cyan(), attached.yellow())
    }
}

async fn run_interactive(
    chat: &ChatConfig,
    mut state: InteractiveState,
    transport: &dyn ChatTransport,
    store: &dyn SessionStore,
) -> Result<()> {
    tracing::info!("Starting interactive chat mode");

    let mut rl = DefaultEditor::new().map_err(|e| {
        ChatStreamError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("Failed to initialize line editor: {}", e),
        ))
    })?;

    println!(
        "{} (type {} for commands, {} to leave)\n",
        "chatstream".bold(),
        "/help".cyan(),
        "exit".cyan()
    );

    loop {
        let line = match rl.readline(&state.prompt()) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => {
                println!("(type exit to quit)");
                continue;
            }
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        match parse_special_command(trimmed) {
            Ok(SpecialCommand::None) => {}
            Ok(SpecialCommand::Exit) => break,
            Ok(SpecialCommand::Help) => {
                print_help();
                continue;
            }
            Ok(SpecialCommand::NewSession) => {
                state.session_id = None;
                println!("{}", "Next message starts a new session.".green());
                continue;
            }
            Ok(SpecialCommand::ShowSession) => {
                match &state.session_id {
                    Some(id) => match store.get_session(id).await? {
                        Some(record) => println!("Session {} ({})", record.id.cyan(), record.title),
                        None => println!("Session {}", id.cyan()),
                    },
                    None => println!("{}", "No session yet.".yellow()),
                }
                continue;
            }
            Ok(SpecialCommand::ListSessions) => {
                for record in store.list_sessions().await? {
                    println!("{}  {}", record.id.cyan(), record.title);
                }
                continue;
            }
            Ok(SpecialCommand::Attach(path)) => {
                match Attachment::from_path(&path) {
                    Ok(attachment) => {
                        println!(
                            "{}",
                            format!(
                                "Attached {} ({} bytes, {})",
                                attachment.filename, attachment.size, attachment.content_type
                            )
                            .green()
                        );
                        state.attachments.push(attachment);
                    }
                    Err(e) => eprintln!("{}", format!("Error: {}", e).red()),
                }
                continue;
            }
            Ok(SpecialCommand::Detach) => {
                state.attachments.clear();
                println!("{}", "Attachments cleared.".green());
                continue;
            }
            Ok(SpecialCommand::DeepThink(enabled)) => {
                state.deep_think = enabled;
                println!("Deep think {}", if enabled { "on" } else { "off" });
                continue;
            }
            Err(e) => {
                eprintln!("{}", e.to_string().red());
                continue;
            }
        }

        let request = state.next_request(trimmed);
        let outcome = execute_turn(request, chat, transport, store, state.json).await?;
        if outcome.session_id.is_some() {
            state.session_id = outcome.session_id;
        }
    }

    println!("Goodbye!");
    Ok(())
}
