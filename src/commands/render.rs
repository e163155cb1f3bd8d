//! Terminal rendering of turn snapshots
//!
//! [`LiveRenderer`] turns the stream of [`TurnView`] snapshots published by
//! a running turn into incremental terminal output: new blocks get a header,
//! growing text blocks only print what was appended since the last snapshot.

use colored::Colorize;

use crate::timeline::{AssistantMessage, Block, BlockBody};
use crate::turn::{TurnOutcome, TurnState, TurnView};

const RESULT_PREVIEW_CHARS: usize = 200;

/// Incremental renderer for one turn
#[derive(Debug, Default)]
pub struct LiveRenderer {
    /// Blocks whose header has been printed
    started: usize,
    /// Text of the last started block as printed so far
    printed: String,
}

impl LiveRenderer {
    /// Create a renderer that has printed nothing yet
    pub fn new() -> Self {
        Self::default()
    }

    /// Output for everything in `view` not printed before
    pub fn render(&mut self, view: &TurnView) -> String {
        let mut out = String::new();
        let Some(message) = &view.message else {
            return out;
        };
        let blocks = message.timeline.blocks();

        // Text appended to the block that was open last time. A block whose
        // text was rewritten (final answer from `done`) is printed again.
        if self.started > 0 {
            if let Some(block) = blocks.get(self.started - 1) {
                let text = block.text().unwrap_or_default();
                if let Some(tail) = text.strip_prefix(self.printed.as_str()) {
                    push_text(&mut out, tail, &block.body);
                } else {
                    out.push('\n');
                    push_text(&mut out, text, &block.body);
                }
                self.printed = text.to_string();
            }
        }

        for block in blocks.iter().skip(self.started) {
            if self.started > 0 {
                out.push('\n');
            }
            out.push_str(&block_header(block));
            let text = block.text().unwrap_or_default();
            push_text(&mut out, text, &block.body);
            self.printed = text.to_string();
            self.started += 1;
        }

        out
    }
}

fn push_text(out: &mut String, text: &str, body: &BlockBody) {
    if text.is_empty() {
        return;
    }
    match body {
        BlockBody::Thinking { .. } => out.push_str(&text.dimmed().to_string()),
        _ => out.push_str(text),
    }
}

fn block_header(block: &Block) -> String {
    match &block.body {
        BlockBody::Thinking { .. } => format!("{}\n", "[thinking]".dimmed().italic()),
        BlockBody::Content { .. } => String::new(),
        BlockBody::ToolCall {
            tool_name,
            arguments,
            ..
        } => {
            let args = if arguments.is_null() {
                String::new()
            } else {
                arguments.to_string()
            };
            format!("{} {} {}", "→".cyan(), tool_name.cyan().bold(), args.dimmed())
        }
        BlockBody::ToolResult {
            tool_name,
            result,
            success,
            ..
        } => {
            let status = if *success {
                "ok".green()
            } else {
                "failed".red()
            };
            let duration = block
                .duration_seconds
                .map(|secs| format!(" ({:.1}s)", secs))
                .unwrap_or_default();
            format!(
                "{} {} {}{} {}",
                "←".cyan(),
                tool_name.as_deref().unwrap_or("tool"),
                status,
                duration,
                preview(result).dimmed()
            )
        }
    }
}

fn preview(text: &str) -> String {
    let single_line = text.replace('\n', " ");
    match single_line.char_indices().nth(RESULT_PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}…", &single_line[..cut]),
        None => single_line,
    }
}

/// Full static rendering of an assistant message
pub fn render_message(message: &AssistantMessage) -> String {
    let mut renderer = LiveRenderer::new();
    renderer.render(&TurnView {
        state: TurnState::Completed,
        session_id: None,
        message: Some(message.clone()),
        error: None,
    })
}

/// One-line summary of a finished turn
pub fn summary_line(outcome: &TurnOutcome) -> String {
    let state = match outcome.state {
        TurnState::Completed => "completed".green(),
        TurnState::Cancelled => "cancelled".yellow(),
        TurnState::Failed => "failed".red(),
        other => other.to_string().normal(),
    };

    let mut parts = vec![state.to_string()];
    if let Some(session) = &outcome.session {
        parts.push(format!("session {} ({})", session.id.cyan(), session.title));
    } else if let Some(id) = &outcome.session_id {
        parts.push(format!("session {}", id.cyan()));
    }
    if let Some(message) = &outcome.message {
        if let Some(steps) = message.stats.steps {
            parts.push(format!("{} steps", steps));
        }
        if let Some(calls) = message.stats.tool_calls {
            parts.push(format!("{} tool calls", calls));
        }
    }
    if let Some(error) = &outcome.error {
        parts.push(error.red().to_string());
    }

    parts.join(" · ")
}
