//! Assistant message timeline
//!
//! A [`Timeline`] is the ordered list of [`Block`]s making up one assistant
//! reply. [`TimelineAssembler`] is the only thing that mutates it: it applies
//! typed [`ChatEvent`]s in arrival order, coalescing consecutive `thinking`
//! or `content` chunks into one block and giving every new block the next
//! `order` value.
//!
//! Coalescing is driven by the currently open block (kind and index) rather
//! than by inspecting the tail of the block list, so applying an event never
//! scans the timeline.

use serde::{Deserialize, Serialize};

use crate::stream::event::{ChatEvent, TurnStats};

/// Semantic kind of a block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    Thinking,
    Content,
    ToolCall,
    ToolResult,
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BlockKind::Thinking => "thinking",
            BlockKind::Content => "content",
            BlockKind::ToolCall => "tool_call",
            BlockKind::ToolResult => "tool_result",
        };
        f.write_str(name)
    }
}

/// Kind-specific block payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BlockBody {
    /// Accumulated reasoning text
    Thinking { text: String },
    /// Accumulated answer text
    Content { text: String },
    /// One tool invocation
    ToolCall {
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        arguments: serde_json::Value,
    },
    /// One tool result
    ToolResult {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tool_call_id: Option<String>,
        result: String,
        success: bool,
    },
}

/// A contiguous segment of one kind within an assistant reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Arrival position; assigned once, never reused within a turn
    pub order: u64,
    #[serde(flatten)]
    pub body: BlockBody,
    /// Duration attached by a later event referring to this block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
}

impl Block {
    /// Kind of this block
    pub fn kind(&self) -> BlockKind {
        match self.body {
            BlockBody::Thinking { .. } => BlockKind::Thinking,
            BlockBody::Content { .. } => BlockKind::Content,
            BlockBody::ToolCall { .. } => BlockKind::ToolCall,
            BlockBody::ToolResult { .. } => BlockKind::ToolResult,
        }
    }

    /// Accumulated text for `thinking` and `content` blocks
    pub fn text(&self) -> Option<&str> {
        match &self.body {
            BlockBody::Thinking { text } | BlockBody::Content { text } => Some(text),
            _ => None,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match &mut self.body {
            BlockBody::Thinking { text } | BlockBody::Content { text } => Some(text),
            _ => None,
        }
    }
}

/// Ordered blocks of one assistant reply
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timeline {
    blocks: Vec<Block>,
}

impl Timeline {
    /// All blocks, ascending by `order`
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// Number of blocks
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// Whether no block has been created yet
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Block with the given `order`
    pub fn get(&self, order: u64) -> Option<&Block> {
        self.blocks
            .binary_search_by_key(&order, |b| b.order)
            .ok()
            .map(|i| &self.blocks[i])
    }

    /// Concatenated text of every block of `kind`
    pub fn text_of(&self, kind: BlockKind) -> String {
        self.blocks
            .iter()
            .filter(|b| b.kind() == kind)
            .filter_map(Block::text)
            .collect()
    }
}

/// The assistant side of one turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssistantMessage {
    /// Server-assigned message id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Ordered reply blocks
    pub timeline: Timeline,
    /// Authoritative full answer text from `done`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Set once `done` was applied
    pub complete: bool,
    /// Agent statistics from `done`
    #[serde(default)]
    pub stats: TurnStats,
    /// Error reported by the service, if the turn failed after producing blocks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AssistantMessage {
    /// Full answer text: the final value when known, else the streamed text
    pub fn answer(&self) -> String {
        self.content
            .clone()
            .unwrap_or_else(|| self.timeline.text_of(BlockKind::Content))
    }
}

/// Currently open text block
#[derive(Debug, Clone, Copy)]
struct OpenBlock {
    kind: BlockKind,
    index: usize,
}

/// Applies chat events to the assistant message of one turn
#[derive(Debug, Default)]
pub struct TimelineAssembler {
    message: AssistantMessage,
    next_order: u64,
    open: Option<OpenBlock>,
    last_thinking: Option<usize>,
    finished: bool,
}

impl TimelineAssembler {
    /// Create an assembler with an empty timeline
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event
    ///
    /// Returns `true` when the assistant message changed. Events arriving
    /// after `done` or `error` are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatstream::stream::ChatEvent;
    /// use chatstream::timeline::TimelineAssembler;
    ///
    /// let mut assembler = TimelineAssembler::new();
    /// assembler.apply(&ChatEvent::Content { content: "Hel".into() });
    /// assembler.apply(&ChatEvent::Content { content: "lo".into() });
    /// let blocks = assembler.message().timeline.blocks();
    /// assert_eq!(blocks.len(), 1);
    /// assert_eq!(blocks[0].text(), Some("Hello"));
    /// ```
    pub fn apply(&mut self, event: &ChatEvent) -> bool {
        if self.finished {
            tracing::trace!("Ignoring event after turn end: {:?}", event);
            return false;
        }

        match event {
            ChatEvent::Thinking { content } => self.append_text(BlockKind::Thinking, content),
            ChatEvent::Content { content } => self.append_text(BlockKind::Content, content),
            ChatEvent::ToolCall {
                tool_name,
                tool_call_id,
                arguments,
            } => {
                self.push_block(
                    BlockBody::ToolCall {
                        tool_name: tool_name.clone(),
                        tool_call_id: tool_call_id.clone(),
                        arguments: arguments.clone(),
                    },
                    None,
                );
                true
            }
            ChatEvent::ToolResult {
                tool_name,
                tool_call_id,
                result,
                success,
                duration,
            } => {
                self.push_block(
                    BlockBody::ToolResult {
                        tool_name: tool_name.clone(),
                        tool_call_id: tool_call_id.clone(),
                        result: result.clone(),
                        success: *success,
                    },
                    *duration,
                );
                true
            }
            ChatEvent::ThinkingEnd { duration } => match (self.last_thinking, duration) {
                (Some(index), Some(_)) => {
                    self.message.timeline.blocks[index].duration_seconds = *duration;
                    true
                }
                (Some(_), None) => false,
                (None, _) => {
                    tracing::debug!("thinking_end without a thinking block; ignoring");
                    false
                }
            },
            ChatEvent::Start { message_id, .. } => {
                if message_id.is_some() && self.message.message_id != *message_id {
                    self.message.message_id = message_id.clone();
                    return true;
                }
                false
            }
            ChatEvent::Done {
                content,
                message_id,
                thinking_duration,
                stats,
                ..
            } => {
                self.finish_with(content.as_deref(), *thinking_duration);
                if message_id.is_some() {
                    self.message.message_id = message_id.clone();
                }
                self.message.stats = *stats;
                self.message.complete = true;
                self.finished = true;
                true
            }
            ChatEvent::Error { message } => {
                self.message.error = Some(message.clone());
                self.finished = true;
                true
            }
            ChatEvent::ThinkingStart | ChatEvent::AssistantStart => false,
            ChatEvent::Unknown { event_type } => {
                tracing::trace!(event_type = %event_type, "Ignoring unknown event type");
                false
            }
        }
    }

    /// Current assistant message
    pub fn message(&self) -> &AssistantMessage {
        &self.message
    }

    /// Whether at least one block exists
    pub fn has_blocks(&self) -> bool {
        !self.message.timeline.is_empty()
    }

    /// Whether `done` or `error` was applied
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Consume the assembler, returning the assistant message
    pub fn into_message(self) -> AssistantMessage {
        self.message
    }

    fn next_order(&mut self) -> u64 {
        let order = self.next_order;
        self.next_order += 1;
        order
    }

    fn push_block(&mut self, body: BlockBody, duration_seconds: Option<f64>) -> usize {
        let order = self.next_order();
        let index = self.message.timeline.blocks.len();
        self.message.timeline.blocks.push(Block {
            order,
            body,
            duration_seconds,
        });
        self.open = None;
        index
    }

    fn append_text(&mut self, kind: BlockKind, chunk: &str) -> bool {
        if let Some(open) = self.open.filter(|open| open.kind == kind) {
            if chunk.is_empty() {
                return false;
            }
            if let Some(text) = self.message.timeline.blocks[open.index].text_mut() {
                text.push_str(chunk);
            }
            return true;
        }

        // An empty chunk never opens a block of its own.
        if chunk.is_empty() {
            return false;
        }

        let body = match kind {
            BlockKind::Thinking => BlockBody::Thinking {
                text: chunk.to_string(),
            },
            _ => BlockBody::Content {
                text: chunk.to_string(),
            },
        };
        let index = self.push_block(body, None);
        self.open = Some(OpenBlock { kind, index });
        if kind == BlockKind::Thinking {
            self.last_thinking = Some(index);
        }
        true
    }

    fn finish_with(&mut self, final_content: Option<&str>, thinking_duration: Option<f64>) {
        if let (Some(seconds), Some(index)) = (thinking_duration, self.last_thinking) {
            let block = &mut self.message.timeline.blocks[index];
            if block.duration_seconds.is_none() {
                block.duration_seconds = Some(seconds);
            }
        }

        let Some(final_content) = final_content else {
            return;
        };
        self.message.content = Some(final_content.to_string());

        let content_indices: Vec<usize> = self
            .message
            .timeline
            .blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| b.kind() == BlockKind::Content)
            .map(|(i, _)| i)
            .collect();

        let Some((&last, earlier)) = content_indices.split_last() else {
            if !final_content.is_empty() {
                self.push_block(
                    BlockBody::Content {
                        text: final_content.to_string(),
                    },
                    None,
                );
            }
            return;
        };

        let blocks = &mut self.message.timeline.blocks;
        let prefix: String = earlier.iter().filter_map(|&i| blocks[i].text()).collect();
        let streamed_tail = blocks[last].text().unwrap_or_default();
        if prefix.len() + streamed_tail.len() == final_content.len()
            && final_content.starts_with(&prefix)
            && final_content.ends_with(streamed_tail)
        {
            return;
        }

        match final_content.strip_prefix(prefix.as_str()) {
            Some(remainder) => {
                tracing::debug!("Final content differs from streamed content; using final value");
                if let Some(text) = blocks[last].text_mut() {
                    *text = remainder.to_string();
                }
            }
            None => {
                tracing::warn!(
                    "Final content does not extend the streamed content blocks; replacing streamed text"
                );
                for &index in earlier {
                    if let Some(text) = blocks[index].text_mut() {
                        text.clear();
                    }
                }
                if let Some(text) = blocks[last].text_mut() {
                    *text = final_content.to_string();
                }
            }
        }

        // An empty final value leaves no empty block behind.
        if blocks[last].text().map_or(false, str::is_empty) {
            blocks.remove(last);
            self.open = None;
        }
    }
}
