//! Turns provider-level [`AnthropicStreamEvent`]s into engine-level
//! [`Event`]s.
//!
//! Grounded on `ui/streaming/{json_processor,xml_processor}.rs`'s
//! `StreamProcessorTrait` (a per-content-block accumulator keyed by index,
//! fed one raw delta at a time) and the prototype's
//! `handlers/stream_handler.py` pattern-match over SSE event kinds. Unknown
//! block types and block/delta-kind mismatches are logged at `trace!` and
//! ignored, per spec.md §4.7's forward-compatibility rule.

use std::collections::HashMap;

use vibecore_llm::streaming::{AnthropicStreamEvent, ChunkStream, ContentDelta, SseDecoder, StreamError};

use crate::types::{ErrorKind, Event, HANDOFF_TOOL_PREFIX};

#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error(transparent)]
    Stream(#[from] StreamError),
    #[error("malformed tool-call arguments: {0}")]
    MalformedArguments(String),
}

enum BlockAccumulator {
    Text(String),
    ToolUse { id: String, name: String, partial_json: String },
    Thinking(String),
}

/// Wraps an [`SseDecoder`], reassembling per-block deltas into the finished
/// engine events `AgentRunner` consumes.
pub struct StreamDecoder<S: ChunkStream> {
    inner: SseDecoder<S>,
    blocks: HashMap<usize, BlockAccumulator>,
}

impl<S: ChunkStream> StreamDecoder<S> {
    /// Wraps an already-established [`SseDecoder`] (as returned by
    /// `ModelAdapter::send`) rather than owning the raw chunk source
    /// directly, since the adapter is the one that knows how to build it
    /// (HTTP response vs. recorded fixture).
    pub fn new(inner: SseDecoder<S>) -> Self {
        Self { inner, blocks: HashMap::new() }
    }

    pub fn from_source(source: S) -> Self {
        Self::new(SseDecoder::new(source))
    }

    /// Returns the next engine event, or `None` once the stream is
    /// exhausted. Raw events that don't yield a user-visible event (message
    /// framing, pings, partial tool-argument chunks) are consumed silently.
    pub async fn next_event(&mut self) -> Result<Option<Event>, DecodeError> {
        loop {
            let Some(raw) = self.inner.next_event().await? else {
                return Ok(None);
            };
            if let Some(event) = self.translate(raw)? {
                return Ok(Some(event));
            }
        }
    }

    fn translate(&mut self, raw: AnthropicStreamEvent) -> Result<Option<Event>, DecodeError> {
        match raw {
            AnthropicStreamEvent::MessageStart
            | AnthropicStreamEvent::MessageDelta
            | AnthropicStreamEvent::Ping => Ok(None),

            AnthropicStreamEvent::ContentBlockStart { at, content_block } => {
                match content_block.block_type.as_str() {
                    "text" => {
                        self.blocks.insert(at.index, BlockAccumulator::Text(content_block.text.unwrap_or_default()));
                        Ok(None)
                    }
                    "tool_use" => {
                        self.blocks.insert(
                            at.index,
                            BlockAccumulator::ToolUse {
                                id: content_block.id.unwrap_or_default(),
                                name: content_block.name.unwrap_or_default(),
                                partial_json: String::new(),
                            },
                        );
                        Ok(None)
                    }
                    "thinking" => {
                        self.blocks.insert(at.index, BlockAccumulator::Thinking(String::new()));
                        Ok(Some(Event::ReasoningStarted))
                    }
                    other => {
                        tracing::trace!(block_type = other, "ignoring unknown content block type");
                        Ok(None)
                    }
                }
            }

            AnthropicStreamEvent::ContentBlockDelta { at, delta } => {
                match (self.blocks.get_mut(&at.index), delta) {
                    (Some(BlockAccumulator::Text(buf)), ContentDelta::Text { text }) => {
                        buf.push_str(&text);
                        Ok(Some(Event::TextDelta(text)))
                    }
                    (Some(BlockAccumulator::ToolUse { partial_json, .. }), ContentDelta::InputJson { partial_json: chunk }) => {
                        partial_json.push_str(&chunk);
                        Ok(None)
                    }
                    (Some(BlockAccumulator::Thinking(buf)), ContentDelta::Thinking { thinking }) => {
                        buf.push_str(&thinking);
                        Ok(None)
                    }
                    (Some(BlockAccumulator::Thinking(_)), ContentDelta::Signature { .. }) => Ok(None),
                    _ => {
                        tracing::trace!(index = at.index, "delta for unknown or mismatched block, ignoring");
                        Ok(None)
                    }
                }
            }

            AnthropicStreamEvent::ContentBlockStop { at } => match self.blocks.remove(&at.index) {
                Some(BlockAccumulator::ToolUse { id: _, name, partial_json }) if name.starts_with(HANDOFF_TOOL_PREFIX) => {
                    let to = name[HANDOFF_TOOL_PREFIX.len()..].to_string();
                    let _ = partial_json;
                    Ok(Some(Event::AgentHandoff { to }))
                }
                Some(BlockAccumulator::ToolUse { id, name, partial_json }) => {
                    let arguments = if partial_json.trim().is_empty() { "{}".to_string() } else { partial_json };
                    serde_json::from_str::<serde_json::Value>(&arguments)
                        .map_err(|e| DecodeError::MalformedArguments(e.to_string()))?;
                    Ok(Some(Event::ToolCallStarted { call_id: id, tool_name: name, arguments }))
                }
                Some(BlockAccumulator::Thinking(summary)) => Ok(Some(Event::ReasoningCompleted { summary })),
                _ => Ok(None),
            },

            AnthropicStreamEvent::MessageStop => Ok(Some(Event::MessageCompleted)),

            AnthropicStreamEvent::Error { error } => {
                Ok(Some(Event::Error { kind: ErrorKind::Model, detail: format!("{}: {}", error.kind, error.message) }))
            }
        }
    }
}
