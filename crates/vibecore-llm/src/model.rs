//! Translates an abstract [`ModelRequest`] into a provider call and a
//! decoded event stream.
//!
//! Grounded on `llm::anthropic::{AnthropicClient, DefaultMessageConverter}`
//! for the trait split (a swappable converter/adapter rather than one
//! struct doing HTTP and payload shaping together) and the prototype's
//! `_transform_messages_for_cache` for the exact cache-annotation rule.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::config::AnthropicConfig;
use crate::interceptor::{InterceptorError, RequestInterceptor};
use crate::streaming::{ChunkStream, HttpChunkStream, SseDecoder};
use crate::types::{ModelContentBlock, ModelMessage, ModelRequest, ModelRole};

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error(transparent)]
    Interceptor(#[from] InterceptorError),
    #[error("request to model provider failed: {0}")]
    Http(String),
    #[error("model provider returned {status}: {body}")]
    Provider { status: u16, body: String },
}

/// Provider-agnostic seam the engine calls to start a streamed turn.
///
/// `send` is cancel-aware: implementations should stop polling the
/// underlying connection once `cancel` fires, per spec.md §8 scenario S5
/// (no partial assistant message is ever persisted past a cancellation —
/// that guarantee is enforced by `AgentRunner`, which owns the
/// `TurnState`; this trait only needs to stop producing events promptly).
#[async_trait]
pub trait ModelAdapter: Send + Sync {
    async fn send(
        &self,
        request: ModelRequest,
        cancel: CancellationToken,
    ) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError>;
}

pub struct AnthropicAdapter {
    http: reqwest::Client,
    interceptor: Arc<RequestInterceptor>,
    base_url: String,
}

impl AnthropicAdapter {
    pub fn new(interceptor: Arc<RequestInterceptor>) -> Self {
        Self {
            http: reqwest::Client::new(),
            interceptor,
            base_url: AnthropicConfig::API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl ModelAdapter for AnthropicAdapter {
    async fn send(
        &self,
        mut request: ModelRequest,
        cancel: CancellationToken,
    ) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError> {
        let cached_indices = annotate_cache_control(&request.messages);
        for idx in &cached_indices {
            mark_first_text_block(&mut request.messages[*idx]);
        }

        let url = format!("{}{}", self.base_url, AnthropicConfig::MESSAGES_PATH);
        let builder = self.http.post(url).json(&AnthropicWirePayload::from(&request));
        let (builder, is_oauth) = self.interceptor.prepare(builder).await?;
        if is_oauth {
            self.interceptor.inject_identity(&mut request.messages);
        }

        let send = builder.send();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ModelError::Http("request cancelled".into())),
            result = send => {
                let response = result.map_err(|e| ModelError::Http(e.to_string()))?;
                if !response.status().is_success() {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    return Err(ModelError::Provider { status, body });
                }
                let stream: Box<dyn ChunkStream> = Box::new(HttpChunkStream::new(response));
                Ok(SseDecoder::new(stream))
            }
        }
    }
}

#[async_trait]
impl ChunkStream for Box<dyn ChunkStream> {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, crate::streaming::StreamError> {
        (**self).next_chunk().await
    }
}

/// Minimal Anthropic Messages API wire shape. Thinking/redacted-thinking
/// blocks are intentionally absent — this engine doesn't surface extended
/// thinking, matching spec.md's `ReasoningSummary` being a text-only item.
#[derive(serde::Serialize)]
struct AnthropicWirePayload {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicWireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<Vec<AnthropicWireBlock>>,
}

#[derive(serde::Serialize)]
struct AnthropicWireMessage {
    role: &'static str,
    content: Vec<AnthropicWireBlock>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum AnthropicWireBlock {
    Text {
        #[serde(rename = "type")]
        kind: &'static str,
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        cache_control: Option<CacheControl>,
    },
    ToolUse {
        #[serde(rename = "type")]
        kind: &'static str,
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        #[serde(rename = "type")]
        kind: &'static str,
        tool_use_id: String,
        content: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

#[derive(serde::Serialize)]
struct CacheControl {
    #[serde(rename = "type")]
    kind: &'static str,
}

impl From<&ModelRequest> for AnthropicWirePayload {
    fn from(request: &ModelRequest) -> Self {
        // Carried as blocks (not a bare string) so a `cache_control` marker set by
        // `mark_first_text_block` on the system message survives onto the wire —
        // collapsing to a string here would silently drop rule 4 of the
        // cache-annotation priority (spec.md §4.5).
        let system = request
            .messages
            .iter()
            .find(|m| m.role == ModelRole::System)
            .map(|m| m.content.iter().map(AnthropicWireBlock::from).collect::<Vec<_>>());

        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != ModelRole::System)
            .map(|m| AnthropicWireMessage {
                role: match m.role {
                    ModelRole::User => "user",
                    ModelRole::Assistant => "assistant",
                    ModelRole::System => unreachable!("filtered above"),
                },
                content: m.content.iter().map(AnthropicWireBlock::from).collect(),
            })
            .collect();

        Self { model: request.model.clone(), max_tokens: request.max_tokens, messages, system }
    }
}

impl From<&ModelContentBlock> for AnthropicWireBlock {
    fn from(block: &ModelContentBlock) -> Self {
        match block {
            ModelContentBlock::Text { text, cached } => AnthropicWireBlock::Text {
                kind: "text",
                text: text.clone(),
                cache_control: cached.then_some(CacheControl { kind: "ephemeral" }),
            },
            ModelContentBlock::ToolUse { id, name, input } => AnthropicWireBlock::ToolUse {
                kind: "tool_use",
                id: id.clone(),
                name: name.clone(),
                input: input.clone(),
            },
            ModelContentBlock::ToolResult { tool_use_id, content, is_error } => {
                AnthropicWireBlock::ToolResult {
                    kind: "tool_result",
                    tool_use_id: tool_use_id.clone(),
                    content: content.clone(),
                    is_error: *is_error,
                }
            }
        }
    }
}

/// Pure selection pass for prompt-cache breakpoints (spec.md §4.5).
///
/// Operates over the flat message list (system message included, as a
/// regular entry) and returns the indices to mark — at most four, earlier
/// rules taking priority when the four-slot budget is tight. The caller
/// (`AnthropicAdapter::send`) applies the marker; this function never
/// mutates its input.
pub fn annotate_cache_control(messages: &[ModelMessage]) -> HashSet<usize> {
    let mut indices = HashSet::new();
    if messages.is_empty() {
        return indices;
    }

    indices.insert(messages.len() - 1);

    let user_indices: Vec<usize> = messages
        .iter()
        .enumerate()
        .rev()
        .filter(|(_, m)| m.role == ModelRole::User)
        .map(|(i, _)| i)
        .collect();

    if let Some(&last_user) = user_indices.first() {
        if last_user > 0 {
            indices.insert(last_user - 1);
        }
    }
    if let Some(&second_last_user) = user_indices.get(1) {
        if second_last_user > 0 {
            indices.insert(second_last_user - 1);
        }
    }

    if let Some((i, _)) = messages.iter().enumerate().rev().find(|(_, m)| m.role == ModelRole::System) {
        indices.insert(i);
    }

    indices
}

fn mark_first_text_block(message: &mut ModelMessage) {
    for block in &mut message.content {
        if let ModelContentBlock::Text { text, cached } = block {
            if !text.is_empty() && !*cached {
                *cached = true;
                return;
            }
        }
    }
}
