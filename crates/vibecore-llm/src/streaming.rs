//! SSE chunk sourcing and raw-event parsing for the Anthropic Messages API.
//!
//! Grounded on `llm::streaming::{ChunkStream, HttpChunkStream,
//! PlaybackChunkStream}` (kept verbatim in spirit: the same trait lets a
//! decoder run against a live `reqwest::Response` or a recorded fixture)
//! and `llm::anthropic::StreamEvent`/`ContentDelta` for the SSE payload
//! shapes. This module stops at the provider's own event vocabulary;
//! `vibecore_core::stream_decoder` turns these into the engine's `Event`.

use async_trait::async_trait;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    #[error("http stream error: {0}")]
    Http(String),
    #[error("malformed SSE event: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait ChunkStream: Send {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError>;
}

pub struct HttpChunkStream {
    response: reqwest::Response,
}

impl HttpChunkStream {
    pub fn new(response: reqwest::Response) -> Self {
        Self { response }
    }
}

#[async_trait]
impl ChunkStream for HttpChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        self.response
            .chunk()
            .await
            .map(|c| c.map(|b| b.to_vec()))
            .map_err(|e| StreamError::Http(e.to_string()))
    }
}

/// Plays back a fixed list of raw SSE `data:` payloads, for tests that
/// exercise the decoder without a live connection.
pub struct PlaybackChunkStream {
    lines: std::vec::IntoIter<String>,
}

impl PlaybackChunkStream {
    pub fn new(data_payloads: Vec<String>) -> Self {
        Self { lines: data_payloads.into_iter() }
    }
}

#[async_trait]
impl ChunkStream for PlaybackChunkStream {
    async fn next_chunk(&mut self) -> Result<Option<Vec<u8>>, StreamError> {
        Ok(self.lines.next().map(|payload| format!("data: {payload}\n\n").into_bytes()))
    }
}

/// Incrementally decodes SSE framing off a [`ChunkStream`] into
/// [`AnthropicStreamEvent`]s, buffering partial lines across chunk
/// boundaries.
pub struct SseDecoder<S: ChunkStream> {
    source: S,
    buffer: String,
}

impl<S: ChunkStream> SseDecoder<S> {
    pub fn new(source: S) -> Self {
        Self { source, buffer: String::new() }
    }

    /// Returns the next parsed event, or `None` once the underlying stream
    /// is exhausted. Lines that aren't `data: ...` (blank separators,
    /// `event:` framing lines) are skipped.
    pub async fn next_event(&mut self) -> Result<Option<AnthropicStreamEvent>, StreamError> {
        loop {
            if let Some(pos) = self.buffer.find('\n') {
                let line = self.buffer[..pos].trim_end_matches('\r').to_string();
                self.buffer.drain(..=pos);
                if let Some(payload) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                    let payload = payload.trim();
                    if payload.is_empty() || payload == "[DONE]" {
                        continue;
                    }
                    let event: AnthropicStreamEvent = serde_json::from_str(payload)
                        .map_err(|e| StreamError::Malformed(format!("{e}: {payload}")))?;
                    return Ok(Some(event));
                }
                continue;
            }

            match self.source.next_chunk().await? {
                Some(bytes) => self.buffer.push_str(&String::from_utf8_lossy(&bytes)),
                None => return Ok(None),
            }
        }
    }
}

#[derive(Deserialize)]
struct Indexed {
    index: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum AnthropicStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart,
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        #[serde(flatten)]
        at: Indexed,
        content_block: StreamContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta {
        #[serde(flatten)]
        at: Indexed,
        delta: ContentDelta,
    },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop {
        #[serde(flatten)]
        at: Indexed,
    },
    #[serde(rename = "message_delta")]
    MessageDelta,
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: StreamErrorDetail },
}

impl AnthropicStreamEvent {
    pub fn index(&self) -> Option<usize> {
        match self {
            AnthropicStreamEvent::ContentBlockStart { at, .. }
            | AnthropicStreamEvent::ContentBlockDelta { at, .. }
            | AnthropicStreamEvent::ContentBlockStop { at } => Some(at.index),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StreamErrorDetail {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct StreamContentBlock {
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentDelta {
    #[serde(rename = "text_delta")]
    Text { text: String },
    #[serde(rename = "input_json_delta")]
    InputJson { partial_json: String },
    #[serde(rename = "thinking_delta")]
    Thinking { thinking: String },
    #[serde(rename = "signature_delta")]
    Signature { signature: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn decodes_text_delta_sequence() {
        let payloads = vec![
            r#"{"type":"message_start"}"#.to_string(),
            r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#.to_string(),
            r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#.to_string(),
            r#"{"type":"content_block_stop","index":0}"#.to_string(),
            r#"{"type":"message_stop"}"#.to_string(),
        ];
        let mut decoder = SseDecoder::new(PlaybackChunkStream::new(payloads));

        assert!(matches!(decoder.next_event().await.unwrap(), Some(AnthropicStreamEvent::MessageStart)));
        assert!(matches!(
            decoder.next_event().await.unwrap(),
            Some(AnthropicStreamEvent::ContentBlockStart { .. })
        ));
        match decoder.next_event().await.unwrap() {
            Some(AnthropicStreamEvent::ContentBlockDelta { delta: ContentDelta::Text { text }, .. }) => {
                assert_eq!(text, "Hi");
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            decoder.next_event().await.unwrap(),
            Some(AnthropicStreamEvent::ContentBlockStop { .. })
        ));
        assert!(matches!(decoder.next_event().await.unwrap(), Some(AnthropicStreamEvent::MessageStop)));
        assert!(decoder.next_event().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn skips_done_sentinel_and_blank_lines() {
        let payloads = vec!["[DONE]".to_string()];
        let mut decoder = SseDecoder::new(PlaybackChunkStream::new(payloads));
        assert!(decoder.next_event().await.unwrap().is_none());
    }
}

impl std::fmt::Debug for Indexed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.index)
    }
}
