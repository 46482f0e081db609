//! Engine-facing request/message types, independent of any one provider's
//! wire format.
//!
//! Grounded on `llm::anthropic::{AnthropicMessage, AnthropicContentBlock}`
//! (the teacher's provider-specific structs), generalized here into a
//! provider-neutral shape that `ModelAdapter` implementations translate
//! to and from.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelRole {
    System,
    User,
    Assistant,
}

/// One piece of message content. `cached` tracks whether a prompt-cache
/// breakpoint has already been placed here — set by
/// [`crate::model::annotate_cache_control`], never by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModelContentBlock {
    Text {
        text: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        cached: bool,
    },
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

impl ModelContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ModelContentBlock::Text { text: text.into(), cached: false }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ModelContentBlock::Text { text, .. } => Some(text),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: ModelRole,
    pub content: Vec<ModelContentBlock>,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: ModelRole::User, content: vec![ModelContentBlock::text(text)] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: ModelRole::Assistant, content: vec![ModelContentBlock::text(text)] }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self { role: ModelRole::System, content: vec![ModelContentBlock::text(text)] }
    }
}

/// A tool made visible to the model, independent of `vibecore-core`'s
/// registry — this crate has no dependency on `ToolRegistry`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters_schema: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub model: String,
    pub messages: Vec<ModelMessage>,
    pub tools: Vec<ToolDefinition>,
    pub max_tokens: u32,
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ModelMessage>) -> Self {
        Self { model: model.into(), messages, tools: Vec::new(), max_tokens: 8192 }
    }
}
