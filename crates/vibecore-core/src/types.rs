//! Core data model: `Item`, `Agent`, `TurnState`, `Event`, `AllowedDirectory`.
//!
//! Grounded on spec.md §3's entity list and `agent/runner.rs::Agent` /
//! `agent/sub_agent.rs::SubAgentCancellationRegistry` for the shapes that
//! carry over (a named, capability-scoped agent record; a per-turn mutable
//! record; cooperative cancellation).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use vibecore_llm::ModelRole;

/// One persisted entry in a session's append-only log.
///
/// Mirrors the Python prototype's raw JSON items (`TResponseInputItem`),
/// tagged here instead of duck-typed so an unrecognized item from an older
/// log version round-trips losslessly via `Unknown` rather than failing to
/// parse (REDESIGN FLAGS: replace dynamic-typed items with tagged variants
/// + an escape hatch).
///
/// The on-disk shape is the `role`/`type`-keyed wire format spec.md §6.1
/// defines, not a single uniform `{"type": "...", ...}` tag — `Serialize`
/// and `Deserialize` are hand-written below instead of derived so each
/// variant lands on the wire exactly as that section specifies.
#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    UserText {
        content: String,
    },
    AssistantMessage {
        content: Vec<String>,
        status: AssistantStatus,
    },
    ReasoningSummary {
        text: Vec<String>,
    },
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: String,
    },
    ToolOutput {
        call_id: String,
        output: String,
    },
    /// Anything written by a newer version of this engine, or by the
    /// original Python prototype's own item kinds we don't model. Kept
    /// verbatim so replay never drops data.
    Unknown(serde_json::Value),
}

impl Item {
    fn to_wire_value(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Item::UserText { content } => json!({ "role": "user", "content": content }),
            Item::AssistantMessage { content, status } => json!({
                "role": "assistant",
                "type": "message",
                "content": content.iter().map(|text| json!({ "type": "output_text", "text": text })).collect::<Vec<_>>(),
                "status": status,
            }),
            Item::ReasoningSummary { text } => json!({
                "type": "reasoning",
                "summary": text.iter().map(|t| json!({ "text": t })).collect::<Vec<_>>(),
            }),
            Item::ToolCall { call_id, tool_name, arguments } => json!({
                "type": "function_call",
                "call_id": call_id,
                "name": tool_name,
                "arguments": arguments,
            }),
            Item::ToolOutput { call_id, output } => json!({
                "type": "function_call_output",
                "call_id": call_id,
                "output": output,
            }),
            Item::Unknown(value) => value.clone(),
        }
    }

    fn from_wire_value(value: serde_json::Value) -> Result<Self, String> {
        let role = value.get("role").and_then(serde_json::Value::as_str);
        let kind = value.get("type").and_then(serde_json::Value::as_str);

        match (role, kind) {
            (Some("user"), _) => {
                let content =
                    value.get("content").and_then(serde_json::Value::as_str).ok_or("user item missing content")?;
                Ok(Item::UserText { content: content.to_string() })
            }
            (Some("assistant"), _) => {
                let blocks = value.get("content").and_then(serde_json::Value::as_array).ok_or("assistant item missing content")?;
                let content = blocks
                    .iter()
                    .map(|block| {
                        block
                            .get("text")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| "assistant content block missing text".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let status = serde_json::from_value(value.get("status").cloned().ok_or("assistant item missing status")?)
                    .map_err(|e| e.to_string())?;
                Ok(Item::AssistantMessage { content, status })
            }
            (_, Some("function_call")) => {
                let call_id =
                    value.get("call_id").and_then(serde_json::Value::as_str).ok_or("function_call missing call_id")?;
                let name = value.get("name").and_then(serde_json::Value::as_str).ok_or("function_call missing name")?;
                let arguments = value
                    .get("arguments")
                    .and_then(serde_json::Value::as_str)
                    .ok_or("function_call missing arguments")?;
                Ok(Item::ToolCall { call_id: call_id.to_string(), tool_name: name.to_string(), arguments: arguments.to_string() })
            }
            (_, Some("function_call_output")) => {
                let call_id = value
                    .get("call_id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or("function_call_output missing call_id")?;
                let output =
                    value.get("output").and_then(serde_json::Value::as_str).ok_or("function_call_output missing output")?;
                Ok(Item::ToolOutput { call_id: call_id.to_string(), output: output.to_string() })
            }
            (_, Some("reasoning")) => {
                let summary = value.get("summary").and_then(serde_json::Value::as_array).ok_or("reasoning missing summary")?;
                let text = summary
                    .iter()
                    .map(|entry| {
                        entry
                            .get("text")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_string)
                            .ok_or_else(|| "reasoning summary entry missing text".to_string())
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Item::ReasoningSummary { text })
            }
            _ => Ok(Item::Unknown(value)),
        }
    }
}

impl Serialize for Item {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_wire_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Item {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        Item::from_wire_value(value).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssistantStatus {
    InProgress,
    Completed,
}

/// A named, capability-scoped agent definition. Constructed at startup or
/// on handoff; never mutated mid-turn (spec.md §3).
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    pub instructions: String,
    pub allowed_tools: Vec<String>,
    pub model: String,
    pub reasoning_effort: Option<String>,
    pub handoffs: Vec<String>,
    pub max_turns: u32,
}

impl Agent {
    pub const DEFAULT_MAX_TURNS: u32 = 200;

    pub fn new(name: impl Into<String>, instructions: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            instructions: instructions.into(),
            allowed_tools: Vec::new(),
            model: model.into(),
            reasoning_effort: None,
            handoffs: Vec::new(),
            max_turns: Self::DEFAULT_MAX_TURNS,
        }
    }
}

/// A tool call awaiting its output, held by `TurnState` until the engine
/// reconciles it with a `ToolCallCompleted` event.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub tool_name: String,
    pub arguments: String,
    pub emitted_at_turn: u32,
}

/// Per-turn mutable state owned exclusively by the `AgentRunner` driving
/// that turn (spec.md §3 Ownership).
pub struct TurnState {
    pub agent: Agent,
    pub current_message: String,
    pub pending: HashMap<String, PendingCall>,
    pub turn_count: u32,
    pub cancel: tokio_util::sync::CancellationToken,
}

impl TurnState {
    pub fn new(agent: Agent) -> Self {
        Self {
            agent,
            current_message: String::new(),
            pending: HashMap::new(),
            turn_count: 0,
            cancel: tokio_util::sync::CancellationToken::new(),
        }
    }

    pub fn exceeded_turn_cap(&self) -> bool {
        self.turn_count >= self.agent.max_turns
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Model,
    Tool,
    Cancelled,
    Internal,
}

/// Engine output, forwarded to the UI sink and inspected by `AgentRunner`
/// (spec.md §3).
#[derive(Debug, Clone)]
pub enum Event {
    TextDelta(String),
    ToolCallStarted { call_id: String, tool_name: String, arguments: String },
    ToolCallCompleted { call_id: String, output: String },
    ReasoningStarted,
    ReasoningCompleted { summary: String },
    MessageCompleted,
    AgentHandoff { to: String },
    SubAgentEvent { parent_call_id: String, event: Box<Event> },
    Error { kind: ErrorKind, detail: String },
    TurnFinished { final_output: String },
    /// One persisted item replayed back to the UI on session startup, in
    /// log order (spec.md §4.10 "Session replay on startup").
    Replayed(Item),
    /// An orchestrator-level notice with no model turn behind it — e.g.
    /// `/clear` resetting the session (spec.md §4.10's "emit a
    /// SystemEvent").
    SystemNotice(String),
}

/// An absolute, symlink-resolved directory a filesystem-touching tool is
/// permitted to operate under (spec.md §3).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AllowedDirectory(pub std::path::PathBuf);

impl AllowedDirectory {
    pub fn resolve(path: impl AsRef<std::path::Path>) -> std::io::Result<Self> {
        Ok(Self(std::fs::canonicalize(path)?))
    }
}

/// Tool-name prefix the model uses to signal a handoff, recognized by
/// `StreamDecoder` instead of being dispatched through `ToolRegistry`
/// (spec.md's Glossary: "the current agent delegating the rest of the
/// conversation to a sibling agent ... via a handoff tool").
pub const HANDOFF_TOOL_PREFIX: &str = "transfer_to_";

/// Builds the synthetic tool name offered to the model for handing off to
/// `agent_name`, e.g. `"Code Reviewer"` -> `"transfer_to_code_reviewer"`.
pub fn handoff_tool_name(agent_name: &str) -> String {
    let slug: String = agent_name
        .chars()
        .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    let mut collapsed = String::with_capacity(slug.len());
    let mut last_was_underscore = false;
    for c in slug.chars() {
        if c == '_' {
            if !last_was_underscore {
                collapsed.push(c);
            }
            last_was_underscore = true;
        } else {
            collapsed.push(c);
            last_was_underscore = false;
        }
    }
    format!("{HANDOFF_TOOL_PREFIX}{}", collapsed.trim_matches('_'))
}

pub fn role_of(item: &Item) -> Option<ModelRole> {
    match item {
        Item::UserText { .. } => Some(ModelRole::User),
        Item::AssistantMessage { .. } => Some(ModelRole::Assistant),
        _ => None,
    }
}
