//! The typed tool trait and its execution context.
//!
//! Grounded on `tools/core/tool.rs::{Tool, ToolContext}`: a typed
//! `Input`/`Output` pair per tool, plus a context struct threading in
//! whatever shared collaborators a handler might need. Ours carries
//! `PathValidator` and `SubAgentSupervisor` instead of the teacher's
//! `ProjectManager`/`CommandExecutor`, per spec.md §4.6's narrower contract
//! (path-validator, sub-agent supervisor, and a UI event sink).

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use super::spec::ToolSpec;
use crate::agent::sub_agent::SubAgentSupervisor;
use crate::tools::path_validator::PathValidator;
use crate::types::Event;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),
    #[error(transparent)]
    PathValidation(#[from] crate::tools::path_validator::PathValidationError),
    #[error("tool execution failed: {0}")]
    Execution(String),
    #[error("tool '{0}' is not implemented")]
    NotImplemented(String),
    #[error("unknown tool '{0}'")]
    UnknownTool(String),
    #[error("operation cancelled")]
    Cancelled,
}

/// Execution-time collaborators available to every tool handler.
pub struct ToolContext {
    pub path_validator: Arc<PathValidator>,
    pub supervisor: Arc<SubAgentSupervisor>,
    pub sink: UnboundedSender<Event>,
    pub cancel: CancellationToken,
    /// The call id of this invocation itself — what `task` registers its
    /// sub-agent's cancellation under, keyed so `SubAgentSupervisor::cancel`
    /// can later target it.
    pub call_id: String,
    /// Set when this tool call is itself running inside a sub-agent, so
    /// nested events can be tagged with the right ancestor.
    pub parent_call_id: Option<String>,
}

#[async_trait]
pub trait Tool: Send + Sync + 'static {
    type Input: DeserializeOwned + Send;
    type Output: Send;

    fn spec(&self) -> ToolSpec;

    async fn execute(&self, ctx: &mut ToolContext, input: Self::Input) -> Result<Self::Output, ToolError>;

    /// Render `Output` as the text fed back to the model. Kept separate
    /// from `execute` so a tool's success path can return a typed value
    /// while still satisfying the engine's "tools return text" contract
    /// (spec.md §4.6).
    fn render(&self, output: &Self::Output) -> String;
}
