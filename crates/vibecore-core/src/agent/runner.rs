//! The per-turn state machine: builds a model request from session
//! history, drives the decoded event stream, dispatches tools, and
//! persists the results back to [`SessionStore`].
//!
//! Grounded on `agent/runner.rs`'s `Agent::run_single_iteration_internal`
//! loop and `LoopFlow` enum (obtain response → extract tool requests →
//! execute tools → loop or finish), generalized from XML/native tool-call
//! parsing to the spec's streamed `ToolCallStarted`/`ToolCallCompleted`
//! pairing (spec.md §4.8). Tool dispatch follows the teacher's
//! `manage_tool_execution`: every call from one assistant message is run,
//! results collected, then folded back into history before the next model
//! call — generalized here to run handlers concurrently while still
//! appending their outputs in call-emission order (spec.md §4.8
//! "Concurrency within a turn").

use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use vibecore_llm::{ModelAdapter, ModelContentBlock, ModelMessage, ModelRequest, ModelRole};

use crate::agent::sub_agent::SubAgentSupervisor;
use crate::session::{SessionError, SessionStore};
use crate::stream_decoder::{DecodeError, StreamDecoder};
use crate::tools::core::ToolRegistry;
use crate::tools::path_validator::PathValidator;
use crate::types::{handoff_tool_name, Agent, AssistantStatus, ErrorKind, Event, Item, PendingCall, TurnState};

#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("model request failed: {0}")]
    Model(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Drives one or more model round-trips to completion for a single Agent
/// turn, persisting every item it produces to `SessionStore` as it goes so
/// a crash mid-turn leaves the session in a replayable state.
pub struct AgentRunner {
    adapter: Arc<dyn ModelAdapter>,
    tools: Arc<ToolRegistry>,
    session: SessionStore,
    path_validator: Arc<PathValidator>,
    supervisor: Arc<SubAgentSupervisor>,
    sink: UnboundedSender<Event>,
    /// Agents a handoff may switch `TurnState.agent` to, looked up by name
    /// against the handing-off agent's own `handoffs` list. Empty for a
    /// single-agent deployment, where handoff tools are simply never
    /// offered to the model (spec.md's Glossary entry for Handoff).
    known_agents: Vec<Agent>,
}

impl AgentRunner {
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        tools: Arc<ToolRegistry>,
        session: SessionStore,
        path_validator: Arc<PathValidator>,
        supervisor: Arc<SubAgentSupervisor>,
        sink: UnboundedSender<Event>,
    ) -> Self {
        Self { adapter, tools, session, path_validator, supervisor, sink, known_agents: Vec::new() }
    }

    /// Registers the pool of agents a handoff can switch into. Only agents
    /// named in the active `Agent.handoffs` are actually reachable; this is
    /// just the universe to resolve those names against.
    pub fn with_known_agents(mut self, known_agents: Vec<Agent>) -> Self {
        self.known_agents = known_agents;
        self
    }

    /// Runs a full turn starting from `user_input`, looping over model
    /// calls until the assistant produces a tool-call-free, non-empty
    /// message, the turn cap is hit, or an error/cancellation ends it early.
    pub async fn run_turn(&self, agent: Agent, user_input: String) -> Result<(), RunnerError> {
        self.run_turn_with_cancellation(agent, user_input, CancellationToken::new()).await
    }

    /// As [`Self::run_turn`], but lets a caller (the `task` tool's
    /// supervisor) supply the cancellation token so cancelling the parent
    /// call also stops this turn.
    pub async fn run_turn_with_cancellation(
        &self,
        agent: Agent,
        user_input: String,
        cancel: CancellationToken,
    ) -> Result<(), RunnerError> {
        self.session.add_items(&[Item::UserText { content: user_input }]).await?;

        let mut state = TurnState::new(agent);
        state.cancel = cancel;

        loop {
            if state.exceeded_turn_cap() {
                self.emit(Event::Error { kind: ErrorKind::Internal, detail: "turn cap exceeded".to_string() });
                return Ok(());
            }
            state.turn_count += 1;

            let items = self.session.get_items(None).await?;
            let request = self.build_request(&state.agent, &items);

            let sse = match self.adapter.send(request, state.cancel.clone()).await {
                Ok(sse) => sse,
                Err(e) => {
                    self.emit(Event::Error { kind: ErrorKind::Model, detail: e.to_string() });
                    return Ok(());
                }
            };
            let mut decoder = StreamDecoder::new(sse);

            let mut call_order: Vec<String> = Vec::new();
            let mut handoff_occurred = false;
            let cancelled = loop {
                tokio::select! {
                    biased;
                    _ = state.cancel.cancelled() => break true,
                    next = decoder.next_event() => {
                        match next {
                            Ok(None) => break false,
                            Ok(Some(event)) => {
                                if self.apply_event(&mut state, &mut call_order, &mut handoff_occurred, event).await? {
                                    return Ok(());
                                }
                            }
                            Err(e) => {
                                self.emit(Event::Error { kind: ErrorKind::Model, detail: e.to_string() });
                                return Ok(());
                            }
                        }
                    }
                }
            };

            if cancelled {
                // A partial in-progress message is discarded, never persisted
                // (spec.md §4.8 Cancellation).
                return Ok(());
            }

            if state.pending.is_empty() {
                if handoff_occurred {
                    // The very next model request must use the new agent's
                    // instructions/tools before the turn can end (spec.md's
                    // Glossary entry for Handoff).
                    state.current_message.clear();
                    continue;
                }
                let final_output = std::mem::take(&mut state.current_message);
                self.emit(Event::TurnFinished { final_output });
                return Ok(());
            }

            self.run_pending_tools(&mut state, &call_order).await?;
            state.current_message.clear();
        }
    }

    /// Applies one decoded stream event to `TurnState`, forwards it to the
    /// UI sink, and persists whatever needs to survive a restart. Returns
    /// `Ok(true)` if the turn is over (a terminal error occurred).
    async fn apply_event(
        &self,
        state: &mut TurnState,
        call_order: &mut Vec<String>,
        handoff_occurred: &mut bool,
        event: Event,
    ) -> Result<bool, RunnerError> {
        match event {
            Event::TextDelta(delta) => {
                state.current_message.push_str(&delta);
                self.emit(Event::TextDelta(delta));
                Ok(false)
            }
            Event::ToolCallStarted { call_id, tool_name, arguments } => {
                state.pending.insert(
                    call_id.clone(),
                    PendingCall { tool_name: tool_name.clone(), arguments: arguments.clone(), emitted_at_turn: state.turn_count },
                );
                call_order.push(call_id.clone());
                self.emit(Event::ToolCallStarted { call_id, tool_name, arguments });
                Ok(false)
            }
            Event::ReasoningStarted => {
                self.emit(Event::ReasoningStarted);
                Ok(false)
            }
            Event::ReasoningCompleted { summary } => {
                if !summary.is_empty() {
                    self.session.add_items(&[Item::ReasoningSummary { text: vec![summary.clone()] }]).await?;
                }
                self.emit(Event::ReasoningCompleted { summary });
                Ok(false)
            }
            Event::MessageCompleted => {
                if !state.current_message.is_empty() {
                    self.session
                        .add_items(&[Item::AssistantMessage {
                            content: vec![state.current_message.clone()],
                            status: AssistantStatus::Completed,
                        }])
                        .await?;
                }
                self.emit(Event::MessageCompleted);
                Ok(false)
            }
            Event::AgentHandoff { to } => {
                let target = state
                    .agent
                    .handoffs
                    .iter()
                    .find(|name| handoff_tool_name(name) == format!("{}{to}", crate::types::HANDOFF_TOOL_PREFIX))
                    .and_then(|name| self.known_agents.iter().find(|a| &a.name == name).cloned());

                match target {
                    Some(agent) => {
                        self.emit(Event::AgentHandoff { to: agent.name.clone() });
                        state.agent = agent;
                        *handoff_occurred = true;
                    }
                    None => {
                        self.emit(Event::Error {
                            kind: ErrorKind::Internal,
                            detail: format!("handoff target '{to}' is not a known, allowed agent"),
                        });
                    }
                }
                Ok(false)
            }
            Event::Error { kind, detail } => {
                self.emit(Event::Error { kind, detail });
                Ok(true)
            }
            other => {
                self.emit(other);
                Ok(false)
            }
        }
    }

    /// Runs every pending tool call concurrently, then folds the results
    /// back into the session in the order calls were emitted — regardless
    /// of which handler finished first (spec.md §4.8).
    async fn run_pending_tools(&self, state: &mut TurnState, call_order: &[String]) -> Result<(), RunnerError> {
        let mut handles = Vec::with_capacity(call_order.len());
        for call_id in call_order {
            let Some(pending) = state.pending.get(call_id) else { continue };
            let tools = self.tools.clone();
            let path_validator = self.path_validator.clone();
            let supervisor = self.supervisor.clone();
            let sink = self.sink.clone();
            let cancel = state.cancel.clone();
            let call_id = call_id.clone();
            let task_call_id = call_id.clone();
            let tool_name = pending.tool_name.clone();
            let arguments = pending.arguments.clone();

            handles.push((
                call_id,
                tokio::spawn(async move {
                    let args_value: serde_json::Value =
                        serde_json::from_str(&arguments).unwrap_or(serde_json::Value::Null);
                    let mut ctx = crate::tools::core::ToolContext {
                        path_validator,
                        supervisor,
                        sink,
                        cancel,
                        call_id: task_call_id,
                        parent_call_id: None,
                    };
                    match tools.dispatch(&tool_name, &mut ctx, args_value).await {
                        Ok(output) => output,
                        Err(e) => format!("Error: {e}"),
                    }
                }),
            ));
        }

        for (call_id, handle) in handles {
            let output = handle.await.unwrap_or_else(|e| format!("Error: tool task panicked: {e}"));
            if let Some(pending) = state.pending.remove(&call_id) {
                self.session
                    .add_items(&[Item::ToolCall {
                        call_id: call_id.clone(),
                        tool_name: pending.tool_name,
                        arguments: pending.arguments,
                    }])
                    .await?;
                self.session.add_items(&[Item::ToolOutput { call_id: call_id.clone(), output: output.clone() }]).await?;
                self.emit(Event::ToolCallCompleted { call_id, output });
            }
        }

        Ok(())
    }

    /// Translates the agent's instructions and the replayed item history
    /// into a provider-neutral request. System instructions become a
    /// leading system message; every other item maps to the role/content
    /// pair its kind implies. `ReasoningSummary` items are replay-only —
    /// they're never sent back to the model.
    fn build_request(&self, agent: &Agent, items: &[Item]) -> ModelRequest {
        let mut messages = vec![ModelMessage::system(agent.instructions.clone())];

        for item in items {
            match item {
                Item::UserText { content } => messages.push(ModelMessage::user(content.clone())),
                Item::AssistantMessage { content, .. } => messages.push(ModelMessage::assistant(content.join("\n\n"))),
                Item::ToolCall { call_id, tool_name, arguments } => {
                    let input = serde_json::from_str(arguments).unwrap_or(serde_json::Value::Null);
                    messages.push(ModelMessage {
                        role: ModelRole::Assistant,
                        content: vec![ModelContentBlock::ToolUse { id: call_id.clone(), name: tool_name.clone(), input }],
                    });
                }
                Item::ToolOutput { call_id, output } => {
                    messages.push(ModelMessage {
                        role: ModelRole::User,
                        content: vec![ModelContentBlock::ToolResult {
                            tool_use_id: call_id.clone(),
                            content: output.clone(),
                            is_error: None,
                        }],
                    });
                }
                Item::ReasoningSummary { .. } | Item::Unknown(_) => {}
            }
        }

        let mut request = ModelRequest::new(agent.model.clone(), messages);
        request.tools = self.tools.tool_definitions();
        for target in &agent.handoffs {
            request.tools.push(vibecore_llm::ToolDefinition {
                name: handoff_tool_name(target),
                description: format!("Hand off the rest of this conversation to the '{target}' agent."),
                parameters_schema: serde_json::json!({ "type": "object", "properties": {} }),
            });
        }
        request
    }

    fn emit(&self, event: Event) {
        let _ = self.sink.send(event);
    }
}

/// Adapts [`AgentRunner`] to the [`crate::agent::sub_agent::SubAgentExecutor`]
/// seam so the `task` tool can drive a nested turn without
/// `vibecore-core`'s tool layer depending on this module directly. Each
/// sub-agent gets its own ephemeral, never-persisted-meaningfully session
/// store, matching spec.md §4.9 — "no access to the parent's session items
/// beyond the explicit task prompt".
pub struct SubAgentRunnerAdapter {
    pub adapter: Arc<dyn ModelAdapter>,
    pub tools: Arc<ToolRegistry>,
    pub path_validator: Arc<PathValidator>,
    pub supervisor: Arc<SubAgentSupervisor>,
    pub model: String,
    /// The top-level UI sink. Child events are relayed here wrapped in
    /// `Event::SubAgentEvent` so the UI can nest them under the parent
    /// `task` call (spec.md §4.9).
    pub upstream: UnboundedSender<Event>,
}

#[async_trait::async_trait]
impl crate::agent::sub_agent::SubAgentExecutor for SubAgentRunnerAdapter {
    async fn run_task(
        &self,
        description: &str,
        prompt: &str,
        cancel: CancellationToken,
        parent_call_id: &str,
    ) -> Result<String, crate::tools::core::ToolError> {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let session =
            SessionStore::at_path(std::env::temp_dir().join(format!("vibecore-subagent-{parent_call_id}.jsonl")));

        let mut sub_agent = Agent::new(format!("task:{description}"), SUB_AGENT_INSTRUCTIONS, self.model.clone());
        sub_agent.max_turns = 50;

        let runner = AgentRunner::new(
            self.adapter.clone(),
            self.tools.clone(),
            session.clone(),
            self.path_validator.clone(),
            self.supervisor.clone(),
            tx,
        );

        let upstream = self.upstream.clone();
        let parent_id = parent_call_id.to_string();
        let relay = tokio::spawn(async move {
            let mut final_output = String::new();
            while let Some(event) = rx.recv().await {
                if let Event::TurnFinished { final_output: out } = &event {
                    final_output = out.clone();
                }
                let _ = upstream.send(Event::SubAgentEvent { parent_call_id: parent_id.clone(), event: Box::new(event) });
            }
            final_output
        });

        let turn_result = runner.run_turn_with_cancellation(sub_agent, prompt.to_string(), cancel).await;
        // Drop the runner (and the channel sender it owns) before awaiting
        // the relay task, or `rx.recv()` would never see the stream close.
        drop(runner);
        turn_result.map_err(|e| crate::tools::core::ToolError::Execution(e.to_string()))?;

        let final_output = relay.await.unwrap_or_default();
        let _ = session.clear().await;
        Ok(final_output)
    }
}

#[cfg(test)]
mod handoff_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc::unbounded_channel;
    use vibecore_llm::streaming::{ChunkStream, PlaybackChunkStream, SseDecoder};
    use vibecore_llm::{ModelError, ModelRequest};

    use super::*;
    use crate::tools::build_registry;
    use crate::tools::path_validator::PathValidator;
    use crate::types::AllowedDirectory;

    /// Issues a handoff tool call on its first turn, then a plain reply —
    /// standing in for a model that decides to delegate to another agent.
    struct HandoffAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelAdapter for HandoffAdapter {
        async fn send(
            &self,
            _request: ModelRequest,
            _cancel: tokio_util::sync::CancellationToken,
        ) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError> {
            let call_number = self.calls.fetch_add(1, Ordering::SeqCst);
            let payloads = if call_number == 0 {
                vec![
                    r#"{"type":"content_block_start","index":0,"content_block":{"type":"tool_use","id":"call_1","name":"transfer_to_specialist","input":{}}}"#.to_string(),
                    r#"{"type":"content_block_stop","index":0}"#.to_string(),
                    r#"{"type":"message_stop"}"#.to_string(),
                ]
            } else {
                vec![
                    r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#.to_string(),
                    r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"handled by the specialist"}}"#.to_string(),
                    r#"{"type":"content_block_stop","index":0}"#.to_string(),
                    r#"{"type":"message_stop"}"#.to_string(),
                ]
            };
            let stream: Box<dyn ChunkStream> = Box::new(PlaybackChunkStream::new(payloads));
            Ok(SseDecoder::new(stream))
        }
    }

    #[tokio::test]
    async fn a_handoff_tool_call_switches_the_turns_active_agent() {
        let dir = tempfile::tempdir().unwrap();
        let adapter: Arc<dyn ModelAdapter> = Arc::new(HandoffAdapter { calls: AtomicUsize::new(0) });
        let tools = Arc::new(build_registry());
        let path_validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir.path()).unwrap()]));
        let supervisor = Arc::new(SubAgentSupervisor::new());
        let session = SessionStore::at_path(dir.path().join("session.jsonl"));
        let (tx, mut rx) = unbounded_channel();

        let mut main_agent = Agent::new("main", "be helpful", "claude-opus-4");
        main_agent.handoffs = vec!["Specialist".to_string()];
        let specialist = Agent::new("Specialist", "you are the specialist", "claude-opus-4");

        let runner = AgentRunner::new(adapter, tools, session, path_validator, supervisor, tx)
            .with_known_agents(vec![specialist]);
        runner.run_turn(main_agent, "help me with something specific".to_string()).await.unwrap();

        let mut handoff_target = None;
        let mut final_output = None;
        while let Ok(event) = rx.try_recv() {
            match event {
                Event::AgentHandoff { to } => handoff_target = Some(to),
                Event::TurnFinished { final_output: out } => final_output = Some(out),
                _ => {}
            }
        }

        assert_eq!(handoff_target.as_deref(), Some("Specialist"));
        assert_eq!(final_output.as_deref(), Some("handled by the specialist"));
    }

    #[tokio::test]
    async fn an_unknown_handoff_target_reports_an_error_instead_of_panicking() {
        let dir = tempfile::tempdir().unwrap();
        let adapter: Arc<dyn ModelAdapter> = Arc::new(HandoffAdapter { calls: AtomicUsize::new(0) });
        let tools = Arc::new(build_registry());
        let path_validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir.path()).unwrap()]));
        let supervisor = Arc::new(SubAgentSupervisor::new());
        let session = SessionStore::at_path(dir.path().join("session.jsonl"));
        let (tx, mut rx) = unbounded_channel();

        // `Specialist` is never registered in `known_agents`, so the handoff
        // can be named by the agent but never actually resolved.
        let mut main_agent = Agent::new("main", "be helpful", "claude-opus-4");
        main_agent.handoffs = vec!["Specialist".to_string()];

        let runner = AgentRunner::new(adapter, tools, session, path_validator, supervisor, tx);
        runner.run_turn(main_agent, "help me with something specific".to_string()).await.unwrap();

        let mut saw_error = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, Event::Error { kind: ErrorKind::Internal, .. }) {
                saw_error = true;
            }
        }
        assert!(saw_error);
    }
}

const SUB_AGENT_INSTRUCTIONS: &str =
    "You are a sub-agent launched by the task tool. Complete the described task and return a single final answer.";
