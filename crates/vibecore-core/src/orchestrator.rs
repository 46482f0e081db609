//! Top-level engine loop: user-input intake, mid-turn queueing,
//! `/clear`, session replay on startup, and event fan-out to the UI.
//!
//! Grounded on the teacher's `session/multi_manager.rs` (a pending-message
//! queue drained once the active agent goes idle) and `app/terminal.rs`
//! (constructing the agent's collaborators once, then driving a loop off
//! them) plus `/clear`-style session reset from
//! `original_source/tests/test_clear_command.py`. Session replay walks the
//! project's session directory for the most recently modified `.jsonl`
//! file, matching spec.md §6.3.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc::UnboundedSender, Mutex};
use tokio_util::sync::CancellationToken;
use vibecore_llm::ModelAdapter;

use crate::agent::{AgentRunner, SubAgentSupervisor};
use crate::session::{self, LoaderError, SessionError, SessionStore};
use crate::tools::core::ToolRegistry;
use crate::tools::path_validator::PathValidator;
use crate::types::{Agent, Event};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Replay(#[from] LoaderError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AgentStatus {
    Idle,
    Streaming,
}

struct Inner {
    session_id: String,
    session: SessionStore,
    runner: Arc<AgentRunner>,
    status: AgentStatus,
    pending: VecDeque<String>,
    /// The in-flight turn's cancellation token, if one is running — signaled
    /// by [`Orchestrator::cancel_current`] (spec.md §5's cancellation
    /// behavior, Testable Property S5).
    current_cancel: Option<CancellationToken>,
}

/// Owns the collaborators needed to (re)build an `AgentRunner` — so
/// `/clear` can swap in a fresh `SessionStore` without reconstructing
/// the model adapter, tool registry, or path validator.
pub struct Orchestrator {
    adapter: Arc<dyn ModelAdapter>,
    tools: Arc<ToolRegistry>,
    path_validator: Arc<PathValidator>,
    supervisor: Arc<SubAgentSupervisor>,
    base_agent: Agent,
    base_dir: PathBuf,
    project_path: PathBuf,
    sink: UnboundedSender<Event>,
    inner: Mutex<Inner>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: String,
        project_path: PathBuf,
        base_dir: PathBuf,
        adapter: Arc<dyn ModelAdapter>,
        tools: Arc<ToolRegistry>,
        path_validator: Arc<PathValidator>,
        supervisor: Arc<SubAgentSupervisor>,
        base_agent: Agent,
        sink: UnboundedSender<Event>,
    ) -> Result<Self, OrchestratorError> {
        let session = SessionStore::new(&session_id, &project_path, &base_dir)?;
        let runner = Arc::new(AgentRunner::new(
            adapter.clone(),
            tools.clone(),
            session.clone(),
            path_validator.clone(),
            supervisor.clone(),
            sink.clone(),
        ));

        Ok(Self {
            adapter,
            tools,
            path_validator,
            supervisor,
            base_agent,
            base_dir,
            project_path,
            sink,
            inner: Mutex::new(Inner {
                session_id,
                session,
                runner,
                status: AgentStatus::Idle,
                pending: VecDeque::new(),
                current_cancel: None,
            }),
        })
    }

    /// Replays every persisted item for the current session to the UI sink
    /// in log order. Refuses to continue if replay finds an unpaired tool
    /// call (spec.md §4.10).
    pub async fn replay(&self) -> Result<(), OrchestratorError> {
        let inner = self.inner.lock().await;
        let items = inner.session.get_items(None).await?;
        session::validate_replay(&items)?;
        for item in items {
            self.emit(Event::Replayed(item));
        }
        Ok(())
    }

    /// Handles one line of user input: `/clear` resets the session
    /// in-place; anything else starts a turn if idle, or joins the FIFO
    /// queue otherwise.
    pub async fn submit_line(self: &Arc<Self>, line: String) {
        if line.trim() == "/clear" {
            self.clear().await;
            return;
        }

        let mut inner = self.inner.lock().await;
        match inner.status {
            AgentStatus::Idle => {
                inner.status = AgentStatus::Streaming;
                drop(inner);
                self.clone().spawn_turn(line);
            }
            AgentStatus::Streaming => {
                inner.pending.push_back(line);
            }
        }
    }

    fn spawn_turn(self: Arc<Self>, line: String) {
        tokio::spawn(async move {
            let cancel = CancellationToken::new();
            let (runner, agent) = {
                let mut inner = self.inner.lock().await;
                inner.current_cancel = Some(cancel.clone());
                (inner.runner.clone(), self.base_agent.clone())
            };
            if let Err(e) = runner.run_turn_with_cancellation(agent, line, cancel).await {
                self.emit(Event::Error { kind: crate::types::ErrorKind::Internal, detail: e.to_string() });
            }

            let next = {
                let mut inner = self.inner.lock().await;
                inner.current_cancel = None;
                match inner.pending.pop_front() {
                    Some(next) => Some(next),
                    None => {
                        inner.status = AgentStatus::Idle;
                        None
                    }
                }
            };

            if let Some(next) = next {
                self.spawn_turn(next);
            }
        });
    }

    /// Cancels the currently in-flight turn, if any. A no-op when idle.
    /// Returns whether a turn was actually signaled.
    pub async fn cancel_current(&self) -> bool {
        match &self.inner.lock().await.current_cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// `/clear`: a new session id/file, a fresh `AgentRunner` bound to it,
    /// and the pending queue dropped — in-flight turns on the old runner
    /// finish writing to the old (now orphaned) session file harmlessly.
    async fn clear(&self) {
        let new_session_id = format!("{}-clear", Utc::now().timestamp_millis());
        let session = match SessionStore::new(&new_session_id, &self.project_path, &self.base_dir) {
            Ok(session) => session,
            Err(e) => {
                self.emit(Event::Error { kind: crate::types::ErrorKind::Internal, detail: e.to_string() });
                return;
            }
        };
        let runner = Arc::new(AgentRunner::new(
            self.adapter.clone(),
            self.tools.clone(),
            session.clone(),
            self.path_validator.clone(),
            self.supervisor.clone(),
            self.sink.clone(),
        ));

        let mut inner = self.inner.lock().await;
        inner.session_id = new_session_id;
        inner.session = session;
        inner.runner = runner;
        inner.status = AgentStatus::Idle;
        inner.pending.clear();
        drop(inner);

        self.emit(Event::SystemNotice("session cleared".to_string()));
    }

    pub async fn session_id(&self) -> String {
        self.inner.lock().await.session_id.clone()
    }

    fn emit(&self, event: Event) {
        let _ = self.sink.send(event);
    }
}

/// Finds the most recently modified `.jsonl` session file under
/// `{base_dir}/projects/{canonicalized(project_path)}/`, returning its
/// session id (file stem), for `--continue`.
pub fn find_latest_session(project_path: &Path, base_dir: &Path) -> Option<String> {
    let dir = base_dir.join("projects").join(session::canonicalize_path(project_path));
    let entries = std::fs::read_dir(dir).ok()?;

    let mut newest: Option<(std::time::SystemTime, String)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Ok(metadata) = entry.metadata() else { continue };
        let Ok(modified) = metadata.modified() else { continue };
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else { continue };

        let is_newer = match &newest {
            Some((t, _)) => modified > *t,
            None => true,
        };
        if is_newer {
            newest = Some((modified, stem.to_string()));
        }
    }

    newest.map(|(_, id)| id)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;
    use vibecore_llm::streaming::{ChunkStream, PlaybackChunkStream, SseDecoder};
    use vibecore_llm::{ModelError, ModelRequest};

    use super::*;
    use crate::types::AllowedDirectory;

    struct ScriptedAdapter {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ModelAdapter for ScriptedAdapter {
        async fn send(
            &self,
            _request: ModelRequest,
            _cancel: CancellationToken,
        ) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let payloads = vec![
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#.to_string(),
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"ok"}}"#.to_string(),
                r#"{"type":"content_block_stop","index":0}"#.to_string(),
                r#"{"type":"message_stop"}"#.to_string(),
            ];
            let stream: Box<dyn ChunkStream> = Box::new(PlaybackChunkStream::new(payloads));
            Ok(SseDecoder::new(stream))
        }
    }

    async fn build() -> (Arc<Orchestrator>, tokio::sync::mpsc::UnboundedReceiver<Event>, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = dir.path().join("base");
        let project_path = dir.path().join("project");
        std::fs::create_dir_all(&project_path).unwrap();

        let adapter: Arc<dyn ModelAdapter> = Arc::new(ScriptedAdapter { calls: AtomicUsize::new(0) });
        let tools = Arc::new(crate::tools::build_registry());
        let path_validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(&project_path).unwrap()]));
        let supervisor = Arc::new(SubAgentSupervisor::new());
        let agent = Agent::new("main", "be helpful", "claude-opus-4");
        let (tx, rx) = unbounded_channel();

        let orchestrator = Orchestrator::new(
            "session-1".to_string(),
            project_path,
            base_dir,
            adapter,
            tools,
            path_validator,
            supervisor,
            agent,
            tx,
        )
        .unwrap();

        (Arc::new(orchestrator), rx, dir)
    }

    #[tokio::test]
    async fn runs_a_turn_to_completion() {
        let (orchestrator, mut rx, _dir) = build().await;
        orchestrator.submit_line("hello".to_string()).await;

        let mut saw_turn_finished = false;
        while let Some(event) = rx.recv().await {
            if matches!(event, Event::TurnFinished { .. }) {
                saw_turn_finished = true;
                break;
            }
        }
        assert!(saw_turn_finished);
    }

    struct BlockingAdapter;

    #[async_trait]
    impl ModelAdapter for BlockingAdapter {
        async fn send(
            &self,
            _request: ModelRequest,
            cancel: CancellationToken,
        ) -> Result<SseDecoder<Box<dyn ChunkStream>>, ModelError> {
            cancel.cancelled().await;
            Err(ModelError::Http("cancelled".to_string()))
        }
    }

    #[tokio::test]
    async fn cancel_current_stops_an_in_flight_turn() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = dir.path().join("base");
        let project_path = dir.path().join("project");
        std::fs::create_dir_all(&project_path).unwrap();

        let adapter: Arc<dyn ModelAdapter> = Arc::new(BlockingAdapter);
        let tools = Arc::new(crate::tools::build_registry());
        let path_validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(&project_path).unwrap()]));
        let supervisor = Arc::new(SubAgentSupervisor::new());
        let agent = Agent::new("main", "be helpful", "claude-opus-4");
        let (tx, mut rx) = unbounded_channel();

        let orchestrator = Arc::new(
            Orchestrator::new("session-1".to_string(), project_path, base_dir, adapter, tools, path_validator, supervisor, agent, tx)
                .unwrap(),
        );

        orchestrator.submit_line("hello".to_string()).await;
        loop {
            if orchestrator.inner.lock().await.current_cancel.is_some() {
                break;
            }
            tokio::task::yield_now().await;
        }

        assert!(orchestrator.cancel_current().await);
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::Error { kind: crate::types::ErrorKind::Model, .. }));
    }

    #[tokio::test]
    async fn clear_resets_the_session_id_and_emits_a_notice() {
        let (orchestrator, mut rx, _dir) = build().await;
        let before = orchestrator.session_id().await;
        orchestrator.submit_line("/clear".to_string()).await;

        let notice = rx.recv().await.unwrap();
        assert!(matches!(notice, Event::SystemNotice(_)));
        assert_ne!(orchestrator.session_id().await, before);
    }

    #[tokio::test]
    async fn replay_reports_unpaired_tool_calls() {
        let (orchestrator, _rx, _dir) = build().await;
        let inner = orchestrator.inner.lock().await;
        inner
            .session
            .add_items(&[crate::types::Item::ToolCall {
                call_id: "c1".to_string(),
                tool_name: "read_file".to_string(),
                arguments: "{}".to_string(),
            }])
            .await
            .unwrap();
        drop(inner);

        let err = orchestrator.replay().await;
        assert!(matches!(err, Err(OrchestratorError::Replay(_))));
    }

    #[test]
    fn finds_the_most_recently_modified_session_file() {
        let dir = tempfile::tempdir().unwrap();
        let base_dir = dir.path().join("base");
        let project_path = dir.path().join("proj");
        std::fs::create_dir_all(&project_path).unwrap();
        let session_dir = base_dir.join("projects").join(session::canonicalize_path(&project_path));
        std::fs::create_dir_all(&session_dir).unwrap();

        std::fs::write(session_dir.join("old.jsonl"), "").unwrap();
        std::thread::sleep(std::time::Duration::from_millis(10));
        std::fs::write(session_dir.join("new.jsonl"), "").unwrap();

        assert_eq!(find_latest_session(&project_path, &base_dir), Some("new".to_string()));
    }
}
