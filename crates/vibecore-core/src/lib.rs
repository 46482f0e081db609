//! Orchestration engine: session persistence, path validation, the tool
//! registry and invocation protocol, the `AgentRunner` turn state machine,
//! `SubAgentSupervisor`, and the top-level `Orchestrator`.
//!
//! Depends on `vibecore-llm` for everything provider-facing (credentials,
//! token refresh, the model adapter, raw SSE decoding); this crate never
//! talks to the network directly.

pub mod agent;
pub mod orchestrator;
pub mod session;
pub mod stream_decoder;
pub mod tools;
pub mod types;

pub use agent::{AgentRunner, RunnerError, SubAgentExecutor, SubAgentRunnerAdapter, SubAgentSupervisor};
pub use orchestrator::{find_latest_session, Orchestrator, OrchestratorError};
pub use session::{session_file_path, validate_replay, LoaderError, PathError, SessionError, SessionStore};
pub use stream_decoder::{DecodeError, StreamDecoder};
pub use tools::{build_registry, core::ToolRegistry, path_validator::PathValidator};
pub use types::{Agent, AllowedDirectory, AssistantStatus, ErrorKind, Event, Item, PendingCall, TurnState};
