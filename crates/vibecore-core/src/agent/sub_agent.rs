//! Supervises `task`-tool invocations: tracks per-call cancellation and
//! delegates the actual sub-agent turn loop to whatever [`AgentRunner`] the
//! orchestrator wires in.
//!
//! Grounded on
//! `examples/stippi-code-assistant/crates/code_assistant/src/agent/sub_agent.rs`'s
//! `SubAgentCancellationRegistry` (id-keyed cancellation flags, registered on
//! spawn and removed on completion) and `SubAgentRunner` trait (decoupling
//! the supervisor from the concrete agent loop so the two modules don't need
//! to know about each other's construction order). We use a
//! [`CancellationToken`] instead of the teacher's `AtomicBool`, matching the
//! cancellation primitive already used across [`crate::types::TurnState`]
//! and the tool-invocation protocol, and a `OnceLock`-backed executor slot
//! in place of constructor injection, since the executor (the top-level
//! [`AgentRunner`]) itself needs a [`SubAgentSupervisor`] to build its tool
//! registry — the two can't be constructed in either order without this
//! indirection.
//!
//! [`AgentRunner`]: crate::agent::runner::AgentRunner

use std::collections::HashMap;
use std::sync::{Mutex, OnceLock};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::tools::core::ToolError;

/// Implemented by the top-level agent loop so [`SubAgentSupervisor`] can
/// drive a sub-agent turn without depending on its concrete type.
#[async_trait]
pub trait SubAgentExecutor: Send + Sync {
    async fn run_task(
        &self,
        description: &str,
        prompt: &str,
        cancel: CancellationToken,
        parent_call_id: &str,
    ) -> Result<String, ToolError>;
}

pub struct SubAgentSupervisor {
    cancellations: Mutex<HashMap<String, CancellationToken>>,
    executor: OnceLock<std::sync::Arc<dyn SubAgentExecutor>>,
}

impl SubAgentSupervisor {
    pub fn new() -> Self {
        Self { cancellations: Mutex::new(HashMap::new()), executor: OnceLock::new() }
    }

    /// Wire in the agent loop that actually runs sub-agent turns. Called
    /// once during orchestrator startup, after the registry holding this
    /// supervisor has already been handed to the top-level runner.
    pub fn set_executor(&self, executor: std::sync::Arc<dyn SubAgentExecutor>) {
        let _ = self.executor.set(executor);
    }

    /// `parent_cancel` is the calling turn's own token — the child token is
    /// derived from it with [`CancellationToken::child_token`] so cancelling
    /// the parent turn cancels this sub-agent transitively (spec.md §4.9 /
    /// §5), while still letting `cancel()` target just this sub-agent
    /// without affecting the parent.
    pub async fn run_task(
        &self,
        parent_call_id: &str,
        description: &str,
        prompt: &str,
        parent_cancel: CancellationToken,
    ) -> Result<String, ToolError> {
        let cancel = parent_cancel.child_token();
        self.cancellations.lock().unwrap().insert(parent_call_id.to_string(), cancel.clone());

        let result = match self.executor.get() {
            Some(executor) => executor.run_task(description, prompt, cancel, parent_call_id).await,
            None => Err(ToolError::Execution("no sub-agent executor is wired up".to_string())),
        };

        self.cancellations.lock().unwrap().remove(parent_call_id);
        result
    }

    /// Cancel a running sub-agent by the `task` call id that spawned it.
    /// Returns `false` if no such sub-agent is currently running.
    pub fn cancel(&self, parent_call_id: &str) -> bool {
        match self.cancellations.lock().unwrap().get(parent_call_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }
}

impl Default for SubAgentSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoExecutor;

    #[async_trait]
    impl SubAgentExecutor for EchoExecutor {
        async fn run_task(
            &self,
            description: &str,
            prompt: &str,
            _cancel: CancellationToken,
            _parent_call_id: &str,
        ) -> Result<String, ToolError> {
            Ok(format!("{description}: {prompt}"))
        }
    }

    #[tokio::test]
    async fn runs_task_through_wired_executor() {
        let supervisor = SubAgentSupervisor::new();
        supervisor.set_executor(std::sync::Arc::new(EchoExecutor));
        let out = supervisor.run_task("call-1", "search", "find the logger", CancellationToken::new()).await.unwrap();
        assert_eq!(out, "search: find the logger");
    }

    #[tokio::test]
    async fn errors_without_a_wired_executor() {
        let supervisor = SubAgentSupervisor::new();
        let err = supervisor.run_task("call-1", "search", "find the logger", CancellationToken::new()).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn cancel_targets_the_right_call_id() {
        let supervisor = SubAgentSupervisor::new();
        assert!(!supervisor.cancel("nonexistent"));

        let cancel = CancellationToken::new();
        supervisor.cancellations.lock().unwrap().insert("call-1".to_string(), cancel.clone());
        assert!(supervisor.cancel("call-1"));
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancelling_the_parent_token_cancels_the_derived_child_token() {
        let supervisor = SubAgentSupervisor::new();
        supervisor.set_executor(std::sync::Arc::new(EchoExecutor));
        let parent_cancel = CancellationToken::new();

        // EchoExecutor returns immediately, so register a child token
        // directly to assert the derivation relationship rather than racing
        // a real in-flight task.
        let child = parent_cancel.child_token();
        supervisor.cancellations.lock().unwrap().insert("call-1".to_string(), child.clone());
        parent_cancel.cancel();
        assert!(child.is_cancelled());
    }
}
