//! Launches a sub-agent to execute a self-contained task and return a
//! single final answer.
//!
//! Grounded on `original_source/src/vibecore/tools/task/tools.py::task`,
//! which delegates straight through to `execute_task`. Here that delegation
//! is [`SubAgentSupervisor::run_task`], keyed by this tool call's own id so
//! a later cancellation of the call can reach the nested turn
//! (SPEC_FULL.md §12).

use async_trait::async_trait;
use serde::Deserialize;

use super::super::core::{Tool, ToolContext, ToolError, ToolSpec};

#[derive(Debug, Deserialize)]
pub struct TaskInput {
    pub description: String,
    pub prompt: String,
}

pub struct TaskTool;

#[async_trait]
impl Tool for TaskTool {
    type Input = TaskInput;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "task",
            description: "Launch a sub-agent to execute a specific task and return its final answer. \
                Use for open-ended searches or multi-step work you'd rather delegate than do inline.",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "description": {"type": "string", "description": "A short task description (3-5 words)"},
                    "prompt": {"type": "string", "description": "Full, self-contained task instructions"},
                },
                "required": ["description", "prompt"],
            }),
        }
    }

    async fn execute(&self, ctx: &mut ToolContext, input: Self::Input) -> Result<Self::Output, ToolError> {
        ctx.supervisor.run_task(&ctx.call_id, &input.description, &input.prompt, ctx.cancel.clone()).await
    }

    fn render(&self, output: &Self::Output) -> String {
        output.clone()
    }
}
