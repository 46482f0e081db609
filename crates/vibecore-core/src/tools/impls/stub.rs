//! Registration-only stand-ins for tools whose external effects are out of
//! scope here (spec.md §1 Non-goal: "the individual tool *implementations*
//! ... are not core design; only the *tool-invocation protocol* ... is
//! specified"). Each one advertises a real `ToolSpec` to the model but
//! always returns [`ToolError::NotImplemented`].
//!
//! Grounded on the tool inventory in `original_source/src/vibecore/tools/`:
//! `file/tools.py` (`edit`, `multi_edit`, `write`), `python/tools.py`
//! (`execute_python` — stubbed per DESIGN NOTES' guidance against embedding
//! an interpreter), `shell/tools.py` (`glob`, `grep`, `ls`), `todo/tools.py`
//! (`todo_read`, `todo_write`), `web/tools.py` and `websearch/tools.py`
//! (both implement the same DuckDuckGo search; `web_search` is kept as the
//! one canonical stub name and `websearch` is treated as its duplicate, not
//! separately registered), and `webfetch/tools.py` (`webfetch`).

use async_trait::async_trait;
use serde_json::Value;

use super::super::core::{Tool, ToolContext, ToolError, ToolSpec};

pub struct StubTool {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters_schema: Value,
}

#[async_trait]
impl Tool for StubTool {
    type Input = Value;
    type Output = ();

    fn spec(&self) -> ToolSpec {
        ToolSpec { name: self.name, description: self.description, parameters_schema: self.parameters_schema.clone() }
    }

    async fn execute(&self, _ctx: &mut ToolContext, _input: Self::Input) -> Result<Self::Output, ToolError> {
        Err(ToolError::NotImplemented(self.name.to_string()))
    }

    fn render(&self, _output: &Self::Output) -> String {
        String::new()
    }
}

/// All stubbed-out tools, ready to hand to `ToolRegistry::register`.
pub fn all() -> Vec<StubTool> {
    vec![
        StubTool {
            name: "edit",
            description: "Replace a string in a file with another string",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "old_string": {"type": "string"},
                    "new_string": {"type": "string"},
                    "replace_all": {"type": "boolean"},
                },
                "required": ["file_path", "old_string", "new_string"],
            }),
        },
        StubTool {
            name: "multi_edit",
            description: "Apply multiple string replacements to a file atomically",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {"type": "string"},
                    "edits": {"type": "array"},
                },
                "required": ["file_path", "edits"],
            }),
        },
        StubTool {
            name: "write",
            description: "Write content to a file, creating or overwriting it",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"file_path": {"type": "string"}, "content": {"type": "string"}},
                "required": ["file_path", "content"],
            }),
        },
        StubTool {
            name: "execute_python",
            description: "Execute Python code in a persistent interpreter session",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"code": {"type": "string"}},
                "required": ["code"],
            }),
        },
        StubTool {
            name: "glob",
            description: "Find files matching a glob pattern",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"pattern": {"type": "string"}, "path": {"type": "string"}},
                "required": ["pattern"],
            }),
        },
        StubTool {
            name: "grep",
            description: "Search file contents for a regular expression",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"pattern": {"type": "string"}, "path": {"type": "string"}},
                "required": ["pattern"],
            }),
        },
        StubTool {
            name: "ls",
            description: "List files and directories at a path",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"path": {"type": "string"}},
                "required": ["path"],
            }),
        },
        StubTool {
            name: "todo_read",
            description: "Read the current session's todo list",
            parameters_schema: serde_json::json!({"type": "object", "properties": {}}),
        },
        StubTool {
            name: "todo_write",
            description: "Replace the current session's todo list",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"todos": {"type": "array"}},
                "required": ["todos"],
            }),
        },
        StubTool {
            name: "web_search",
            description: "Search the web and return titled, linked snippets",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"query": {"type": "string"}, "num_results": {"type": "integer"}},
                "required": ["query"],
            }),
        },
        StubTool {
            name: "webfetch",
            description: "Fetch a URL and convert its content to Markdown",
            parameters_schema: serde_json::json!({
                "type": "object",
                "properties": {"url": {"type": "string"}, "timeout": {"type": "integer"}},
                "required": ["url"],
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_tools_report_not_implemented() {
        use std::sync::Arc;

        use tokio::sync::mpsc::unbounded_channel;
        use tokio_util::sync::CancellationToken;

        use crate::agent::sub_agent::SubAgentSupervisor;
        use crate::tools::path_validator::PathValidator;
        use crate::types::AllowedDirectory;

        let dir = tempfile::tempdir().unwrap();
        let validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir.path()).unwrap()]));
        let (tx, _rx) = unbounded_channel();
        let mut ctx = ToolContext {
            path_validator: validator,
            supervisor: Arc::new(SubAgentSupervisor::new()),
            sink: tx,
            cancel: CancellationToken::new(),
            call_id: "call_stub".to_string(),
            parent_call_id: None,
        };

        for stub in all() {
            let err = stub.execute(&mut ctx, serde_json::Value::Null).await.unwrap_err();
            assert!(matches!(err, ToolError::NotImplemented(_)));
        }
    }
}
