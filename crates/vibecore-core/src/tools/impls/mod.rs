mod execute_command;
mod read_file;
mod stub;
mod task;

pub use execute_command::{ExecuteCommandInput, ExecuteCommandTool};
pub use read_file::{ReadFileInput, ReadFileTool};
pub use stub::{all as stub_tools, StubTool};
pub use task::{TaskInput, TaskTool};

use super::core::ToolRegistry;

/// Builds a registry carrying every tool this engine implements, plus a
/// registration-only stub for each tool SPEC_FULL.md's Non-goals scope out
/// of real implementation but still advertise to the model.
pub fn build_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(ReadFileTool));
    registry.register(Box::new(ExecuteCommandTool));
    registry.register(Box::new(TaskTool));
    for stub in stub_tools() {
        registry.register(Box::new(stub));
    }
    registry
}
