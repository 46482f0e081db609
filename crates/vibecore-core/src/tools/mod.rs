pub mod core;
mod impls;
pub mod path_validator;

pub use impls::{build_registry, ExecuteCommandInput, ExecuteCommandTool, ReadFileInput, ReadFileTool, StubTool, TaskInput, TaskTool};
