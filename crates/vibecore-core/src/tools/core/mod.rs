mod dyn_tool;
mod registry;
mod spec;
mod tool;

pub use dyn_tool::DynTool;
pub use registry::{McpTool, ToolRegistry};
pub use spec::ToolSpec;
pub use tool::{Tool, ToolContext, ToolError};
