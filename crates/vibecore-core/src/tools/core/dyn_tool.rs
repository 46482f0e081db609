//! Type erasure so heterogeneous tools can share one registry map.
//!
//! Grounded on `tools/core/dyn_tool.rs`: a blanket `impl<T: Tool> DynTool
//! for T` that deserializes JSON arguments into `T::Input`, executes, and
//! renders the output to a string — collapsing the teacher's
//! `AnyOutput`/`Render` split (which exists to support both LLM-context and
//! UI rendering) since this engine only needs the single textual result
//! spec.md §4.6 asks for.

use async_trait::async_trait;
use serde_json::Value;

use super::spec::ToolSpec;
use super::tool::{Tool, ToolContext, ToolError};

#[async_trait]
pub trait DynTool: Send + Sync + 'static {
    fn spec(&self) -> ToolSpec;

    async fn invoke(&self, ctx: &mut ToolContext, arguments: Value) -> Result<String, ToolError>;
}

#[async_trait]
impl<T> DynTool for T
where
    T: Tool,
{
    fn spec(&self) -> ToolSpec {
        Tool::spec(self)
    }

    async fn invoke(&self, ctx: &mut ToolContext, arguments: Value) -> Result<String, ToolError> {
        let input: T::Input = serde_json::from_value(arguments)
            .map_err(|e| ToolError::InvalidArguments(e.to_string()))?;
        let output = self.execute(ctx, input).await?;
        Ok(self.render(&output))
    }
}
