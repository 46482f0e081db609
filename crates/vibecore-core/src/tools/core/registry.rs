//! Central, read-only-after-construction map of invokable tools.
//!
//! Grounded on `tools/core/registry.rs::ToolRegistry` for the
//! `HashMap<String, Box<dyn DynTool>>` shape, and on
//! `examples/lanegrid-agtrace/crates/agtrace-types/src/models/tool.rs`'s
//! `McpArgs::parse_name`/`server_name`/`tool_name` for the `mcp__S__T`
//! mangling spec.md §4.6 asks for on external tools.

use std::collections::HashMap;

use serde_json::Value;

use super::dyn_tool::DynTool;
use super::spec::ToolSpec;
use super::tool::{ToolContext, ToolError};

/// An external (MCP) tool's identity, named by its originating server.
pub struct McpTool {
    pub server: String,
    pub name: String,
    pub description: String,
    pub parameters_schema: Value,
}

pub struct ToolRegistry {
    local: HashMap<String, Box<dyn DynTool>>,
    mcp: HashMap<String, McpTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self { local: HashMap::new(), mcp: HashMap::new() }
    }

    pub fn register(&mut self, tool: Box<dyn DynTool>) {
        self.local.insert(tool.spec().name.to_string(), tool);
    }

    /// Register a tool exposed by an external MCP server. Stored under its
    /// mangled name so lookups by the model's tool-call name work
    /// directly.
    pub fn register_mcp_tool(&mut self, tool: McpTool) {
        let mangled = mangle(&tool.server, &tool.name);
        self.mcp.insert(mangled, tool);
    }

    /// Parse `mcp__{server}__{tool}` into its parts. Grounded on
    /// `McpArgs::parse_name`.
    pub fn demangle(full_name: &str) -> Option<(String, String)> {
        let rest = full_name.strip_prefix("mcp__")?;
        let mut parts = rest.splitn(2, "__");
        let server = parts.next()?;
        let tool = parts.next()?;
        Some((server.to_string(), tool.to_string()))
    }

    pub async fn dispatch(
        &self,
        name: &str,
        ctx: &mut ToolContext,
        arguments: Value,
    ) -> Result<String, ToolError> {
        if let Some(tool) = self.local.get(name) {
            return tool.invoke(ctx, arguments).await;
        }

        if Self::demangle(name).is_some() {
            // MCP tool invocation is delegated to the owning server's
            // transport, which this crate doesn't implement — see
            // SPEC_FULL.md §8's scoped-down tool set. The registry still
            // demangles so callers get a clean error referencing the real
            // tool name rather than the wire-mangled one.
            return Err(ToolError::NotImplemented(name.to_string()));
        }

        Err(ToolError::UnknownTool(name.to_string()))
    }

    /// Tool definitions to advertise to the model: local tools by their
    /// plain name, MCP tools re-mangled to `mcp__{server}__{tool}`.
    pub fn tool_definitions(&self) -> Vec<vibecore_llm::ToolDefinition> {
        let local = self.local.values().map(|t| vibecore_llm::ToolDefinition::from(&t.spec()));
        let mcp = self.mcp.values().map(|t| vibecore_llm::ToolDefinition {
            name: mangle(&t.server, &t.name),
            description: t.description.clone(),
            parameters_schema: t.parameters_schema.clone(),
        });
        local.chain(mcp).collect()
    }

    pub fn spec(&self, name: &str) -> Option<ToolSpec> {
        self.local.get(name).map(|t| t.spec())
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn mangle(server: &str, tool: &str) -> String {
    format!("mcp__{server}__{tool}")
}
