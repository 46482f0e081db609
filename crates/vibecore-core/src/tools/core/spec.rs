//! Tool metadata advertised to the model.
//!
//! Grounded on `tools/core/spec.rs::ToolSpec`, trimmed to what spec.md §3's
//! `ToolDescriptor` actually needs — the teacher's `annotations` and
//! `supported_modes` fields exist for its GPUI/MCP-server dual surface,
//! which this engine doesn't have.

#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters_schema: serde_json::Value,
}

impl From<&ToolSpec> for vibecore_llm::ToolDefinition {
    fn from(spec: &ToolSpec) -> Self {
        vibecore_llm::ToolDefinition {
            name: spec.name.to_string(),
            description: spec.description.to_string(),
            parameters_schema: spec.parameters_schema.clone(),
        }
    }
}
