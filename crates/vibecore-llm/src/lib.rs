//! Provider-facing half of the vibecore engine: credentials, token refresh,
//! request shaping, and the raw streaming decode for the Anthropic API.
//!
//! This crate never touches the on-disk session log or the tool registry —
//! those live in `vibecore-core`, which depends on this crate for
//! `ModelAdapter` and the auth stack.

pub mod auth;
pub mod config;
pub mod interceptor;
pub mod model;
pub mod streaming;
pub mod types;

pub use auth::{AuthStore, Credentials, TokenManager};
pub use config::AnthropicConfig;
pub use interceptor::RequestInterceptor;
pub use model::{AnthropicAdapter, ModelAdapter, ModelError};
pub use streaming::AnthropicStreamEvent;
pub use types::{ModelContentBlock, ModelMessage, ModelRequest, ModelRole, ToolDefinition};
