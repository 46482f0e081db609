//! Outbound request shaping: auth headers, beta features, and the oauth
//! identity preamble.
//!
//! Grounded on `llm::anthropic::{AuthProvider, RequestCustomizer}` — the
//! teacher already splits "how do I authenticate" from "what else do I
//! stamp on the request" into two small traits rather than one god-object.
//! spec.md §4.4 and REDESIGN FLAGS ask for this to be an explicit transform
//! applied by the caller, not a monkeypatched HTTP client, so both become
//! one `RequestInterceptor::prepare` call instead of trait objects plugged
//! into a client constructor.

use std::sync::Arc;

use reqwest::header::HeaderValue;
use reqwest::RequestBuilder;

use crate::auth::{AuthError, Credentials, TokenManager};
use crate::config::AnthropicConfig;
use crate::types::{ModelContentBlock, ModelMessage, ModelRole};

#[derive(Debug, thiserror::Error)]
pub enum InterceptorError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("invalid header value: {0}")]
    InvalidHeader(String),
}

/// Rewrites an outbound `reqwest::RequestBuilder` with provider auth and
/// identity headers before the adapter sends it.
pub struct RequestInterceptor {
    token_manager: Arc<TokenManager>,
}

impl RequestInterceptor {
    pub fn new(token_manager: Arc<TokenManager>) -> Self {
        Self { token_manager }
    }

    /// Apply auth, beta, and version headers. Returns the rewritten builder
    /// plus whether the caller authenticated via oauth — `AnthropicAdapter`
    /// uses that to decide whether [`Self::inject_identity`] runs, since
    /// that part touches `ModelRequest.messages`, which this function
    /// doesn't see.
    pub async fn prepare(
        &self,
        builder: RequestBuilder,
    ) -> Result<(RequestBuilder, bool), InterceptorError> {
        let creds = self.token_manager.credentials().await?;

        let (builder, is_oauth) = match creds {
            Credentials::OAuth { .. } => {
                let token = self.token_manager.get_valid_token().await?;
                // Oauth callers never carry an x-api-key header — we build
                // every request here rather than via a pre-populated
                // client, so there is nothing to strip.
                (builder.header("authorization", header_value(&format!("Bearer {token}"))?), true)
            }
            Credentials::Api { key } => (builder.header("x-api-key", header_value(&key)?), false),
        };

        let builder = builder
            .header("anthropic-version", AnthropicConfig::ANTHROPIC_VERSION)
            .header("anthropic-beta", AnthropicConfig::beta_header())
            .header("user-agent", "vibecore/0.1");

        Ok((builder, is_oauth))
    }

    /// Prepend the Claude-Code identity line to the system prompt, per
    /// spec.md §4.4. Only called for oauth callers.
    pub fn inject_identity(&self, messages: &mut Vec<ModelMessage>) {
        if let Some(system) = messages.iter_mut().find(|m| m.role == ModelRole::System) {
            for block in &mut system.content {
                if let ModelContentBlock::Text { text, .. } = block {
                    *text = format!("{}\n\n{}", AnthropicConfig::CLAUDE_CODE_IDENTITY, text);
                    return;
                }
            }
        }
        messages.insert(0, ModelMessage::system(AnthropicConfig::CLAUDE_CODE_IDENTITY));
    }
}

fn header_value(s: &str) -> Result<HeaderValue, InterceptorError> {
    HeaderValue::from_str(s).map_err(|e| InterceptorError::InvalidHeader(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inject_identity_prepends_to_existing_system_message() {
        let token_manager = Arc::new(TokenManager::new(
            Arc::new(crate::auth::AuthStore::at_path(std::env::temp_dir().join("vibecore-test-unused.json"))),
            "anthropic",
        ));
        let interceptor = RequestInterceptor::new(token_manager);
        let mut messages = vec![ModelMessage::system("be helpful"), ModelMessage::user("hi")];
        interceptor.inject_identity(&mut messages);
        let ModelContentBlock::Text { text, .. } = &messages[0].content[0] else {
            unreachable!()
        };
        assert!(text.starts_with(AnthropicConfig::CLAUDE_CODE_IDENTITY));
        assert!(text.ends_with("be helpful"));
    }

    #[test]
    fn inject_identity_inserts_leading_system_message_when_absent() {
        let token_manager = Arc::new(TokenManager::new(
            Arc::new(crate::auth::AuthStore::at_path(std::env::temp_dir().join("vibecore-test-unused2.json"))),
            "anthropic",
        ));
        let interceptor = RequestInterceptor::new(token_manager);
        let mut messages = vec![ModelMessage::user("hi")];
        interceptor.inject_identity(&mut messages);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, ModelRole::System);
    }
}
