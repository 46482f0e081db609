//! Fixed constants for talking to the Anthropic API as Claude Code.
//!
//! Mirrors `original_source/src/vibecore/auth/config.py`'s `AnthropicConfig`:
//! one `Final`-style struct of constants rather than scattered literals.

/// OAuth + beta-header + endpoint constants for the Anthropic provider.
pub struct AnthropicConfig;

impl AnthropicConfig {
    pub const OAUTH_CLIENT_ID: &'static str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
    pub const OAUTH_SCOPES: &'static str = "org:create_api_key user:profile user:inference";
    pub const OAUTH_REDIRECT_URI: &'static str =
        "https://console.anthropic.com/oauth/code/callback";
    pub const OAUTH_RESPONSE_TYPE: &'static str = "code";
    pub const OAUTH_CODE_CHALLENGE_METHOD: &'static str = "S256";

    pub const CLAUDE_AI_AUTHORIZE: &'static str = "https://claude.ai/oauth/authorize";
    pub const CONSOLE_AUTHORIZE: &'static str = "https://console.anthropic.com/oauth/authorize";
    pub const TOKEN_EXCHANGE: &'static str = "https://console.anthropic.com/v1/oauth/token";
    pub const API_BASE: &'static str = "https://api.anthropic.com";
    pub const MESSAGES_PATH: &'static str = "/v1/messages";
    pub const ANTHROPIC_VERSION: &'static str = "2023-06-01";

    pub const BETA_OAUTH: &'static str = "oauth-2025-04-20";
    pub const BETA_CLAUDE_CODE: &'static str = "claude-code-20250219";
    pub const BETA_INTERLEAVED_THINKING: &'static str = "interleaved-thinking-2025-05-14";

    /// Refresh the access token this many seconds before it actually expires.
    pub const TOKEN_REFRESH_BUFFER_SECONDS: i64 = 300;
    pub const TOKEN_MAX_RETRY_ATTEMPTS: u32 = 3;
    pub const TOKEN_RETRY_BASE_DELAY_MS: u64 = 1000;

    /// Prepended to the system prompt for oauth callers, identifying us as
    /// the client the provider's oauth scope was issued to.
    pub const CLAUDE_CODE_IDENTITY: &'static str =
        "You are Claude Code, Anthropic's official CLI for Claude.";

    /// Comma-joined beta feature list sent on every request.
    pub fn beta_header() -> String {
        [
            Self::BETA_OAUTH,
            Self::BETA_CLAUDE_CODE,
            Self::BETA_INTERLEAVED_THINKING,
        ]
        .join(",")
    }
}
