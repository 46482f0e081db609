use serde::{Deserialize, Serialize};

use crate::config::AnthropicConfig;

/// Credentials for a single provider, tagged by auth method.
///
/// Mirrors `auth/models.py`'s `OAuthCredentials | ApiKeyCredentials` union,
/// collapsed into one serde-tagged enum per spec.md §3 ("Credentials:
/// tagged variant { oauth: ... | api: ... }").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Credentials {
    #[serde(rename = "oauth")]
    OAuth {
        refresh: String,
        access: String,
        /// Unix timestamp in milliseconds.
        expires: i64,
    },
    #[serde(rename = "api")]
    Api { key: String },
}

impl Credentials {
    /// True once `expires - now < refresh-buffer` (spec.md §3 Invariant).
    pub fn needs_refresh(&self, now_ms: i64) -> bool {
        match self {
            Credentials::Api { .. } => false,
            Credentials::OAuth { access, expires, .. } => {
                access.is_empty()
                    || *expires <= now_ms + AnthropicConfig::TOKEN_REFRESH_BUFFER_SECONDS * 1000
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("not authenticated")]
    NotAuthenticated,
    #[error("authentication expired, please re-authenticate")]
    AuthExpired,
    #[error("token refresh failed after retries: {0}")]
    AuthTransient(String),
    #[error("cannot refresh non-oauth credentials")]
    NotOAuth,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
