use chrono::Utc;

use super::models::{AuthError, Credentials};
use super::pkce::PkceChallenge;
use crate::config::AnthropicConfig;

/// An authorization URL plus the PKCE verifier the caller must hang on to
/// for the subsequent exchange.
///
/// Grounded on `auth/oauth_flow.py`'s `AuthorizationRequest`.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    pub url: String,
    pub verifier: String,
}

/// Drives the authorization-code + PKCE exchange described in spec.md §6.2.
///
/// This struct is deliberately stateless between `initiate` and `exchange`
/// calls (the verifier is threaded through explicitly) rather than holding
/// `self.pkce_challenge: Option<...>` the way `AnthropicOAuthFlow` does in
/// Python — the engine is expected to run many concurrent logins (or none),
/// so mutable shared state here would just be a footgun.
pub struct OAuthFlow {
    http: reqwest::Client,
}

impl OAuthFlow {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Build the authorization URL. `mode = "max"` targets claude.ai,
    /// anything else targets console.anthropic.com.
    pub fn initiate(&self, mode: &str) -> AuthorizationRequest {
        let pkce = PkceChallenge::generate();
        let base = if mode == "max" {
            AnthropicConfig::CLAUDE_AI_AUTHORIZE
        } else {
            AnthropicConfig::CONSOLE_AUTHORIZE
        };

        let params = [
            ("code", "true".to_string()),
            ("client_id", AnthropicConfig::OAUTH_CLIENT_ID.to_string()),
            (
                "response_type",
                AnthropicConfig::OAUTH_RESPONSE_TYPE.to_string(),
            ),
            ("redirect_uri", AnthropicConfig::OAUTH_REDIRECT_URI.to_string()),
            ("scope", AnthropicConfig::OAUTH_SCOPES.to_string()),
            ("code_challenge", pkce.challenge.clone()),
            (
                "code_challenge_method",
                AnthropicConfig::OAUTH_CODE_CHALLENGE_METHOD.to_string(),
            ),
            // State equals the verifier, per spec.md §6.2.
            ("state", pkce.verifier.clone()),
        ];
        let query = urlencoding_encode_params(&params);

        AuthorizationRequest {
            url: format!("{base}?{query}"),
            verifier: pkce.verifier,
        }
    }

    /// Exchange a pasted `code#state` token for credentials.
    pub async fn exchange(
        &self,
        auth_code: &str,
        verifier: &str,
    ) -> Result<Credentials, AuthError> {
        let mut parts = auth_code.splitn(2, '#');
        let code = parts
            .next()
            .filter(|s| !s.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;
        let state = parts.next().ok_or(AuthError::NotAuthenticated)?;

        let body = serde_json::json!({
            "code": code,
            "state": state,
            "grant_type": "authorization_code",
            "client_id": AnthropicConfig::OAUTH_CLIENT_ID,
            "redirect_uri": AnthropicConfig::OAUTH_REDIRECT_URI,
            "code_verifier": verifier,
        });

        let response = self
            .http
            .post(AnthropicConfig::TOKEN_EXCHANGE)
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::AuthTransient(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::AuthTransient(format!(
                "token exchange failed: {}",
                response.status()
            )));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::AuthTransient(e.to_string()))?;

        Ok(Credentials::OAuth {
            refresh: tokens.refresh_token,
            access: tokens.access_token,
            expires: Utc::now().timestamp_millis() + tokens.expires_in * 1000,
        })
    }
}

impl Default for OAuthFlow {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(serde::Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
}

fn urlencoding_encode_params(params: &[(&str, String)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}
