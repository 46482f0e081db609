use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::models::{AuthError, Credentials};
use super::storage::AuthStore;
use crate::config::AnthropicConfig;

/// Refreshes OAuth access tokens with a process-wide single-flight guard,
/// per spec.md §4.3 and the `TokenRefreshGate` entity in spec.md §3.
///
/// Grounded on `auth/token_manager.py`'s `TokenRefreshManager`: load, check
/// expiry against a buffer, and only take the `asyncio.Lock` (here a
/// `tokio::sync::Mutex`) when a refresh is actually needed — then re-check
/// under the lock in case a racing caller already refreshed, satisfying
/// spec.md §8 invariant 6 ("at most one concurrent OAuth refresh in flight
/// per credential") and end-to-end scenario S6.
pub struct TokenManager {
    store: Arc<AuthStore>,
    provider: String,
    refresh_gate: Mutex<()>,
    http: reqwest::Client,
}

impl TokenManager {
    pub fn new(store: Arc<AuthStore>, provider: impl Into<String>) -> Self {
        Self {
            store,
            provider: provider.into(),
            refresh_gate: Mutex::new(()),
            http: reqwest::Client::new(),
        }
    }

    /// The stored credentials as-is, without triggering a refresh. Used by
    /// `RequestInterceptor` to decide which header scheme applies.
    pub async fn credentials(&self) -> Result<Credentials, AuthError> {
        self.store.load(&self.provider)?.ok_or(AuthError::NotAuthenticated)
    }

    pub async fn get_valid_token(&self) -> Result<String, AuthError> {
        let creds = self
            .store
            .load(&self.provider)?
            .ok_or(AuthError::NotAuthenticated)?;

        match &creds {
            Credentials::Api { key } => return Ok(key.clone()),
            Credentials::OAuth { access, .. } => {
                if !creds.needs_refresh(Utc::now().timestamp_millis()) {
                    return Ok(access.clone());
                }
            }
        }

        let _permit = self.refresh_gate.lock().await;

        // Re-check: another caller may have refreshed while we waited.
        if let Some(creds) = self.store.load(&self.provider)? {
            if let Credentials::OAuth { access, .. } = &creds {
                if !creds.needs_refresh(Utc::now().timestamp_millis()) {
                    return Ok(access.clone());
                }
            }
        }

        let refresh_token = match self.store.load(&self.provider)? {
            Some(Credentials::OAuth { refresh, .. }) => refresh,
            Some(Credentials::Api { .. }) => return Err(AuthError::NotOAuth),
            None => return Err(AuthError::NotAuthenticated),
        };

        self.refresh(&refresh_token).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, AuthError> {
        let mut last_error = None;

        for attempt in 0..AnthropicConfig::TOKEN_MAX_RETRY_ATTEMPTS {
            if attempt > 0 {
                let delay = AnthropicConfig::TOKEN_RETRY_BASE_DELAY_MS * (1 << (attempt - 1));
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            match self.exchange_refresh_token(refresh_token).await {
                Ok(creds) => {
                    let access = match &creds {
                        Credentials::OAuth { access, .. } => access.clone(),
                        Credentials::Api { .. } => unreachable!("refresh always yields oauth"),
                    };
                    self.store.save(&self.provider, &creds)?;
                    return Ok(access);
                }
                Err(RefreshOutcome::InvalidGrant(detail)) => {
                    warn!(detail, "oauth refresh token rejected");
                    return Err(AuthError::AuthExpired);
                }
                Err(RefreshOutcome::Transient(detail)) => {
                    debug!(attempt, detail, "token refresh attempt failed, retrying");
                    last_error = Some(detail);
                }
            }
        }

        Err(AuthError::AuthTransient(last_error.unwrap_or_default()))
    }

    async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Credentials, RefreshOutcome> {
        let body = serde_json::json!({
            "grant_type": "refresh_token",
            "refresh_token": refresh_token,
            "client_id": AnthropicConfig::OAUTH_CLIENT_ID,
        });

        let response = self
            .http
            .post(AnthropicConfig::TOKEN_EXCHANGE)
            .json(&body)
            .send()
            .await
            .map_err(|e| RefreshOutcome::Transient(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let text = response.text().await.unwrap_or_default();
            if text.contains("invalid_grant") || status.as_u16() == 401 {
                return Err(RefreshOutcome::InvalidGrant(text));
            }
            return Err(RefreshOutcome::Transient(format!("{status}: {text}")));
        }
        if !status.is_success() {
            return Err(RefreshOutcome::Transient(format!("status {status}")));
        }

        let body: TokenResponseBody = response
            .json()
            .await
            .map_err(|e| RefreshOutcome::Transient(e.to_string()))?;

        // Preserve the existing refresh token unless the response supplies
        // a new one (spec.md §9 open question).
        let new_refresh = body.refresh_token.unwrap_or_else(|| refresh_token.to_string());

        Ok(Credentials::OAuth {
            refresh: new_refresh,
            access: body.access_token,
            expires: Utc::now().timestamp_millis() + body.expires_in * 1000,
        })
    }
}

enum RefreshOutcome {
    InvalidGrant(String),
    Transient(String),
}

#[derive(serde::Deserialize)]
struct TokenResponseBody {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}
