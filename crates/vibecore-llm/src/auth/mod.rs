//! On-disk credential storage, PKCE/OAuth flow, and token refresh.
//!
//! Grounded on `original_source/src/vibecore/auth/*.py`: the Python
//! prototype splits this into `models`, `storage`, `pkce`, `oauth_flow`,
//! `token_manager`, and `manager` (a thin facade). We keep the same split
//! as Rust submodules.

mod models;
mod oauth_flow;
mod pkce;
mod storage;
mod token_manager;

pub use models::{AuthError, Credentials};
pub use oauth_flow::{AuthorizationRequest, OAuthFlow};
pub use pkce::PkceChallenge;
pub use storage::AuthStore;
pub use token_manager::TokenManager;
