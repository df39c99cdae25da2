//! Credential lifecycle and interactive authorization.
//!
//! # Lifecycle
//!
//! ```text
//!   load ──► VALID ─────────────────────────────────────────► use
//!    │
//!    ├──► EXPIRED_REFRESHABLE ──refresh ok──► persist ──────► use
//!    │             │
//!    │        refresh failed
//!    │             ▼
//!    └──► NO_CREDENTIAL ──► AWAITING_INTERACTIVE
//!                             set flag, send URL, wait for clear
//!                                       │
//!                            callback: exchange, persist, clear flag
//!                                       ▼
//!                                    reload ──────────────► use
//! ```
//!
//! The authorization code grant and the channel used to deliver the
//! authorization URL are behind [`OAuthGrant`] and [`Notifier`].

mod callback;
mod coordinator;
mod flag;
mod pkce;

pub use callback::AuthorizationCallback;
pub use coordinator::{
    AuthorizationCoordinator, AuthorizationReason, AuthorizationSettings, AuthorizationStatus,
    CredentialState,
};
pub use flag::{AuthorizationFlag, PendingAuthorization};
pub use pkce::PkceFlow;

use crate::credential::Credential;
use crate::error::ProviderResult;
use crate::provider::BoxFuture;

/// An OAuth 2.0 authorization code grant with PKCE.
pub trait OAuthGrant: Send + Sync {
    /// The scopes a usable credential must carry.
    fn scopes(&self) -> &[String];

    /// Builds the URL the user opens to grant access.
    fn authorization_url(&self, flow: &PkceFlow) -> String;

    /// Exchanges a refresh token for a new access token and its lifetime
    /// in seconds.
    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<(String, Option<i64>)>>;

    /// Exchanges an authorization code for a credential.
    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Credential>>;
}

/// Delivers text to the operator.
///
/// Delivery is best-effort: implementations log failures instead of
/// returning them.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, text: &'a str) -> BoxFuture<'a, ()>;
}
