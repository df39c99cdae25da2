//! Completion side of interactive authorization.

use std::sync::Arc;

use tracing::{info, warn};

use crate::credential::CredentialStore;
use crate::error::{ProviderError, ProviderResult};

use super::OAuthGrant;
use super::flag::AuthorizationFlag;

/// Exchanges the code delivered to the redirect URI and releases waiters.
#[derive(Clone)]
pub struct AuthorizationCallback {
    store: CredentialStore,
    flag: Arc<AuthorizationFlag>,
    grant: Arc<dyn OAuthGrant>,
}

impl AuthorizationCallback {
    pub fn new(
        store: CredentialStore,
        flag: Arc<AuthorizationFlag>,
        grant: Arc<dyn OAuthGrant>,
    ) -> Self {
        Self { store, flag, grant }
    }

    /// Completes the pending authorization with `code`.
    ///
    /// `state` must match the pending session. The credential is persisted
    /// before the flag is cleared, so a woken waiter always finds it.
    pub async fn complete(&self, code: &str, state: &str) -> ProviderResult<()> {
        let pending = self
            .flag
            .pending()?
            .ok_or_else(|| ProviderError::authorization("no authorization is pending"))?;

        if pending.state != state {
            warn!(stage = "authorization", "callback state does not match pending session");
            return Err(ProviderError::authentication(
                "OAuth state mismatch - possible CSRF attack",
            ));
        }

        let credential = self.grant.exchange_code(code, &pending.verifier).await?;
        self.store.save(&credential)?;
        self.flag.clear()?;

        info!(stage = "authorization", "authorization callback completed");
        Ok(())
    }
}
