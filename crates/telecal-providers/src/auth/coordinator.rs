//! Decides how to obtain a usable credential and drives the handoff to
//! interactive authorization.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::credential::{Credential, CredentialStore};
use crate::error::{ProviderError, ProviderResult};

use super::callback::AuthorizationCallback;
use super::flag::{AuthorizationFlag, PendingAuthorization};
use super::pkce::PkceFlow;
use super::{Notifier, OAuthGrant};

/// Where the stored credential stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialState {
    /// Nothing usable is stored.
    NoCredential,
    /// Not expired and carrying every required scope.
    Valid,
    /// Expired, but a refresh token is available.
    ExpiredRefreshable,
    /// A user has to grant access again.
    AwaitingInteractive,
}

impl CredentialState {
    /// Classifies a loaded credential against the required scopes.
    pub fn classify(credential: Option<&Credential>, scopes: &[String]) -> Self {
        match credential {
            None => Self::NoCredential,
            Some(c) if !c.has_scopes(scopes) => Self::AwaitingInteractive,
            Some(c) if !c.is_expired() => Self::Valid,
            Some(c) if c.can_refresh() => Self::ExpiredRefreshable,
            Some(_) => Self::AwaitingInteractive,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoCredential => "no_credential",
            Self::Valid => "valid",
            Self::ExpiredRefreshable => "expired_refreshable",
            Self::AwaitingInteractive => "awaiting_interactive",
        }
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why an interactive authorization was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationReason {
    NoCredential,
    RefreshFailed,
    MissingScopes,
}

impl AuthorizationReason {
    /// The message sent to the operator along with the authorization URL.
    pub fn prompt(&self, url: &str) -> String {
        match self {
            Self::RefreshFailed => format!("Google Token Error, creating new token:\n{url}"),
            Self::NoCredential | Self::MissingScopes => format!("Create new token:\n{url}"),
        }
    }
}

/// Timing of the interactive wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorizationSettings {
    /// How often the durable marker is re-checked.
    pub poll_interval: Duration,
    /// Upper bound for the wait. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for AuthorizationSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            timeout: None,
        }
    }
}

/// Snapshot of the authorization state, for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationStatus {
    pub state: CredentialState,
    pub pending: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Owns the credential slot and serializes access to it.
pub struct AuthorizationCoordinator {
    store: CredentialStore,
    flag: Arc<AuthorizationFlag>,
    grant: Arc<dyn OAuthGrant>,
    notifier: Arc<dyn Notifier>,
    settings: AuthorizationSettings,
    shutdown: Option<watch::Receiver<bool>>,
    lock: Mutex<()>,
}

impl AuthorizationCoordinator {
    pub fn new(
        store: CredentialStore,
        flag: Arc<AuthorizationFlag>,
        grant: Arc<dyn OAuthGrant>,
        notifier: Arc<dyn Notifier>,
        settings: AuthorizationSettings,
    ) -> Self {
        Self {
            store,
            flag,
            grant,
            notifier,
            settings,
            shutdown: None,
            lock: Mutex::new(()),
        }
    }

    /// Abandons interactive waits once `shutdown` turns true.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    fn is_stopping(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Returns a usable credential, obtaining one if necessary.
    ///
    /// Calls are serialized. When no usable credential can be produced
    /// locally, the authorization URL is sent through the notifier and the
    /// call waits until the authorization callback completes.
    ///
    /// # Errors
    ///
    /// - `AuthorizationTimeout` if a timeout is configured and elapses.
    /// - `AuthorizationIncomplete` if the wait ends with nothing stored.
    /// - `Cancelled` if the process starts shutting down first.
    /// - Storage errors from the credential or flag files.
    pub async fn ensure_credential(&self) -> ProviderResult<Credential> {
        let _guard = self.lock.lock().await;
        let scopes = self.grant.scopes();

        let credential = self.store.load()?;
        let reason = match CredentialState::classify(credential.as_ref(), scopes) {
            CredentialState::Valid => {
                if let Some(credential) = credential {
                    debug!(stage = "authorization", "stored credential is valid");
                    return Ok(credential);
                }
                AuthorizationReason::NoCredential
            }
            CredentialState::ExpiredRefreshable => match credential {
                Some(credential) => match self.refresh(credential).await {
                    Ok(credential) => return Ok(credential),
                    Err(e) => {
                        warn!(
                            stage = "authorization",
                            error = %e,
                            "token refresh failed, falling back to interactive authorization"
                        );
                        AuthorizationReason::RefreshFailed
                    }
                },
                None => AuthorizationReason::NoCredential,
            },
            CredentialState::NoCredential => {
                info!(stage = "authorization", "no stored credential");
                AuthorizationReason::NoCredential
            }
            CredentialState::AwaitingInteractive => {
                warn!(
                    stage = "authorization",
                    "stored credential lacks required scopes"
                );
                AuthorizationReason::MissingScopes
            }
        };

        self.authorize_interactively(reason).await
    }

    async fn refresh(&self, mut credential: Credential) -> ProviderResult<Credential> {
        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| ProviderError::authentication("no refresh token"))?;

        debug!(stage = "authorization", "refreshing expired access token");
        let (access_token, expires_in) = self.grant.refresh(&refresh_token).await?;
        credential.update_access_token(access_token, expires_in);
        self.store.save(&credential)?;
        info!(stage = "authorization", "access token refreshed");
        Ok(credential)
    }

    async fn authorize_interactively(
        &self,
        reason: AuthorizationReason,
    ) -> ProviderResult<Credential> {
        if self.is_stopping() {
            return Err(ProviderError::cancelled("server is shutting down"));
        }

        let flow = PkceFlow::new();
        // The marker must be durable before anyone can see the URL.
        self.flag.set(&PendingAuthorization::from_flow(&flow))?;

        let url = self.grant.authorization_url(&flow);
        info!(stage = "authorization", ?reason, "waiting for interactive authorization");
        self.notifier.notify(&reason.prompt(&url)).await;

        self.wait_for_callback().await?;

        match self.store.load()? {
            Some(credential) => {
                info!(stage = "authorization", "authorization completed");
                Ok(credential)
            }
            None => Err(ProviderError::authorization_incomplete(
                "authorization flag cleared but no credential was stored",
            )),
        }
    }

    /// Waits for the flag to clear, bounded by the timeout and by shutdown.
    /// The flag is left set when either ends the wait.
    async fn wait_for_callback(&self) -> ProviderResult<()> {
        let bounded = async {
            let cleared = self.flag.wait_cleared(self.settings.poll_interval);
            match self.settings.timeout {
                Some(limit) => tokio::time::timeout(limit, cleared).await.map_err(|_| {
                    warn!(stage = "authorization", "authorization timed out");
                    ProviderError::authorization_timeout(format!(
                        "authorization was not completed within {}s",
                        limit.as_secs()
                    ))
                }),
                None => {
                    cleared.await;
                    Ok(())
                }
            }
        };

        let Some(mut shutdown) = self.shutdown.clone() else {
            return bounded.await;
        };
        tokio::select! {
            result = bounded => result,
            Ok(_) = shutdown.wait_for(|stop| *stop) => {
                warn!(stage = "authorization", "shutting down, abandoning authorization wait");
                Err(ProviderError::cancelled("server is shutting down"))
            }
        }
    }

    /// Returns the authorization URL of the pending session, starting a new
    /// session if none is pending.
    pub fn begin_authorization(&self) -> ProviderResult<String> {
        let flow = match self.flag.pending() {
            Ok(Some(pending)) => pending.flow(),
            Ok(None) | Err(_) => {
                let flow = PkceFlow::new();
                self.flag.set(&PendingAuthorization::from_flow(&flow))?;
                flow
            }
        };
        Ok(self.grant.authorization_url(&flow))
    }

    /// Builds the handler that completes authorizations started here.
    pub fn callback(&self) -> AuthorizationCallback {
        AuthorizationCallback::new(
            self.store.clone(),
            Arc::clone(&self.flag),
            Arc::clone(&self.grant),
        )
    }

    /// Reports the state of the stored credential without changing it
    /// beyond the store's own cleanup.
    pub fn status(&self) -> ProviderResult<AuthorizationStatus> {
        let credential = self.store.load()?;
        Ok(AuthorizationStatus {
            state: CredentialState::classify(credential.as_ref(), self.grant.scopes()),
            pending: self.flag.is_set(),
            expires_at: credential.and_then(|c| c.expires_at),
        })
    }

    /// Forgets the stored credential and any pending session.
    ///
    /// This is the operator's cancel: a request waiting on the pending
    /// session ends with `AuthorizationIncomplete`.
    pub fn reset(&self) -> ProviderResult<()> {
        self.store.clear()?;
        self.flag.clear()
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn flag(&self) -> &AuthorizationFlag {
        &self.flag
    }
}
