//! Durable "authorization pending" marker.
//!
//! The marker is a file whose presence means an interactive authorization
//! has been requested and not yet completed. Its content is the pending
//! PKCE session, so the callback can finish the code exchange even when it
//! is handled by a different process than the one that started it.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};

use super::pkce::PkceFlow;

/// The PKCE session of an authorization in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub state: String,
    pub verifier: String,
    pub created_at: DateTime<Utc>,
}

impl PendingAuthorization {
    pub fn from_flow(flow: &PkceFlow) -> Self {
        Self {
            state: flow.state.clone(),
            verifier: flow.verifier.clone(),
            created_at: Utc::now(),
        }
    }

    /// Rebuilds the PKCE flow this session was created from.
    pub fn flow(&self) -> PkceFlow {
        PkceFlow::from_parts(self.verifier.clone(), self.state.clone())
    }
}

/// File marker plus an in-process wake-up for waiters.
#[derive(Debug)]
pub struct AuthorizationFlag {
    path: PathBuf,
    cleared: Notify,
}

impl AuthorizationFlag {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cleared: Notify::new(),
        }
    }

    /// Marks authorization as pending, replacing any previous session.
    pub fn set(&self, pending: &PendingAuthorization) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!("failed to create flag directory: {}", e))
            })?;
        }

        let temp_path = self.path.with_extension("tmp");
        let content = serde_json::to_string(pending).map_err(|e| {
            ProviderError::internal(format!("failed to serialize pending session: {}", e))
        })?;
        fs::write(&temp_path, content).map_err(|e| {
            ProviderError::configuration(format!("failed to write flag file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = fs::set_permissions(&temp_path, fs::Permissions::from_mode(0o600));
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename flag file: {}", e))
        })?;

        info!(stage = "authorization", "authorization flag set at {:?}", self.path);
        Ok(())
    }

    /// Returns true while an authorization is pending.
    pub fn is_set(&self) -> bool {
        self.path.exists()
    }

    /// Reads the pending session, if any.
    pub fn pending(&self) -> ProviderResult<Option<PendingAuthorization>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ProviderError::configuration(format!(
                    "failed to read flag file: {}",
                    e
                )));
            }
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            ProviderError::invalid_response(format!("pending session is unreadable: {}", e))
        })
    }

    /// Clears the marker and wakes every in-process waiter.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!(stage = "authorization", "authorization flag cleared"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(ProviderError::configuration(format!(
                    "failed to remove flag file: {}",
                    e
                )));
            }
        }
        self.cleared.notify_waiters();
        Ok(())
    }

    /// Waits until the marker is gone.
    ///
    /// Wakes on [`clear`](Self::clear) from this process and otherwise
    /// re-checks the file every `poll_interval`.
    pub async fn wait_cleared(&self, poll_interval: Duration) {
        loop {
            let notified = self.cleared.notified();
            tokio::pin!(notified);
            // register before checking so a clear in between is not missed
            notified.as_mut().enable();

            if !self.is_set() {
                return;
            }

            tokio::select! {
                _ = notified => debug!("woken by authorization callback"),
                _ = tokio::time::sleep(poll_interval) => {}
            }
        }
    }

    /// Returns the marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn pending() -> PendingAuthorization {
        PendingAuthorization::from_flow(&PkceFlow::new())
    }

    #[test]
    fn flag_set_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let flag = AuthorizationFlag::new(dir.path().join("auth.pending"));
        assert!(!flag.is_set());
        assert!(flag.pending().unwrap().is_none());

        let session = pending();
        flag.set(&session).unwrap();
        assert!(flag.is_set());
        assert_eq!(flag.pending().unwrap(), Some(session));

        flag.clear().unwrap();
        assert!(!flag.is_set());
        // clearing twice is fine
        flag.clear().unwrap();
    }

    #[test]
    fn flag_set_overwrites_session() {
        let dir = tempfile::tempdir().unwrap();
        let flag = AuthorizationFlag::new(dir.path().join("auth.pending"));

        flag.set(&pending()).unwrap();
        let second = pending();
        flag.set(&second).unwrap();
        assert_eq!(flag.pending().unwrap(), Some(second));
    }

    #[test]
    fn flag_survives_new_instance() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.pending");
        let session = pending();
        AuthorizationFlag::new(&path).set(&session).unwrap();

        let reopened = AuthorizationFlag::new(&path);
        assert!(reopened.is_set());
        assert_eq!(reopened.pending().unwrap().unwrap().flow().state, session.state);
    }

    #[test]
    fn flag_unreadable_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.pending");
        fs::write(&path, "garbage").unwrap();

        let flag = AuthorizationFlag::new(&path);
        assert!(flag.is_set());
        assert!(flag.pending().is_err());
    }

    #[tokio::test]
    async fn wait_returns_immediately_when_clear() {
        let dir = tempfile::tempdir().unwrap();
        let flag = AuthorizationFlag::new(dir.path().join("auth.pending"));
        tokio::time::timeout(Duration::from_secs(1), flag.wait_cleared(Duration::from_secs(60)))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn wait_woken_by_clear() {
        let dir = tempfile::tempdir().unwrap();
        let flag = Arc::new(AuthorizationFlag::new(dir.path().join("auth.pending")));
        flag.set(&pending()).unwrap();

        let waiter = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move { flag.wait_cleared(Duration::from_secs(3600)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        flag.clear().unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn wait_notices_external_removal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auth.pending");
        let flag = Arc::new(AuthorizationFlag::new(&path));
        flag.set(&pending()).unwrap();

        let waiter = {
            let flag = Arc::clone(&flag);
            tokio::spawn(async move { flag.wait_cleared(Duration::from_millis(10)).await })
        };

        // another process completing the callback only removes the file
        fs::remove_file(&path).unwrap();

        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
