//! OAuth credential persistence.
//!
//! A single credential is stored as JSON in one file. Reads heal the slot:
//! a file that cannot be parsed, or a credential that cannot be refreshed,
//! is deleted and reported as absent.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{ProviderError, ProviderResult};

/// Seconds subtracted from the reported lifetime so refreshes happen early.
const EXPIRY_MARGIN_SECS: i64 = 60;

/// An OAuth token set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// The access token for API requests.
    pub access_token: String,

    /// The refresh token for obtaining new access tokens.
    pub refresh_token: Option<String>,

    /// When the access token expires.
    pub expires_at: Option<DateTime<Utc>>,

    /// The OAuth scopes that were granted.
    pub scopes: Vec<String>,

    /// When the tokens were last refreshed.
    pub last_refresh: DateTime<Utc>,
}

impl Credential {
    /// Creates a credential from token endpoint data.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: Option<String>,
        expires_in_secs: Option<i64>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
            expires_at: expires_in_secs.map(expiry_from_now),
            scopes,
            last_refresh: Utc::now(),
        }
    }

    /// Returns true if the access token is expired or about to expire.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() >= expires_at,
            None => false,
        }
    }

    /// Returns true if the token has the required scopes.
    pub fn has_scopes(&self, required: &[String]) -> bool {
        required.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Returns true if the credential can be used right away.
    pub fn is_valid(&self, required: &[String]) -> bool {
        !self.is_expired() && self.has_scopes(required)
    }

    /// Returns true if a refresh token is present.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// Updates the access token after a refresh.
    pub fn update_access_token(
        &mut self,
        access_token: impl Into<String>,
        expires_in_secs: Option<i64>,
    ) {
        self.access_token = access_token.into();
        self.expires_at = expires_in_secs.map(expiry_from_now);
        self.last_refresh = Utc::now();
    }
}

fn expiry_from_now(secs: i64) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(secs) - Duration::seconds(EXPIRY_MARGIN_SECS)
}

/// File-backed single-slot credential storage.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the stored credential.
    ///
    /// Returns `Ok(None)` when no file exists, when the file is unreadable
    /// as a credential, or when the credential has no refresh token. In the
    /// last two cases the file is deleted.
    pub fn load(&self) -> ProviderResult<Option<Credential>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no credential file at {:?}", self.path);
                return Ok(None);
            }
            Err(e) => {
                return Err(ProviderError::configuration(format!(
                    "failed to read credential file: {}",
                    e
                ))
                .with_source(e));
            }
        };

        let credential: Credential = match serde_json::from_str(&content) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(
                    stage = "authorization",
                    error = %e,
                    "credential file is corrupt, discarding {:?}",
                    self.path
                );
                self.clear()?;
                return Ok(None);
            }
        };

        if !credential.can_refresh() {
            warn!(
                stage = "authorization",
                "stored credential has no refresh token, discarding {:?}", self.path
            );
            self.clear()?;
            return Ok(None);
        }

        debug!("loaded credential from {:?}", self.path);
        Ok(Some(credential))
    }

    /// Persists `credential`, replacing any previous one.
    pub fn save(&self, credential: &Credential) -> ProviderResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ProviderError::configuration(format!(
                    "failed to create credential directory: {}",
                    e
                ))
            })?;
        }

        // Write to temp file first, then rename for atomicity
        let temp_path = self.path.with_extension("json.tmp");
        let content = serde_json::to_string_pretty(credential).map_err(|e| {
            ProviderError::internal(format!("failed to serialize credential: {}", e))
        })?;

        fs::write(&temp_path, &content).map_err(|e| {
            ProviderError::configuration(format!("failed to write credential file: {}", e))
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&temp_path, perms);
        }

        fs::rename(&temp_path, &self.path).map_err(|e| {
            ProviderError::configuration(format!("failed to rename credential file: {}", e))
        })?;

        info!("saved credential to {:?}", self.path);
        Ok(())
    }

    /// Removes the stored credential, if any.
    pub fn clear(&self) -> ProviderResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("cleared credential at {:?}", self.path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ProviderError::configuration(format!(
                "failed to remove credential file: {}",
                e
            ))),
        }
    }

    /// Returns the credential file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

    fn scopes() -> Vec<String> {
        vec![SCOPE.to_string()]
    }

    fn credential() -> Credential {
        Credential::new(
            "access-token",
            Some("refresh-token".to_string()),
            Some(3600),
            scopes(),
        )
    }

    #[test]
    fn credential_creation() {
        let c = credential();
        assert_eq!(c.access_token, "access-token");
        assert!(c.can_refresh());
        assert!(c.expires_at.is_some());
        assert!(!c.is_expired());
        assert!(c.is_valid(&scopes()));
    }

    #[test]
    fn credential_expired() {
        let mut c = credential();
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        assert!(c.is_expired());
        assert!(!c.is_valid(&scopes()));
    }

    #[test]
    fn credential_missing_scope_is_invalid() {
        let c = credential();
        let required = vec![SCOPE.to_string(), "other".to_string()];
        assert!(!c.has_scopes(&required));
        assert!(!c.is_valid(&required));
    }

    #[test]
    fn credential_without_expiry_never_expires() {
        let c = Credential::new("access", Some("r".into()), None, vec![]);
        assert!(!c.is_expired());
    }

    #[test]
    fn credential_update_access_token() {
        let mut c = credential();
        c.expires_at = Some(Utc::now() - Duration::hours(1));
        c.update_access_token("new-access", Some(3600));
        assert_eq!(c.access_token, "new-access");
        assert!(!c.is_expired());
        assert_eq!(c.refresh_token.as_deref(), Some("refresh-token"));
    }

    #[test]
    fn store_missing_file_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("token.json"));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn store_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("token.json");
        let store = CredentialStore::new(&path);

        store.save(&credential()).unwrap();
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());

        let loaded = CredentialStore::new(&path).load().unwrap().unwrap();
        assert_eq!(loaded, credential_with_times(&loaded));
    }

    fn credential_with_times(loaded: &Credential) -> Credential {
        Credential {
            expires_at: loaded.expires_at,
            last_refresh: loaded.last_refresh,
            ..credential()
        }
    }

    #[cfg(unix)]
    #[test]
    fn store_save_restricts_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        CredentialStore::new(&path).save(&credential()).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn store_corrupt_file_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "{ not json").unwrap();

        let store = CredentialStore::new(&path);
        assert!(store.load().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn store_credential_without_refresh_token_is_deleted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = CredentialStore::new(&path);

        let c = Credential::new("access", None, Some(3600), scopes());
        store.save(&c).unwrap();

        assert!(store.load().unwrap().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn store_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        let store = CredentialStore::new(&path);

        store.save(&credential()).unwrap();
        store.clear().unwrap();
        assert!(!path.exists());

        // clearing an empty slot is fine
        store.clear().unwrap();
    }
}
