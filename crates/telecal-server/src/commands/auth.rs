//! Credential commands.

use telecal_providers::{AuthorizationFlag, CredentialState, CredentialStore};

use crate::config::Config;
use crate::error::ServerResult;

/// Print the stored credential state and whether an authorization is
/// pending.
pub fn status(config: &Config) -> ServerResult<()> {
    let store = CredentialStore::new(config.token_path());
    let flag = AuthorizationFlag::new(config.flag_path());

    let credential = store.load()?;
    let state = CredentialState::classify(credential.as_ref(), &config.google.scopes);

    println!("credential: {}", state);
    println!("token file: {}", store.path().display());
    if let Some(credential) = credential {
        match credential.expires_at {
            Some(at) => println!("expires:    {}", at.to_rfc3339()),
            None => println!("expires:    never"),
        }
        println!("scopes:     {}", credential.scopes.join(" "));
    }

    match flag.pending() {
        Ok(Some(pending)) => println!(
            "pending:    authorization started {}",
            pending.created_at.to_rfc3339()
        ),
        Ok(None) => println!("pending:    no"),
        Err(_) => println!("pending:    yes (session unreadable)"),
    }
    Ok(())
}

/// Delete the stored credential and any pending authorization.
pub fn reset(config: &Config) -> ServerResult<()> {
    CredentialStore::new(config.token_path()).clear()?;
    AuthorizationFlag::new(config.flag_path()).clear()?;
    println!("Stored Google credential removed. The next message will ask for authorization.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use telecal_providers::Credential;

    fn config_in(dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.google.token_path = Some(dir.join("token.json"));
        config.google.flag_path = Some(dir.join("auth.pending"));
        config
    }

    #[test]
    fn reset_clears_credential_and_flag() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(dir.path());
        let store = CredentialStore::new(config.token_path());
        store
            .save(&Credential::new(
                "a",
                Some("r".to_string()),
                Some(3600),
                config.google.scopes.clone(),
            ))
            .unwrap();
        std::fs::write(config.flag_path(), "{}").unwrap();

        reset(&config).unwrap();

        assert!(!config.token_path().exists());
        assert!(!config.flag_path().exists());
    }

    #[test]
    fn reset_without_files_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(reset(&config_in(dir.path())).is_ok());
    }

    #[test]
    fn status_without_files_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        assert!(status(&config_in(dir.path())).is_ok());
    }
}
