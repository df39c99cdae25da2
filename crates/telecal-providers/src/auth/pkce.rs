//! PKCE session material (RFC 7636).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::Rng as _;
use sha2::{Digest, Sha256};

/// The PKCE code verifier length (in bytes, before base64 encoding).
const CODE_VERIFIER_LENGTH: usize = 32;

/// Length of the random CSRF state (in bytes, before base64 encoding).
const STATE_LENGTH: usize = 16;

/// PKCE flow state and utilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PkceFlow {
    /// The code verifier (high-entropy random string).
    pub verifier: String,
    /// The code challenge (SHA-256 hash of verifier, base64url encoded).
    pub challenge: String,
    /// Random state for CSRF protection.
    pub state: String,
}

impl PkceFlow {
    /// Creates a new PKCE flow with random verifier and state.
    pub fn new() -> Self {
        Self::from_parts(random_token(CODE_VERIFIER_LENGTH), random_token(STATE_LENGTH))
    }

    /// Rebuilds a flow from a stored verifier and state.
    pub fn from_parts(verifier: impl Into<String>, state: impl Into<String>) -> Self {
        let verifier = verifier.into();
        let challenge = Self::compute_challenge(&verifier);
        Self {
            verifier,
            challenge,
            state: state.into(),
        }
    }

    /// Computes the SHA-256 challenge for a code verifier.
    fn compute_challenge(verifier: &str) -> String {
        let digest = Sha256::digest(verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(digest)
    }
}

impl Default for PkceFlow {
    fn default() -> Self {
        Self::new()
    }
}

fn random_token(len: usize) -> String {
    let mut rng = rand::rng();
    let bytes: Vec<u8> = (0..len).map(|_| rng.random()).collect();
    URL_SAFE_NO_PAD.encode(&bytes)
}
