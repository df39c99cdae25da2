//! Calendar provider abstraction and credential lifecycle.
//!
//! This crate provides:
//!
//! - [`CalendarProvider`] - The trait calendar backends implement
//! - [`CredentialStore`] - Single-slot persisted OAuth credential
//! - [`AuthorizationCoordinator`] - Produces usable credentials, refreshing
//!   or handing off to interactive authorization as needed
//! - [`ProviderError`] - Error types for provider operations
//!
//! # Architecture
//!
//! ```text
//!  request ──► AuthorizationCoordinator ──► Credential
//!                 │        ▲                   │
//!        OAuthGrant│        │callback           ▼
//!                 ▼        │             CalendarProvider ──► EventLink
//!            Google OAuth  AuthorizationFlag
//! ```

pub mod auth;
pub mod credential;
pub mod error;
pub mod google;
pub mod provider;

// Re-export main types at crate root
pub use auth::{
    AuthorizationCallback, AuthorizationCoordinator, AuthorizationFlag, AuthorizationReason,
    AuthorizationSettings, AuthorizationStatus, CredentialState, Notifier, OAuthGrant,
    PendingAuthorization, PkceFlow,
};
pub use credential::{Credential, CredentialStore};
pub use error::{ProviderError, ProviderErrorCode, ProviderResult};
pub use provider::{BoxFuture, CalendarProvider};
