//! CalendarProvider trait definition.
//!
//! This module defines the [`CalendarProvider`] trait, the seam between the
//! request handler and a calendar backend. A provider receives a fully
//! merged [`CalendarEvent`] and a usable [`Credential`]; it never refreshes
//! or requests credentials itself.

use std::future::Future;
use std::pin::Pin;

use telecal_core::{CalendarEvent, EventLink};

use crate::credential::Credential;
use crate::error::ProviderResult;

/// A boxed future for async trait methods.
///
/// Boxed futures keep the traits object-safe, so backends can be swapped
/// behind an `Arc<dyn ...>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The core abstraction for calendar backends.
///
/// Inserts are single attempts. Failures are reported as [`ProviderError`]
/// values and never retried by the provider.
///
/// [`ProviderError`]: crate::error::ProviderError
///
/// # Example Implementation
///
/// ```ignore
/// impl CalendarProvider for GoogleCalendarClient {
///     fn name(&self) -> &str { "google" }
///
///     fn insert_event<'a>(
///         &'a self,
///         event: &'a CalendarEvent,
///         credential: &'a Credential,
///     ) -> BoxFuture<'a, ProviderResult<EventLink>> {
///         Box::pin(async move { self.insert(event, &credential.access_token).await })
///     }
/// }
/// ```
pub trait CalendarProvider: Send + Sync {
    /// Returns the name of this provider (e.g., "google").
    fn name(&self) -> &str;

    /// Creates `event` in the configured calendar.
    ///
    /// # Errors
    ///
    /// Returns `ProviderError` on network errors, rejected credentials or
    /// events the backend refuses.
    fn insert_event<'a>(
        &'a self,
        event: &'a CalendarEvent,
        credential: &'a Credential,
    ) -> BoxFuture<'a, ProviderResult<EventLink>>;
}
