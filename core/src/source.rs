//! External ticket-sales system client trait.
//!
//! The external system is the source of truth for events, items and orders,
//! but it is not trusted to be available or self-consistent: the three fetches
//! for one event may observe different snapshots, and any of them may fail.
//!
//! # Implementations
//!
//! - `PretixClient` (in `ticket-sync-pretix` crate): Production HTTP client
//! - `InMemorySourceClient` (in `ticket-sync-testing` crate): Scriptable test double

use crate::types::{ExternalEvent, ExternalItem, ExternalOrder};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors returned by a [`SourceClient`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The requested resource does not exist on the external system
    #[error("Not found: {0}")]
    NotFound(String),

    /// The request could not be sent or the connection failed
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// The response body could not be parsed
    #[error("Response parsing failed: {0}")]
    ResponseParseFailed(String),

    /// Rate limited - too many requests
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Unauthorized - invalid or insufficient token
    #[error("Unauthorized - invalid API token")]
    Unauthorized,

    /// The external system returned an error status
    #[error("API error (status {status}): {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },
}

impl SourceError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::RequestFailed(_) | Self::RateLimited => true,
            Self::ApiError { status, .. } => *status >= 500,
            Self::NotFound(_) | Self::ResponseParseFailed(_) | Self::Unauthorized => false,
        }
    }
}

/// Type alias for the boxed futures returned by [`SourceClient`].
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Read access to the external ticket-sales system.
///
/// All calls are scoped by an organizer base URL and token, so one client
/// instance serves every configured organizer.
///
/// # Examples
///
/// ```no_run
/// use ticket_sync_core::source::SourceClient;
///
/// async fn show<S: SourceClient>(source: &S) -> Result<(), Box<dyn std::error::Error>> {
///     let event = source
///         .fetch_event("https://pretix.example/api/v1/organizers/acme", "token", "conf")
///         .await?;
///     println!("{}", event.name);
///     Ok(())
/// }
/// ```
pub trait SourceClient: Send + Sync {
    /// Fetch the display metadata of an event.
    ///
    /// # Errors
    ///
    /// - `NotFound`: The event id is unknown to the external system
    /// - Any other variant for transport or API failures
    fn fetch_event<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, ExternalEvent>;

    /// Fetch the full item catalog of an event.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] for transport or API failures.
    fn fetch_items<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalItem>>;

    /// Fetch every order of an event, regardless of status.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] for transport or API failures.
    fn fetch_orders<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalOrder>>;
}
