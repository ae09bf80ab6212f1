//! Pretix REST API client

use crate::retry::{retry_with_predicate, RetryPolicy};
use crate::wire::{EventPayload, ItemPayload, OrderPayload, Page};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use ticket_sync_core::source::{SourceClient, SourceError, SourceFuture};
use ticket_sync_core::{ExternalEvent, ExternalItem, ExternalOrder};

/// Upper bound on pages followed for one list, guarding against `next` cycles.
const MAX_PAGES: usize = 10_000;

const USER_AGENT: &str = concat!("ticket-sync/", env!("CARGO_PKG_VERSION"));

/// Client configuration
#[derive(Debug, Clone)]
pub struct PretixConfig {
    /// Per-request timeout
    pub timeout: Duration,
    /// Retry policy for transient failures
    pub retry: RetryPolicy,
}

impl Default for PretixConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
        }
    }
}

/// Pretix API client
///
/// One instance serves every organizer: the base URL and token are passed
/// per call.
#[derive(Clone)]
pub struct PretixClient {
    http: Client,
    retry: RetryPolicy,
}

impl PretixClient {
    /// Create a client with default settings
    #[must_use]
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            retry: RetryPolicy::default(),
        }
    }

    /// Create a client from explicit settings
    ///
    /// # Errors
    ///
    /// Returns `SourceError::RequestFailed` if the HTTP client cannot be built
    /// (for example when no TLS backend is available).
    pub fn with_config(config: &PretixConfig) -> Result<Self, SourceError> {
        let http = Client::builder()
            .timeout(config.timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        Ok(Self {
            http,
            retry: config.retry.clone(),
        })
    }

    /// Replace the retry policy
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn get<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, SourceError> {
        retry_with_predicate(&self.retry, || self.get_once(url, token), SourceError::is_transient).await
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, SourceError> {
        tracing::trace!(url, "GET");
        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, format!("Token {token}"))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| SourceError::RequestFailed(e.to_string()))?;

        match response.status() {
            status if status.is_success() => response
                .json::<T>()
                .await
                .map_err(|e| SourceError::ResponseParseFailed(e.to_string())),
            StatusCode::NOT_FOUND => Err(SourceError::NotFound(url.to_string())),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(SourceError::Unauthorized),
            StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(SourceError::ApiError {
                    status: status.as_u16(),
                    message: body,
                })
            }
        }
    }

    /// Follow `next` links until exhausted.
    ///
    /// The token is only ever sent to the origin of `first`; a `next` link
    /// pointing anywhere else fails the fetch.
    async fn get_all<T: DeserializeOwned>(&self, first: String, token: &str) -> Result<Vec<T>, SourceError> {
        let origin = Url::parse(&first)
            .map_err(|e| SourceError::RequestFailed(format!("invalid URL {first}: {e}")))?
            .origin();
        let mut results = Vec::new();
        let mut next = Some(first);
        let mut pages = 0;

        while let Some(url) = next {
            if pages > 0 && !Url::parse(&url).is_ok_and(|parsed| parsed.origin() == origin) {
                tracing::warn!(next = %url, "Refusing pagination link to another origin");
                return Err(SourceError::ResponseParseFailed(format!(
                    "pagination link {url} leaves the organizer's origin"
                )));
            }
            if pages == MAX_PAGES {
                return Err(SourceError::ResponseParseFailed(format!(
                    "pagination exceeded {MAX_PAGES} pages at {url}"
                )));
            }
            let page: Page<T> = self.get(&url, token).await?;
            results.extend(page.results);
            next = page.next;
            pages += 1;
        }

        tracing::debug!(pages, entries = results.len(), "Fetched paginated list");
        Ok(results)
    }
}

impl Default for PretixClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `{org_url}/events/{event_id}/`
fn event_url(org_url: &str, event_id: &str) -> String {
    format!("{}/events/{event_id}/", org_url.trim_end_matches('/'))
}

impl SourceClient for PretixClient {
    fn fetch_event<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, ExternalEvent> {
        Box::pin(async move {
            let payload: EventPayload = self.get(&event_url(org_url, event_id), token).await?;
            Ok(payload.into())
        })
    }

    fn fetch_items<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalItem>> {
        Box::pin(async move {
            let url = format!("{}items/", event_url(org_url, event_id));
            let items: Vec<ItemPayload> = self.get_all(url, token).await?;
            Ok(items.into_iter().map(Into::into).collect())
        })
    }

    fn fetch_orders<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalOrder>> {
        Box::pin(async move {
            let url = format!("{}orders/", event_url(org_url, event_id));
            let orders: Vec<OrderPayload> = self.get_all(url, token).await?;
            Ok(orders.into_iter().map(Into::into).collect())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_url_normalizes_trailing_slash() {
        assert_eq!(
            event_url("https://pretix.eu/api/v1/organizers/acme/", "conf"),
            "https://pretix.eu/api/v1/organizers/acme/events/conf/"
        );
        assert_eq!(
            event_url("https://pretix.eu/api/v1/organizers/acme", "conf"),
            "https://pretix.eu/api/v1/organizers/acme/events/conf/"
        );
    }
}
