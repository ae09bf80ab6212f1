//! Scriptable in-memory external system.
//!
//! [`InMemorySourceClient`] stands in for the ticket-sales API: tests script
//! each event's name, catalog and orders, inject failures per call, add
//! latency, and inspect which calls were made.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use ticket_sync_core::source::{SourceClient, SourceError, SourceFuture};
use ticket_sync_core::{ExternalEvent, ExternalItem, ExternalOrder};

/// The three calls a [`SourceClient`] supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceCall {
    /// `fetch_event`
    Event,
    /// `fetch_items`
    Items,
    /// `fetch_orders`
    Orders,
}

#[derive(Debug, Clone, Default)]
struct ScriptedEvent {
    name: Option<String>,
    items: Vec<ExternalItem>,
    orders: Vec<ExternalOrder>,
}

type EventKey = (String, String);

#[derive(Debug, Default)]
struct SourceData {
    events: HashMap<EventKey, ScriptedEvent>,
    failures: HashMap<(EventKey, SourceCall), SourceError>,
    calls: Vec<(String, SourceCall)>,
    tokens: Vec<String>,
    latency: Option<Duration>,
}

/// In-memory external system for fast, deterministic testing.
///
/// Events are addressed by `(org_url, event_id)`. Fetching an event that was
/// never scripted fails with [`SourceError::NotFound`]. Clones share state, so a
/// test can keep a handle while the scheduler owns another.
///
/// # Example
///
/// ```
/// use ticket_sync_testing::{InMemorySourceClient, SourceCall};
/// use ticket_sync_core::{SourceClient, SourceError};
///
/// # tokio_test::block_on(async {
/// let source = InMemorySourceClient::new();
/// source.set_event("https://org", "conf", "Conference");
///
/// let event = source.fetch_event("https://org", "token", "conf").await.unwrap();
/// assert_eq!(event.name, "Conference");
///
/// source.fail("https://org", "conf", SourceCall::Event, SourceError::RateLimited);
/// assert!(source.fetch_event("https://org", "token", "conf").await.is_err());
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct InMemorySourceClient {
    data: Arc<RwLock<SourceData>>,
}

impl InMemorySourceClient {
    /// Create an empty external system
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(org_url: &str, event_id: &str) -> EventKey {
        (org_url.to_string(), event_id.to_string())
    }

    /// Set (or replace) the display name of an event, creating it if needed.
    pub fn set_event(&self, org_url: &str, event_id: &str, name: &str) {
        let mut data = self.data.write().unwrap();
        data.events.entry(Self::key(org_url, event_id)).or_default().name = Some(name.to_string());
    }

    /// Replace the item catalog of an event.
    pub fn set_items(&self, org_url: &str, event_id: &str, items: Vec<ExternalItem>) {
        let mut data = self.data.write().unwrap();
        data.events.entry(Self::key(org_url, event_id)).or_default().items = items;
    }

    /// Replace the order list of an event.
    pub fn set_orders(&self, org_url: &str, event_id: &str, orders: Vec<ExternalOrder>) {
        let mut data = self.data.write().unwrap();
        data.events.entry(Self::key(org_url, event_id)).or_default().orders = orders;
    }

    /// Remove an event entirely; further fetches fail with `NotFound`.
    pub fn remove_event(&self, org_url: &str, event_id: &str) {
        self.data.write().unwrap().events.remove(&Self::key(org_url, event_id));
    }

    /// Make every subsequent `call` for the event fail with `error`.
    pub fn fail(&self, org_url: &str, event_id: &str, call: SourceCall, error: SourceError) {
        self.data
            .write()
            .unwrap()
            .failures
            .insert((Self::key(org_url, event_id), call), error);
    }

    /// Remove all injected failures.
    pub fn clear_failures(&self) {
        self.data.write().unwrap().failures.clear();
    }

    /// Delay every call by `latency` (uses `tokio::time`, so paused clocks apply).
    pub fn set_latency(&self, latency: Duration) {
        self.data.write().unwrap().latency = Some(latency);
    }

    /// Every call made so far as `(event_id, call)`, oldest first.
    #[must_use]
    pub fn calls(&self) -> Vec<(String, SourceCall)> {
        self.data.read().unwrap().calls.clone()
    }

    /// Number of calls of one kind made so far.
    #[must_use]
    pub fn call_count(&self, call: SourceCall) -> usize {
        self.data
            .read()
            .unwrap()
            .calls
            .iter()
            .filter(|(_, c)| *c == call)
            .count()
    }

    /// Tokens presented so far, one per call.
    #[must_use]
    pub fn tokens_seen(&self) -> Vec<String> {
        self.data.read().unwrap().tokens.clone()
    }

    fn begin(
        &self,
        org_url: &str,
        token: &str,
        event_id: &str,
        call: SourceCall,
    ) -> (Option<Duration>, Result<ScriptedEvent, SourceError>) {
        let mut data = self.data.write().unwrap();
        data.calls.push((event_id.to_string(), call));
        data.tokens.push(token.to_string());

        let key = Self::key(org_url, event_id);
        let outcome = if let Some(error) = data.failures.get(&(key.clone(), call)) {
            Err(error.clone())
        } else {
            data.events
                .get(&key)
                .cloned()
                .ok_or_else(|| SourceError::NotFound(format!("event {event_id}")))
        };
        (data.latency, outcome)
    }

    async fn respond<T>(
        &self,
        org_url: &str,
        token: &str,
        event_id: &str,
        call: SourceCall,
        pick: impl FnOnce(ScriptedEvent) -> Result<T, SourceError>,
    ) -> Result<T, SourceError> {
        let (latency, outcome) = self.begin(org_url, token, event_id, call);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        outcome.and_then(pick)
    }
}

impl SourceClient for InMemorySourceClient {
    fn fetch_event<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, ExternalEvent> {
        Box::pin(self.respond(org_url, token, event_id, SourceCall::Event, move |scripted| {
            scripted
                .name
                .map(|name| ExternalEvent { name })
                .ok_or_else(|| SourceError::NotFound(format!("event {event_id}")))
        }))
    }

    fn fetch_items<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalItem>> {
        Box::pin(self.respond(org_url, token, event_id, SourceCall::Items, |scripted| {
            Ok(scripted.items)
        }))
    }

    fn fetch_orders<'a>(
        &'a self,
        org_url: &'a str,
        token: &'a str,
        event_id: &'a str,
    ) -> SourceFuture<'a, Vec<ExternalOrder>> {
        Box::pin(self.respond(org_url, token, event_id, SourceCall::Orders, |scripted| {
            Ok(scripted.orders)
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::helpers::{item, ORG_URL};

    #[tokio::test]
    async fn test_unknown_event_is_not_found() {
        let source = InMemorySourceClient::new();
        let err = source.fetch_event(ORG_URL, "t", "missing").await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_scripted_catalog_and_call_log() {
        let source = InMemorySourceClient::new();
        source.set_event(ORG_URL, "conf", "Conference");
        source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);

        let items = source.fetch_items(ORG_URL, "t", "conf").await.unwrap();
        assert_eq!(items, vec![item("1", "GA")]);
        assert!(source.fetch_orders(ORG_URL, "t", "conf").await.unwrap().is_empty());

        assert_eq!(source.call_count(SourceCall::Items), 1);
        assert_eq!(source.call_count(SourceCall::Orders), 1);
        assert_eq!(source.tokens_seen(), vec!["t".to_string(), "t".to_string()]);
    }

    #[tokio::test]
    async fn test_injected_failure_is_scoped_to_call() {
        let source = InMemorySourceClient::new();
        source.set_event(ORG_URL, "conf", "Conference");
        source.fail(ORG_URL, "conf", SourceCall::Orders, SourceError::RateLimited);

        assert!(source.fetch_event(ORG_URL, "t", "conf").await.is_ok());
        assert_eq!(
            source.fetch_orders(ORG_URL, "t", "conf").await.unwrap_err(),
            SourceError::RateLimited
        );

        source.clear_failures();
        assert!(source.fetch_orders(ORG_URL, "t", "conf").await.is_ok());
    }
}
