//! # Ticket Sync Testing
//!
//! Testing utilities for the ticket reconciliation engine.
//!
//! This crate provides:
//! - [`InMemorySourceClient`]: scriptable external system with failure injection
//! - [`InMemoryGateway`]: HashMap-backed local storage with an operation log
//! - [`RecordingErrorReporter`]: captures reported errors for assertions
//! - [`FixedClock`]: deterministic time
//! - Fixture builders in [`helpers`]
//!
//! ## Example
//!
//! ```ignore
//! use ticket_sync_testing::{helpers::*, InMemoryGateway, InMemorySourceClient};
//!
//! #[tokio::test]
//! async fn test_first_sync() {
//!     let source = InMemorySourceClient::new();
//!     source.set_event(ORG_URL, "conf", "Conference");
//!     source.set_items(ORG_URL, "conf", vec![item("1", "GA")]);
//!
//!     let gateway = InMemoryGateway::new();
//!     // ... run the reconciler against `source` and `gateway`
//! }
//! ```

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Test utilities document panics where critical

use chrono::{DateTime, Utc};
use ticket_sync_core::environment::Clock;

/// In-memory external system
pub mod source_mocks;

/// In-memory local storage
pub mod gateway_mocks;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};
    use ticket_sync_core::{ErrorReporter, SyncError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_sync_testing::mocks::FixedClock;
    /// use ticket_sync_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Error reporter that keeps every reported error.
    ///
    /// Clones share the same buffer.
    #[derive(Debug, Clone, Default)]
    pub struct RecordingErrorReporter {
        errors: Arc<Mutex<Vec<SyncError>>>,
    }

    impl RecordingErrorReporter {
        /// Create an empty reporter
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// All errors reported so far, oldest first
        #[must_use]
        pub fn errors(&self) -> Vec<SyncError> {
            self.errors.lock().unwrap().clone()
        }

        /// Number of errors reported so far
        #[must_use]
        pub fn len(&self) -> usize {
            self.errors.lock().unwrap().len()
        }

        /// Whether nothing has been reported
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.errors.lock().unwrap().is_empty()
        }

        /// Forget all reported errors
        pub fn clear(&self) {
            self.errors.lock().unwrap().clear();
        }
    }

    impl ErrorReporter for RecordingErrorReporter {
        fn report(&self, error: &SyncError) {
            self.errors.lock().unwrap().push(error.clone());
        }
    }
}

/// Fixture builders for configuration and external data.
pub mod helpers {
    use ticket_sync_core::{
        EventConfig, EventConfigId, ExternalItem, ExternalOrder, ExternalPosition, OrganizerConfig,
    };

    /// Organizer URL used by fixtures
    pub const ORG_URL: &str = "https://pretix.test/api/v1/organizers/acme";

    /// Organizer token used by fixtures
    pub const ORG_TOKEN: &str = "test-token";

    /// Event configuration with a fresh local id.
    #[must_use]
    pub fn event_config(event_id: &str, active_item_ids: &[&str]) -> EventConfig {
        EventConfig::new(EventConfigId::new(), event_id, active_item_ids.iter().copied())
    }

    /// Organizer at [`ORG_URL`] tracking the given events.
    #[must_use]
    pub fn organizer(events: Vec<EventConfig>) -> OrganizerConfig {
        OrganizerConfig {
            org_url: ORG_URL.to_string(),
            token: ORG_TOKEN.to_string(),
            events,
        }
    }

    /// Catalog entry.
    #[must_use]
    pub fn item(id: &str, name: &str) -> ExternalItem {
        ExternalItem {
            id: id.to_string(),
            name: name.to_string(),
        }
    }

    /// Order position with optional attendee data.
    #[must_use]
    pub fn position(id: &str, item_id: &str, name: Option<&str>, email: Option<&str>) -> ExternalPosition {
        ExternalPosition {
            id: id.to_string(),
            item_id: item_id.to_string(),
            attendee_name: name.map(str::to_string),
            attendee_email: email.map(str::to_string),
        }
    }

    /// Order with the given status.
    #[must_use]
    pub fn order(code: &str, status: &str, purchaser_email: &str, positions: Vec<ExternalPosition>) -> ExternalOrder {
        ExternalOrder {
            code: code.to_string(),
            status: status.to_string(),
            email: purchaser_email.to_string(),
            purchaser_name: None,
            positions,
        }
    }

    /// Paid order.
    #[must_use]
    pub fn paid_order(code: &str, purchaser_email: &str, positions: Vec<ExternalPosition>) -> ExternalOrder {
        order(code, ticket_sync_core::PAID_STATUS, purchaser_email, positions)
    }

    /// Install a `tracing` subscriber that writes through the test harness.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "ticket_sync=debug".into()),
            )
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use gateway_mocks::{GatewayOp, InMemoryGateway};
pub use mocks::{FixedClock, RecordingErrorReporter, test_clock};
pub use source_mocks::{InMemorySourceClient, SourceCall};
