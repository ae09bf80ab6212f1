//! # Ticket Sync Core
//!
//! Core types and traits for reconciling a local ticket database against an
//! external, authoritative ticket-sales system.
//!
//! This crate holds everything that does not perform I/O:
//!
//! - **Types**: organizer/event configuration, local rows, external wire model
//! - **Collaborator traits**: [`SourceClient`], [`PersistenceGateway`], [`ErrorReporter`]
//! - **Change-set computation**: keyed diff between stored and desired state
//! - **Ticket projection**: raw orders → candidate ticket records
//!
//! The runtime crate drives these pieces on a timer; the testing crate provides
//! in-memory implementations of every collaborator.
//!
//! ## Example
//!
//! ```
//! use ticket_sync_core::change_set::compute_change_set;
//!
//! let existing = vec![("A", 1), ("B", 1)];
//! let desired = vec![("A", 2), ("C", 1)];
//!
//! let changes = compute_change_set(
//!     existing,
//!     desired,
//!     |e| e.0,
//!     |d| d.0,
//!     |e, d| e.1 == d.1,
//! );
//!
//! assert_eq!(changes.to_insert, vec![("C", 1)]);
//! assert_eq!(changes.to_update, vec![(("A", 1), ("A", 2))]);
//! assert_eq!(changes.to_delete, vec![("B", 1)]);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};

/// Configuration, local row and external wire types
pub mod types;

/// Keyed diff between stored and desired entities
pub mod change_set;

/// Mapping of external orders into candidate ticket records
pub mod projection;

/// External ticket-sales system client trait
pub mod source;

/// Local persistence trait
pub mod gateway;

/// Sync error taxonomy and the error-reporting collaborator
pub mod error;

/// Environment module - Dependency injection traits
///
/// All time-dependent behaviour goes through [`Clock`](environment::Clock)
/// so tests can pin the current instant.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

pub use error::{ErrorReporter, SyncError, SyncPhase};
pub use gateway::{GatewayError, PersistenceGateway};
pub use source::{SourceClient, SourceError};
pub use types::{
    EventConfig, EventConfigId, EventInfo, ExternalEvent, ExternalItem, ExternalOrder,
    ExternalPosition, ItemInfo, ItemInfoId, OrganizerConfig, TicketId, TicketKey, TicketRecord,
    PAID_STATUS,
};
