//! Sync error taxonomy and the error-reporting collaborator.
//!
//! Three classes of failure exist:
//!
//! - **Configuration**: an active item id is missing from the external catalog
//!   ([`SyncError::MissingActiveItems`])
//! - **Transient I/O**: a fetch or a write failed ([`SyncError::Source`],
//!   [`SyncError::Gateway`])
//! - **Unexpected**: anything escaping per-pair isolation, caught at the cycle
//!   level ([`SyncError::Unexpected`])
//!
//! None of them is fatal: the next scheduled cycle retries everything.

use crate::gateway::GatewayError;
use crate::source::SourceError;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Stage of a sync cycle at which an error occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncPhase {
    /// Event metadata phase
    EventInfo,
    /// Item catalog phase
    Items,
    /// Ticket phase
    Tickets,
    /// Cycle coordination, outside any per-pair phase
    Cycle,
}

impl SyncPhase {
    /// Stable lowercase name, used as a log field and metric label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EventInfo => "event_info",
            Self::Items => "items",
            Self::Tickets => "tickets",
            Self::Cycle => "cycle",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced while reconciling one organizer/event pair or running a cycle.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// Fetching from the external system failed
    #[error("[{event_id}] {phase} phase: source error: {source}")]
    Source {
        /// Phase that issued the fetch
        phase: SyncPhase,
        /// External event id
        event_id: String,
        /// Underlying error
        #[source]
        source: SourceError,
    },

    /// Reading or writing local storage failed
    #[error("[{event_id}] {phase} phase: storage error: {source}")]
    Gateway {
        /// Phase that issued the call
        phase: SyncPhase,
        /// External event id
        event_id: String,
        /// Underlying error
        #[source]
        source: GatewayError,
    },

    /// Configured active items are absent from the external catalog
    #[error("[{event_id}] items phase: active items missing from catalog: {}", missing.join(", "))]
    MissingActiveItems {
        /// External event id
        event_id: String,
        /// Active item ids that were not found, sorted
        missing: Vec<String>,
    },

    /// An error escaped per-pair isolation (for example a panicked task)
    #[error("Unexpected sync failure: {0}")]
    Unexpected(String),
}

impl SyncError {
    /// Build a source error for a phase.
    #[must_use]
    pub fn from_source(phase: SyncPhase, event_id: impl Into<String>, source: SourceError) -> Self {
        Self::Source {
            phase,
            event_id: event_id.into(),
            source,
        }
    }

    /// Build a storage error for a phase.
    #[must_use]
    pub fn from_gateway(phase: SyncPhase, event_id: impl Into<String>, source: GatewayError) -> Self {
        Self::Gateway {
            phase,
            event_id: event_id.into(),
            source,
        }
    }

    /// Phase at which this error occurred.
    #[must_use]
    pub const fn phase(&self) -> SyncPhase {
        match self {
            Self::Source { phase, .. } | Self::Gateway { phase, .. } => *phase,
            Self::MissingActiveItems { .. } => SyncPhase::Items,
            Self::Unexpected(_) => SyncPhase::Cycle,
        }
    }
}

/// Sink for errors that operators should see.
///
/// Reporting is fire-and-forget: implementations must not block and must not
/// fail. Anything slow (network delivery to an error tracker) belongs on a
/// background task owned by the implementation.
pub trait ErrorReporter: Send + Sync {
    /// Report one error.
    fn report(&self, error: &SyncError);
}

impl<R: ErrorReporter + ?Sized> ErrorReporter for Arc<R> {
    fn report(&self, error: &SyncError) {
        (**self).report(error);
    }
}
