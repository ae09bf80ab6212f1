//! # Ticket Sync Runtime
//!
//! Runtime that keeps local ticket storage converged with the external
//! ticket-sales system.
//!
//! ## Core Components
//!
//! - **Reconciler**: three ordered phases (event info → items → tickets) for one
//!   organizer/event pair
//! - **Sync Scheduler**: fixed-interval, non-overlapping cycle loop that fans out
//!   one task per pair and tracks readiness
//! - **Health**: readiness exposed as a [`HealthCheck`]
//! - **Metrics**: Prometheus counters for cycles and written rows
//!
//! ## Example
//!
//! ```ignore
//! use ticket_sync_runtime::{SchedulerConfig, SyncEnvironment, SyncScheduler};
//!
//! let scheduler = SyncScheduler::new(
//!     organizers,
//!     Arc::new(PretixClient::new()),
//!     SyncEnvironment::new(gateway, Arc::new(TracingErrorReporter)),
//!     SchedulerConfig::default(),
//! );
//!
//! scheduler.start();
//! // ...
//! assert!(scheduler.is_ready());
//! scheduler.stop();
//! ```

use std::sync::Arc;
use ticket_sync_core::environment::{Clock, SystemClock};
use ticket_sync_core::{ErrorReporter, PersistenceGateway};

/// Three-phase reconciliation of one organizer/event pair
pub mod reconciler;

/// Fixed-interval sync loop with readiness tracking
pub mod scheduler;

/// Health check types
pub mod health;

/// Error reporter implementations
pub mod reporting;

/// Prometheus metrics for observability
pub mod metrics;

pub use crate::metrics::{MetricsError, MetricsExporter, SyncMetrics};
pub use health::{HealthCheck, HealthStatus};
pub use reconciler::{ChangeCounts, Reconciler, SyncReport};
pub use reporting::TracingErrorReporter;
pub use scheduler::{CycleReport, SchedulerConfig, SchedulerState, SyncScheduler};

/// Injected dependencies shared by the reconciler and the scheduler.
///
/// The source client is not part of the environment: the scheduler owns it and
/// may replace it between cycles.
#[derive(Clone)]
pub struct SyncEnvironment {
    /// Local storage
    pub gateway: Arc<dyn PersistenceGateway>,
    /// Operator-facing error sink
    pub reporter: Arc<dyn ErrorReporter>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl SyncEnvironment {
    /// Create an environment using the system clock.
    #[must_use]
    pub fn new(gateway: Arc<dyn PersistenceGateway>, reporter: Arc<dyn ErrorReporter>) -> Self {
        Self {
            gateway,
            reporter,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the time source.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}
