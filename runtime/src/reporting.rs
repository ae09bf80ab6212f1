//! Error reporter implementations.

use ticket_sync_core::{ErrorReporter, SyncError};

/// Reports errors as structured `tracing` events at `error` level.
///
/// This is the default reporter when no external error tracker is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingErrorReporter;

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, error: &SyncError) {
        tracing::error!(
            target: "ticket_sync::reported",
            phase = %error.phase(),
            error = %error,
            "Sync error reported"
        );
    }
}
