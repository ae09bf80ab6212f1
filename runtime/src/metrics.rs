//! Prometheus metrics for sync observability.
//!
//! Counters and histograms cover cycles, per-pair failures and the rows each
//! phase wrote:
//!
//! - `sync_cycles_total`, `sync_cycle_failures_total`, `sync_cycle_duration_seconds`
//! - `sync_pair_failures_total{phase}`
//! - `sync_items_{inserted,updated,deleted}_total`
//! - `sync_tickets_{inserted,updated,soft_deleted}_total`
//! - `sync_ready` (0 or 1)
//!
//! # Example
//!
//! ```rust,no_run
//! use ticket_sync_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let exporter = MetricsExporter::install()?;
//!
//! // Later, from an HTTP handler:
//! let body = exporter.render().unwrap_or_default();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::time::Duration;
use thiserror::Error;
use ticket_sync_core::SyncPhase;

use crate::reconciler::SyncReport;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, gauge, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Installed Prometheus recorder.
///
/// The daemon serves [`render`](Self::render) on its `/metrics` route.
#[derive(Clone)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Register metric descriptions and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g., in tests), this logs a warning
    /// and returns an exporter without a handle; metrics are still recorded by
    /// the existing recorder.
    pub fn install() -> Result<Self, MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                tracing::info!("Prometheus metrics recorder installed");
                Ok(Self { handle: Some(handle) })
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(Self { handle: None })
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("sync_cycles_total", "Total number of completed sync cycles");
    describe_counter!(
        "sync_cycle_failures_total",
        "Total number of cycles aborted by an unexpected error"
    );
    describe_histogram!("sync_cycle_duration_seconds", "Time taken by one sync cycle");
    describe_gauge!("sync_ready", "1 once a full sync cycle has completed, else 0");

    describe_counter!(
        "sync_pair_failures_total",
        "Total number of organizer/event pairs whose sync aborted, by phase"
    );

    describe_counter!("sync_items_inserted_total", "Item rows inserted");
    describe_counter!("sync_items_updated_total", "Item rows updated");
    describe_counter!("sync_items_deleted_total", "Item rows deleted");

    describe_counter!("sync_tickets_inserted_total", "Ticket rows inserted");
    describe_counter!("sync_tickets_updated_total", "Ticket rows updated");
    describe_counter!("sync_tickets_soft_deleted_total", "Ticket rows soft-deleted");
}

/// Sync metrics recorder.
pub struct SyncMetrics;

impl SyncMetrics {
    /// Record a completed cycle.
    pub fn record_cycle(duration: Duration) {
        counter!("sync_cycles_total").increment(1);
        histogram!("sync_cycle_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a cycle aborted at the top level.
    pub fn record_cycle_failure() {
        counter!("sync_cycle_failures_total").increment(1);
    }

    /// Record the readiness flag.
    pub fn record_ready(ready: bool) {
        gauge!("sync_ready").set(if ready { 1.0 } else { 0.0 });
    }

    /// Record an aborted pair.
    pub fn record_pair_failure(phase: SyncPhase) {
        counter!("sync_pair_failures_total", "phase" => phase.as_str()).increment(1);
    }

    /// Record the rows written for one pair.
    pub fn record_report(report: &SyncReport) {
        counter!("sync_items_inserted_total").increment(report.items.inserted as u64);
        counter!("sync_items_updated_total").increment(report.items.updated as u64);
        counter!("sync_items_deleted_total").increment(report.items.deleted as u64);
        counter!("sync_tickets_inserted_total").increment(report.tickets.inserted as u64);
        counter!("sync_tickets_updated_total").increment(report.tickets.updated as u64);
        counter!("sync_tickets_soft_deleted_total").increment(report.tickets.deleted as u64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::reconciler::ChangeCounts;

    #[test]
    fn test_metrics_exporter_render() {
        let exporter = MetricsExporter::install().unwrap();

        SyncMetrics::record_cycle(Duration::from_millis(120));
        SyncMetrics::record_pair_failure(SyncPhase::Items);
        SyncMetrics::record_report(&SyncReport {
            event_name_changed: true,
            items: ChangeCounts { inserted: 1, updated: 0, deleted: 0 },
            tickets: ChangeCounts { inserted: 2, updated: 0, deleted: 1 },
        });

        // If another test installed the recorder first, handle is None.
        // That's OK - metrics are still being recorded.
        if let Some(rendered) = exporter.render() {
            assert!(rendered.contains("sync_cycles_total"));
            assert!(rendered.contains("sync_pair_failures_total"));
            assert!(rendered.contains("sync_tickets_inserted_total"));
        }
    }
}
