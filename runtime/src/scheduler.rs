//! Fixed-interval sync loop.
//!
//! The scheduler owns the organizer list, the current source client and the
//! readiness flag. A cycle fans out one task per organizer/event pair and
//! waits for all of them; the next cycle is armed only once the previous one
//! has settled, so cycles never overlap.
//!
//! # Lifecycle
//!
//! ```text
//! Idle --start--> Running --stop--> Stopped --start--> Running
//!                    ^                                    |
//!                    +------------ replace_source --------+
//! ```
//!
//! `stop` only prevents future cycles. A cycle in flight runs to completion.

use crate::health::{HealthCheck, HealthStatus};
use crate::metrics::SyncMetrics;
use crate::reconciler::Reconciler;
use crate::SyncEnvironment;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use ticket_sync_core::environment::Clock;
use ticket_sync_core::{ErrorReporter, OrganizerConfig, SourceClient, SyncError};
use tokio::sync::watch;
use tokio::task::{JoinHandle, JoinSet};

/// Component name used in health checks.
const COMPONENT: &str = "sync_scheduler";

/// Scheduler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// Never started
    Idle,
    /// Loop is armed
    Running,
    /// Loop was stopped; a cycle may still be finishing
    Stopped,
}

/// Scheduler tuning.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Delay between the end of one cycle and the start of the next
    pub interval: Duration,
}

impl SchedulerConfig {
    /// Default interval between cycles.
    pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

    /// Create a config with a custom interval.
    #[must_use]
    pub const fn with_interval(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::with_interval(Self::DEFAULT_INTERVAL)
    }
}

/// Outcome of one cycle.
#[derive(Debug, Default)]
pub struct CycleReport {
    /// Pairs dispatched
    pub pairs: usize,
    /// Pairs that completed all three phases
    pub succeeded: usize,
    /// Pairs aborted by a phase error (already logged and reported)
    pub failed: Vec<SyncError>,
    /// Pair tasks that escaped isolation
    pub unexpected: Vec<SyncError>,
}

impl CycleReport {
    /// Returns `true` if no pair task escaped isolation.
    ///
    /// Phase failures of individual pairs do not make a cycle incomplete.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.unexpected.is_empty()
    }
}

struct Control {
    state: SchedulerState,
    shutdown: Option<watch::Sender<bool>>,
    task: Option<JoinHandle<()>>,
    // Loops superseded by `replace_source` that may still be finishing a cycle.
    retired: Vec<JoinHandle<()>>,
}

struct Inner {
    organizers: Arc<Vec<OrganizerConfig>>,
    reconciler: Reconciler,
    reporter: Arc<dyn ErrorReporter>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    source: RwLock<Arc<dyn SourceClient>>,
    control: Mutex<Control>,
    cycle_lock: tokio::sync::Mutex<()>,
    ready: AtomicBool,
    generation: AtomicU64,
    last_completed: Mutex<Option<DateTime<Utc>>>,
}

/// Periodic reconciliation driver.
///
/// Clones share the same loop and state.
#[derive(Clone)]
pub struct SyncScheduler {
    inner: Arc<Inner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncScheduler {
    /// Create an idle scheduler.
    #[must_use]
    pub fn new(
        organizers: Vec<OrganizerConfig>,
        source: Arc<dyn SourceClient>,
        env: SyncEnvironment,
        config: SchedulerConfig,
    ) -> Self {
        let reconciler = Reconciler::new(env.gateway, Arc::clone(&env.reporter));
        Self {
            inner: Arc::new(Inner {
                organizers: Arc::new(organizers),
                reconciler,
                reporter: env.reporter,
                clock: env.clock,
                interval: config.interval,
                source: RwLock::new(source),
                control: Mutex::new(Control {
                    state: SchedulerState::Idle,
                    shutdown: None,
                    task: None,
                    retired: Vec::new(),
                }),
                cycle_lock: tokio::sync::Mutex::new(()),
                ready: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                last_completed: Mutex::new(None),
            }),
        }
    }

    /// Start the loop. The first cycle runs immediately.
    ///
    /// Starting a running scheduler is a no-op. Must be called from within a
    /// Tokio runtime.
    pub fn start(&self) {
        let mut control = lock(&self.inner.control);
        self.start_locked(&mut control);
    }

    /// Stop the loop. A cycle in flight is not interrupted.
    pub fn stop(&self) {
        let mut control = lock(&self.inner.control);
        Self::stop_locked(&mut control);
    }

    /// Stop the loop and wait for every cycle in flight to finish, including
    /// one still running with a client replaced by [`replace_source`](Self::replace_source).
    pub async fn stop_and_wait(&self) {
        let tasks: Vec<JoinHandle<()>> = {
            let mut control = lock(&self.inner.control);
            Self::stop_locked(&mut control);
            let mut tasks = std::mem::take(&mut control.retired);
            tasks.extend(control.task.take());
            tasks
        };

        for task in tasks {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Sync loop task failed");
            }
        }
    }

    /// Swap the source client and reset readiness.
    ///
    /// A running loop is restarted with the new client. A cycle still in
    /// flight with the old client finishes but cannot mark the scheduler ready.
    pub fn replace_source(&self, source: Arc<dyn SourceClient>) {
        let mut control = lock(&self.inner.control);
        let was_running = control.state == SchedulerState::Running;
        if was_running {
            Self::stop_locked(&mut control);
        }

        *self
            .inner
            .source
            .write()
            .unwrap_or_else(PoisonError::into_inner) = source;
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.ready.store(false, Ordering::SeqCst);
        SyncMetrics::record_ready(false);
        tracing::info!(restart = was_running, "Source client replaced");

        if was_running {
            self.start_locked(&mut control);
        }
    }

    /// Returns `true` once a complete cycle has finished with the current
    /// source client.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::SeqCst)
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> SchedulerState {
        lock(&self.inner.control).state
    }

    /// Completion time of the last complete cycle.
    #[must_use]
    pub fn last_completed(&self) -> Option<DateTime<Utc>> {
        *lock(&self.inner.last_completed)
    }

    /// Run one cycle now.
    ///
    /// Waits for a cycle already in progress to finish first.
    pub async fn run_cycle(&self) -> CycleReport {
        let generation = self.inner.generation.load(Ordering::SeqCst);
        self.inner.run_cycle(generation).await
    }

    /// Scheduler health.
    #[must_use]
    pub fn health(&self) -> HealthCheck {
        let (status, message) = match (self.state(), self.is_ready()) {
            (SchedulerState::Running, true) => (HealthStatus::Healthy, None),
            (SchedulerState::Running, false) => (
                HealthStatus::Degraded,
                Some("Waiting for the first complete sync cycle"),
            ),
            (SchedulerState::Idle, _) => (HealthStatus::Unhealthy, Some("Scheduler not started")),
            (SchedulerState::Stopped, _) => (HealthStatus::Unhealthy, Some("Scheduler stopped")),
        };

        let mut check = HealthCheck::new(COMPONENT, status);
        if let Some(message) = message {
            check = check.with_message(message);
        }
        let check = check.with_metadata("pairs", self.inner.pair_count().to_string());
        match self.last_completed() {
            Some(at) => check.with_metadata("last_completed", at.to_rfc3339()),
            None => check,
        }
    }

    fn start_locked(&self, control: &mut Control) {
        if control.state == SchedulerState::Running {
            tracing::debug!("Scheduler already running");
            return;
        }

        let (tx, rx) = watch::channel(false);
        let inner = Arc::clone(&self.inner);
        let generation = inner.generation.load(Ordering::SeqCst);

        control.retired.retain(|task| !task.is_finished());
        if let Some(previous) = control.task.take() {
            if !previous.is_finished() {
                control.retired.push(previous);
            }
        }
        control.task = Some(tokio::spawn(run_loop(inner, rx, generation)));
        control.shutdown = Some(tx);
        control.state = SchedulerState::Running;

        tracing::info!(
            pairs = self.inner.pair_count(),
            interval_secs = self.inner.interval.as_secs(),
            "Sync scheduler started"
        );
    }

    fn stop_locked(control: &mut Control) {
        if control.state != SchedulerState::Running {
            return;
        }

        if let Some(shutdown) = control.shutdown.take() {
            let _ = shutdown.send(true);
        }
        control.state = SchedulerState::Stopped;
        tracing::info!("Sync scheduler stopped");
    }
}

async fn run_loop(inner: Arc<Inner>, mut shutdown: watch::Receiver<bool>, generation: u64) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        inner.run_cycle(generation).await;

        tokio::select! {
            () = tokio::time::sleep(inner.interval) => {}
            _ = shutdown.changed() => break,
        }
    }

    tracing::debug!("Sync loop exited");
}

impl Inner {
    fn pair_count(&self) -> usize {
        self.organizers.iter().map(|o| o.events.len()).sum()
    }

    async fn run_cycle(&self, generation: u64) -> CycleReport {
        let _cycle = self.cycle_lock.lock().await;
        let started = tokio::time::Instant::now();

        let source = Arc::clone(&*self.source.read().unwrap_or_else(PoisonError::into_inner));

        let mut tasks = JoinSet::new();
        for (org_index, organizer) in self.organizers.iter().enumerate() {
            for event_index in 0..organizer.events.len() {
                let organizers = Arc::clone(&self.organizers);
                let reconciler = self.reconciler.clone();
                let source = Arc::clone(&source);

                tasks.spawn(async move {
                    let organizer = &organizers[org_index];
                    let event = &organizer.events[event_index];
                    reconciler.sync_event(source.as_ref(), organizer, event).await
                });
            }
        }

        let mut report = CycleReport {
            pairs: tasks.len(),
            ..CycleReport::default()
        };
        tracing::debug!(pairs = report.pairs, "Sync cycle started");

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(pair)) => {
                    SyncMetrics::record_report(&pair);
                    report.succeeded += 1;
                }
                Ok(Err(error)) => {
                    SyncMetrics::record_pair_failure(error.phase());
                    report.failed.push(error);
                }
                Err(join_error) => {
                    let error = SyncError::Unexpected(join_error.to_string());
                    tracing::error!(error = %error, "Sync task escaped isolation");
                    self.reporter.report(&error);
                    report.unexpected.push(error);
                }
            }
        }

        let elapsed = started.elapsed();
        if report.is_complete() {
            SyncMetrics::record_cycle(elapsed);
            // `replace_source` bumps the generation under the control lock,
            // so holding it here makes the check and the set one step.
            let _control = lock(&self.control);
            if self.generation.load(Ordering::SeqCst) == generation {
                self.ready.store(true, Ordering::SeqCst);
                *lock(&self.last_completed) = Some(self.clock.now());
                SyncMetrics::record_ready(true);
            } else {
                tracing::debug!("Source client replaced during cycle, readiness unchanged");
            }
        } else {
            SyncMetrics::record_cycle_failure();
        }

        tracing::info!(
            pairs = report.pairs,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            unexpected = report.unexpected.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "Sync cycle finished"
        );
        report
    }
}
