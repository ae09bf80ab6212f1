//! # Ticket Sync Daemon
//!
//! Long-running process that keeps local ticket storage converged with Pretix.
//!
//! - [`config`]: environment settings and the organizer file
//! - [`server`]: `/health`, `/ready` and `/metrics` routes
//! - [`app`]: wiring and graceful shutdown

pub mod app;
pub mod config;
pub mod server;

pub use app::{DaemonError, run, shutdown_signal};
pub use config::{Config, ConfigError};
pub use server::{AppState, build_router};
