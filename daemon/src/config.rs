//! Configuration management for the sync daemon.
//!
//! Settings come from environment variables with defaults. The organizer list
//! lives in a JSON file named by `SYNC_CONFIG_PATH`:
//!
//! ```json
//! [
//!   {
//!     "org_url": "https://pretix.eu/api/v1/organizers/acme",
//!     "token": "secret",
//!     "events": [
//!       {
//!         "id": "6f1c0f4e-3f51-4d55-9a43-0d6c6d1c8f7e",
//!         "event_id": "conf2026",
//!         "active_item_ids": ["101", "102"]
//!       }
//!     ]
//!   }
//! ]
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use ticket_sync_core::OrganizerConfig;
use ticket_sync_pretix::{PretixConfig, RetryPolicy};
use ticket_sync_runtime::SchedulerConfig;

/// Errors raised while loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required variable is unset
    #[error("Missing required environment variable {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed
    #[error("Invalid value for {var}: {value:?}")]
    InvalidVar {
        /// Variable name
        var: &'static str,
        /// Raw value
        value: String,
    },

    /// The organizer file cannot be read
    #[error("Failed to read organizer file {path}: {source}")]
    Io {
        /// File path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The organizer file is not valid JSON for the expected shape
    #[error("Failed to parse organizer file: {0}")]
    Parse(#[from] serde_json::Error),

    /// The organizer list is inconsistent
    #[error("Invalid organizer configuration: {0}")]
    Invalid(String),
}

/// Database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
}

/// Sync loop settings
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Path of the organizer JSON file
    pub organizers_path: PathBuf,
    /// Delay between cycles
    pub interval: Duration,
}

/// Pretix client settings
#[derive(Debug, Clone)]
pub struct PretixSettings {
    /// Attempts per request, including the first
    pub max_attempts: u32,
    /// Per-request timeout
    pub timeout: Duration,
}

/// HTTP server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to bind to
    pub port: u16,
    /// How long to wait for an in-flight cycle on shutdown
    pub shutdown_timeout: Duration,
}

/// Daemon configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Database settings
    pub database: DatabaseConfig,
    /// Sync loop settings
    pub sync: SyncConfig,
    /// Pretix client settings
    pub pretix: PretixSettings,
    /// HTTP server settings
    pub server: ServerConfig,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a required variable is missing or a value
    /// does not parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let parse = |var: &'static str, default: u64| -> Result<u64, ConfigError> {
            lookup(var).map_or(Ok(default), |value| {
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidVar { var, value })
            })
        };
        let narrow = |var: &'static str, value: u64| -> Result<u32, ConfigError> {
            u32::try_from(value).map_err(|_| ConfigError::InvalidVar {
                var,
                value: value.to_string(),
            })
        };

        let interval_secs = parse("SYNC_INTERVAL_SECS", 60)?;
        if interval_secs == 0 {
            return Err(ConfigError::InvalidVar {
                var: "SYNC_INTERVAL_SECS",
                value: "0".to_string(),
            });
        }

        let port = parse("HTTP_PORT", 8080)?;

        Ok(Self {
            database: DatabaseConfig {
                url: lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?,
                max_connections: narrow("DATABASE_MAX_CONNECTIONS", parse("DATABASE_MAX_CONNECTIONS", 5)?)?,
            },
            sync: SyncConfig {
                organizers_path: lookup("SYNC_CONFIG_PATH")
                    .map(PathBuf::from)
                    .ok_or(ConfigError::Missing("SYNC_CONFIG_PATH"))?,
                interval: Duration::from_secs(interval_secs),
            },
            pretix: PretixSettings {
                max_attempts: narrow("PRETIX_MAX_ATTEMPTS", parse("PRETIX_MAX_ATTEMPTS", 3)?)?,
                timeout: Duration::from_secs(parse("PRETIX_TIMEOUT_SECS", 30)?),
            },
            server: ServerConfig {
                host: lookup("HTTP_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: u16::try_from(port).map_err(|_| ConfigError::InvalidVar {
                    var: "HTTP_PORT",
                    value: port.to_string(),
                })?,
                shutdown_timeout: Duration::from_secs(parse("SHUTDOWN_TIMEOUT_SECS", 30)?),
            },
        })
    }

    /// Scheduler settings derived from this configuration.
    #[must_use]
    pub const fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig::with_interval(self.sync.interval)
    }

    /// Pretix client settings derived from this configuration.
    #[must_use]
    pub fn pretix_config(&self) -> PretixConfig {
        PretixConfig {
            timeout: self.pretix.timeout,
            retry: RetryPolicy::new().with_max_attempts(self.pretix.max_attempts),
        }
    }

    /// Read and validate the organizer file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
    pub fn load_organizers(&self) -> Result<Vec<OrganizerConfig>, ConfigError> {
        load_organizers(&self.sync.organizers_path)
    }
}

/// Read and validate an organizer file.
///
/// # Errors
///
/// Returns [`ConfigError`] if the file cannot be read, parsed or validated.
pub fn load_organizers(path: &Path) -> Result<Vec<OrganizerConfig>, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_organizers(&raw)
}

/// Parse and validate an organizer list.
///
/// # Errors
///
/// - `Parse`: The JSON does not match the expected shape
/// - `Invalid`: An organizer has an empty URL or token, an event has an empty
///   id, or an event config id is used twice
pub fn parse_organizers(raw: &str) -> Result<Vec<OrganizerConfig>, ConfigError> {
    let organizers: Vec<OrganizerConfig> = serde_json::from_str(raw)?;
    validate_organizers(&organizers)?;
    Ok(organizers)
}

fn validate_organizers(organizers: &[OrganizerConfig]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for (index, organizer) in organizers.iter().enumerate() {
        if organizer.org_url.trim().is_empty() {
            return Err(ConfigError::Invalid(format!("organizer #{index} has an empty org_url")));
        }
        if organizer.token.trim().is_empty() {
            return Err(ConfigError::Invalid(format!(
                "organizer {} has an empty token",
                organizer.org_url
            )));
        }

        for event in &organizer.events {
            if event.event_id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "event config {} has an empty event_id",
                    event.id
                )));
            }
            if !seen.insert(event.id) {
                return Err(ConfigError::Invalid(format!("duplicate event config id {}", event.id)));
            }
            if event.active_item_ids.is_empty() {
                tracing::warn!(
                    organizer = %organizer.org_url,
                    event_id = %event.event_id,
                    "Event has no active items, no tickets will be synced"
                );
            }
        }
    }

    Ok(())
}
