//! Health reporting.
//!
//! The scheduler describes itself as a single [`HealthCheck`]; the daemon
//! serialises it on its readiness endpoint.

use std::fmt;

/// Coarse health of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthStatus {
    /// Running and serving fresh data
    Healthy,
    /// Running, but no complete cycle yet with the current source
    Degraded,
    /// Not running
    Unhealthy,
}

impl HealthStatus {
    /// Lower-case label used in logs and HTTP bodies.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Health of one component, with free-form details.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Component name
    pub component: String,
    /// Status
    pub status: HealthStatus,
    /// Why the component is not healthy
    pub message: Option<String>,
    /// Key/value details in insertion order
    pub metadata: Vec<(String, String)>,
}

impl HealthCheck {
    /// Check with no message or details.
    #[must_use]
    pub fn new(component: impl Into<String>, status: HealthStatus) -> Self {
        Self {
            component: component.into(),
            status,
            message: None,
            metadata: Vec::new(),
        }
    }

    /// Attach an explanation.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Append a detail.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.push((key.into(), value.into()));
        self
    }
}
