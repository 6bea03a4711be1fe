//! Endpoint fallback policy for the real-time channel.
//!
//! Connection attempts go to the primary endpoint until it has failed a fixed
//! number of times in a row; after that the secondary endpoint is used for
//! every further attempt, without limit.

use serde::{Deserialize, Serialize};

/// Default number of consecutive primary failures before switching over.
pub const DEFAULT_MAX_PRIMARY_FAILURES: u32 = 3;

/// Primary/secondary endpoint selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointFallback {
    primary: String,
    secondary: Option<String>,
    max_primary_failures: u32,
    consecutive_failures: u32,
    using_fallback: bool,
}

impl EndpointFallback {
    /// Create a selector. Without a secondary, every attempt uses the primary.
    pub fn new(
        primary: impl Into<String>,
        secondary: Option<String>,
        max_primary_failures: u32,
    ) -> Self {
        Self {
            primary: primary.into(),
            secondary,
            max_primary_failures: max_primary_failures.max(1),
            consecutive_failures: 0,
            using_fallback: false,
        }
    }

    /// Endpoint the next connection attempt should use.
    pub fn current(&self) -> &str {
        match (&self.secondary, self.using_fallback) {
            (Some(secondary), true) => secondary,
            _ => &self.primary,
        }
    }

    /// Whether the secondary endpoint is in use.
    pub fn is_using_fallback(&self) -> bool {
        self.using_fallback
    }

    /// Consecutive failures against the current endpoint.
    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Record a failed attempt and return the endpoint to try next.
    pub fn record_failure(&mut self) -> &str {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if !self.using_fallback
            && self.secondary.is_some()
            && self.consecutive_failures >= self.max_primary_failures
        {
            tracing::warn!(
                failures = self.consecutive_failures,
                "primary endpoint unreachable, switching to fallback"
            );
            self.using_fallback = true;
            self.consecutive_failures = 0;
        }

        self.current()
    }

    /// Record a successful connection.
    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    /// Go back to the primary endpoint.
    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
        self.using_fallback = false;
    }
}
