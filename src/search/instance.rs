use crate::search::InstanceError;
use chrono::{DateTime, Utc};

/// Health record for one configured search backend
#[derive(Debug, Clone, PartialEq)]
pub struct SearchInstance {
    /// Endpoint the query is sent to
    pub address: String,

    pub healthy: bool,

    /// Failures since the last success
    pub consecutive_failures: u32,

    /// When the instance was last queried
    pub last_checked: Option<DateTime<Utc>>,

    /// Cause of the most recent failure, cleared by a success
    pub last_error: Option<InstanceError>,
}

impl SearchInstance {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            healthy: true,
            consecutive_failures: 0,
            last_checked: None,
            last_error: None,
        }
    }

    /// Resets the failure counter and marks the instance healthy
    pub fn record_success(&mut self) {
        self.healthy = true;
        self.consecutive_failures = 0;
        self.last_checked = Some(Utc::now());
        self.last_error = None;
    }

    /// Counts a failure; the instance turns unhealthy once the counter
    /// reaches `threshold`
    ///
    /// # Returns
    ///
    /// `true` if this failure flipped the instance to unhealthy
    pub fn record_failure(&mut self, error: InstanceError, threshold: u32) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_checked = Some(Utc::now());
        self.last_error = Some(error);

        let was_healthy = self.healthy;
        if self.consecutive_failures >= threshold {
            self.healthy = false;
        }
        was_healthy && !self.healthy
    }

    /// Manual recovery
    pub fn reset(&mut self) {
        self.healthy = true;
        self.consecutive_failures = 0;
        self.last_error = None;
    }
}
