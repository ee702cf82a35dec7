//! Pool configuration types

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for a connection pool
///
/// Controls pool sizing, checkout and wait timeouts, and the validation
/// probe. Every change to a live pool's configuration invalidates the
/// connections it currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of connections checked out at once
    max_active: usize,
    /// Maximum number of connections kept idle in the pool
    max_idle: usize,
    /// Time in milliseconds a checkout may last before another caller may reclaim it
    max_checkout_time_ms: u64,
    /// Time in milliseconds to wait for a free connection before re-checking the pool
    time_to_wait_ms: u64,
    /// Extra bad connections one acquire tolerates on top of `max_idle`
    bad_connection_tolerance: usize,
    /// Whether idle connections are probed before being handed out
    ping_enabled: bool,
    /// Statement run by the probe
    ping_query: String,
    /// Idle time in milliseconds after which a connection is probed
    ping_idle_threshold_ms: u64,
}

impl PoolConfig {
    /// Create a new pool configuration with the given active and idle limits
    ///
    /// `max_active` is raised to 1 if given as 0.
    pub fn new(max_active: usize, max_idle: usize) -> Self {
        Self {
            max_active: max_active.max(1),
            max_idle,
            max_checkout_time_ms: 20_000,
            time_to_wait_ms: 20_000,
            bad_connection_tolerance: 3,
            ping_enabled: false,
            ping_query: "NO PING QUERY SET".to_string(),
            ping_idle_threshold_ms: 0,
        }
    }

    pub fn with_max_checkout_time_ms(mut self, time_ms: u64) -> Self {
        self.max_checkout_time_ms = time_ms;
        self
    }

    pub fn with_time_to_wait_ms(mut self, time_ms: u64) -> Self {
        self.time_to_wait_ms = time_ms;
        self
    }

    pub fn with_bad_connection_tolerance(mut self, tolerance: usize) -> Self {
        self.bad_connection_tolerance = tolerance;
        self
    }

    /// Enable the validation probe with the given statement
    pub fn with_ping(mut self, query: impl Into<String>, idle_threshold_ms: u64) -> Self {
        self.ping_enabled = true;
        self.ping_query = query.into();
        self.ping_idle_threshold_ms = idle_threshold_ms;
        self
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn max_idle(&self) -> usize {
        self.max_idle
    }

    pub fn max_checkout_time(&self) -> Duration {
        Duration::from_millis(self.max_checkout_time_ms)
    }

    pub fn time_to_wait(&self) -> Duration {
        Duration::from_millis(self.time_to_wait_ms)
    }

    pub fn bad_connection_tolerance(&self) -> usize {
        self.bad_connection_tolerance
    }

    pub fn ping_enabled(&self) -> bool {
        self.ping_enabled
    }

    pub fn ping_query(&self) -> &str {
        &self.ping_query
    }

    pub fn ping_idle_threshold(&self) -> Duration {
        Duration::from_millis(self.ping_idle_threshold_ms)
    }

    /// Most bad connections a single acquire may see before giving up
    pub(crate) fn bad_connection_limit(&self) -> usize {
        self.max_idle.saturating_add(self.bad_connection_tolerance)
    }

    pub(crate) fn set_max_active(&mut self, max_active: usize) {
        self.max_active = max_active.max(1);
    }

    pub(crate) fn set_max_idle(&mut self, max_idle: usize) {
        self.max_idle = max_idle;
    }

    pub(crate) fn set_max_checkout_time_ms(&mut self, time_ms: u64) {
        self.max_checkout_time_ms = time_ms;
    }

    pub(crate) fn set_time_to_wait_ms(&mut self, time_ms: u64) {
        self.time_to_wait_ms = time_ms;
    }

    pub(crate) fn set_bad_connection_tolerance(&mut self, tolerance: usize) {
        self.bad_connection_tolerance = tolerance;
    }

    pub(crate) fn set_ping_enabled(&mut self, enabled: bool) {
        self.ping_enabled = enabled;
    }

    pub(crate) fn set_ping_query(&mut self, query: String) {
        self.ping_query = query;
    }

    pub(crate) fn set_ping_idle_threshold_ms(&mut self, time_ms: u64) {
        self.ping_idle_threshold_ms = time_ms;
    }
}

impl Default for PoolConfig {
    /// Create a default pool configuration
    ///
    /// Defaults:
    /// - max_active: 10
    /// - max_idle: 5
    /// - max_checkout_time: 20 seconds
    /// - time_to_wait: 20 seconds
    /// - bad_connection_tolerance: 3
    /// - ping: disabled
    fn default() -> Self {
        Self::new(10, 5)
    }
}
