//! Pool statistics types

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Read-only snapshot of a connection pool's counters
///
/// Taken under the pool lock, so every field describes the same instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolStats {
    /// Number of idle connections available in the pool
    pub idle: usize,
    /// Number of connections currently checked out
    pub active: usize,
    /// Successful acquires
    pub request_count: u64,
    /// Total time spent inside successful acquires
    pub accumulated_request_time: Duration,
    /// Total time connections spent checked out
    pub accumulated_checkout_time: Duration,
    /// Overdue connections reclaimed from their holders
    pub claimed_overdue_count: u64,
    /// Total checkout time of the reclaimed overdue connections
    pub accumulated_overdue_checkout_time: Duration,
    /// Acquires that had to wait at least once
    pub had_to_wait_count: u64,
    /// Total time acquires spent waiting
    pub accumulated_wait_time: Duration,
    /// Connections found broken on checkout or return
    pub bad_connection_count: u64,
}

impl PoolStats {
    /// Total number of connections (idle + active)
    pub fn total(&self) -> usize {
        self.idle + self.active
    }

    pub fn average_request_time(&self) -> Duration {
        average(self.accumulated_request_time, self.request_count)
    }

    /// Average wait of the acquires that had to wait
    pub fn average_wait_time(&self) -> Duration {
        average(self.accumulated_wait_time, self.had_to_wait_count)
    }

    pub fn average_checkout_time(&self) -> Duration {
        average(self.accumulated_checkout_time, self.request_count)
    }

    pub fn average_overdue_checkout_time(&self) -> Duration {
        average(
            self.accumulated_overdue_checkout_time,
            self.claimed_overdue_count,
        )
    }

    /// Calculate pool utilization as a fraction (0.0 to 1.0)
    ///
    /// Returns 0.0 if the pool holds no connections.
    pub fn utilization(&self) -> f64 {
        if self.total() == 0 {
            0.0
        } else {
            self.active as f64 / self.total() as f64
        }
    }
}

fn average(total: Duration, count: u64) -> Duration {
    match u32::try_from(count) {
        Ok(0) => Duration::ZERO,
        Ok(count) => total / count,
        Err(_) => Duration::from_secs_f64(total.as_secs_f64() / count as f64),
    }
}

impl fmt::Display for PoolStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{ active: {}, idle: {}, requests: {}, avg_request: {:?}, avg_checkout: {:?}, \
             overdue_claimed: {}, avg_overdue_checkout: {:?}, waited: {}, avg_wait: {:?}, \
             bad_connections: {} }}",
            self.active,
            self.idle,
            self.request_count,
            self.average_request_time(),
            self.average_checkout_time(),
            self.claimed_overdue_count,
            self.average_overdue_checkout_time(),
            self.had_to_wait_count,
            self.average_wait_time(),
            self.bad_connection_count,
        )
    }
}
