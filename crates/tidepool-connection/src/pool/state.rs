//! Shared pool state
//!
//! Everything in here is only touched while holding the pool mutex.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use super::connection::PooledConnectionInner;
use super::stats::PoolStats;

#[derive(Default)]
pub(crate) struct PoolState {
    /// Returned connections, oldest first
    pub(crate) idle: VecDeque<PooledConnectionInner>,
    /// Checked-out connections in checkout order
    pub(crate) active: Vec<Arc<PooledConnectionInner>>,
    pub(crate) request_count: u64,
    pub(crate) accumulated_request_time: Duration,
    pub(crate) accumulated_checkout_time: Duration,
    pub(crate) claimed_overdue_count: u64,
    pub(crate) accumulated_overdue_checkout_time: Duration,
    pub(crate) had_to_wait_count: u64,
    pub(crate) accumulated_wait_time: Duration,
    pub(crate) bad_connection_count: u64,
}

impl PoolState {
    pub(crate) fn record_request(&mut self, elapsed: Duration) {
        self.request_count += 1;
        self.accumulated_request_time += elapsed;
    }

    pub(crate) fn record_overdue_claim(&mut self, checkout_time: Duration) {
        self.claimed_overdue_count += 1;
        self.accumulated_overdue_checkout_time += checkout_time;
        self.accumulated_checkout_time += checkout_time;
    }

    /// Remove `conn` from the active list, matching by wrapper identity.
    ///
    /// Matching on the physical connection would be wrong here: a reclaimed
    /// wrapper shares it with the wrapper that replaced it.
    pub(crate) fn remove_active(&mut self, conn: &Arc<PooledConnectionInner>) -> bool {
        match self.active.iter().position(|c| Arc::ptr_eq(c, conn)) {
            Some(index) => {
                self.active.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> PoolStats {
        PoolStats {
            idle: self.idle.len(),
            active: self.active.len(),
            request_count: self.request_count,
            accumulated_request_time: self.accumulated_request_time,
            accumulated_checkout_time: self.accumulated_checkout_time,
            claimed_overdue_count: self.claimed_overdue_count,
            accumulated_overdue_checkout_time: self.accumulated_overdue_checkout_time,
            had_to_wait_count: self.had_to_wait_count,
            accumulated_wait_time: self.accumulated_wait_time,
            bad_connection_count: self.bad_connection_count,
        }
    }
}
