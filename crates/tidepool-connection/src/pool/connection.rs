//! Pooled connection wrapper and the handle given to callers

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tidepool_core::{
    Connection, QueryResult, Result, Statement, TidepoolError, TransactionIsolation, Value,
};
use uuid::Uuid;

use super::config::PoolConfig;
use super::data_source::PoolShared;
use crate::health::ping_connection;

/// Internal wrapper for pooled connections with metadata
///
/// A wrapper is never reused once invalidated. Returning a connection to the
/// idle list or reclaiming it from an overdue holder builds a fresh wrapper
/// around the same physical connection with [`PooledConnectionInner::rewrap`].
pub(crate) struct PooledConnectionInner {
    /// Identity of the physical connection, kept across rewraps
    id: Uuid,
    real: Arc<dyn Connection>,
    valid: AtomicBool,
    type_code: u64,
    created_at: Instant,
    last_used_at: Instant,
    checkout_at: Instant,
}

impl PooledConnectionInner {
    pub(crate) fn new(real: Arc<dyn Connection>) -> Self {
        let now = Instant::now();
        Self {
            id: Uuid::new_v4(),
            real,
            valid: AtomicBool::new(true),
            type_code: 0,
            created_at: now,
            last_used_at: now,
            checkout_at: now,
        }
    }

    /// Wrap the same physical connection again, keeping its history
    pub(crate) fn rewrap(&self) -> Self {
        Self {
            id: self.id,
            real: Arc::clone(&self.real),
            valid: AtomicBool::new(true),
            type_code: self.type_code,
            created_at: self.created_at,
            last_used_at: self.last_used_at,
            checkout_at: Instant::now(),
        }
    }

    /// Stamp the wrapper as handed out to a caller connecting as `type_code`
    pub(crate) fn mark_checked_out(&mut self, type_code: u64) {
        let now = Instant::now();
        self.type_code = type_code;
        self.checkout_at = now;
        self.last_used_at = now;
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn real(&self) -> &Arc<dyn Connection> {
        &self.real
    }

    pub(crate) fn type_code(&self) -> u64 {
        self.type_code
    }

    pub(crate) fn is_valid(&self) -> bool {
        self.valid.load(Ordering::SeqCst)
    }

    pub(crate) fn invalidate(&self) {
        self.valid.store(false, Ordering::SeqCst);
    }

    pub(crate) fn checkout_time(&self) -> Duration {
        self.checkout_at.elapsed()
    }

    pub(crate) fn time_since_last_use(&self) -> Duration {
        self.last_used_at.elapsed()
    }

    /// Roll back pending work unless the connection is in auto-commit mode
    pub(crate) fn rollback_if_needed(&self) -> Result<()> {
        if !self.real.auto_commit()? {
            self.real.rollback()?;
        }
        Ok(())
    }

    /// Invalidate the wrapper and close its physical connection.
    ///
    /// Failures are only logged: the connection is being thrown away.
    pub(crate) fn discard(&self) {
        self.invalidate();
        if let Err(e) = self.rollback_if_needed() {
            tracing::debug!(connection_id = %self.id, error = %e, "rollback before close failed");
        }
        if let Err(e) = self.real.close() {
            tracing::debug!(connection_id = %self.id, error = %e, "close failed");
        }
    }

    /// Check that the connection can still be handed out.
    ///
    /// Connections idle for longer than the ping threshold are probed with the
    /// configured query when pinging is enabled. A failed probe closes the
    /// physical connection.
    pub(crate) fn probe(&self, config: &PoolConfig) -> bool {
        if !self.is_valid() {
            return false;
        }
        if self.real.is_closed() {
            tracing::debug!(connection_id = %self.id, "connection is bad: already closed");
            return false;
        }
        if !config.ping_enabled() || self.time_since_last_use() <= config.ping_idle_threshold() {
            return true;
        }

        tracing::debug!(connection_id = %self.id, "testing connection");
        match ping_connection(self.real.as_ref(), config.ping_query()) {
            Ok(latency) => {
                tracing::debug!(
                    connection_id = %self.id,
                    latency = ?latency,
                    "connection is good"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    connection_id = %self.id,
                    query = %config.ping_query(),
                    error = %e,
                    "execution of ping query failed"
                );
                if let Err(e) = self.real.close() {
                    tracing::debug!(connection_id = %self.id, error = %e, "close failed");
                }
                false
            }
        }
    }
}

/// A connection borrowed from the pool
///
/// Forwards every operation to the physical connection. `close()` returns
/// the connection to the pool instead of closing it; dropping the handle
/// without closing it does the same. Once the pool invalidates the
/// underlying wrapper (overdue reclaim, force-close, reconfiguration) every
/// operation fails.
pub struct PooledConnection {
    inner: Arc<PooledConnectionInner>,
    pool: Arc<PoolShared>,
    released: AtomicBool,
}

impl PooledConnection {
    pub(crate) fn new(inner: Arc<PooledConnectionInner>, pool: Arc<PoolShared>) -> Self {
        Self {
            inner,
            pool,
            released: AtomicBool::new(false),
        }
    }

    pub(crate) fn inner(&self) -> &Arc<PooledConnectionInner> {
        &self.inner
    }

    fn checked(&self) -> Result<&Arc<dyn Connection>> {
        if self.released.load(Ordering::SeqCst) || !self.inner.is_valid() {
            return Err(TidepoolError::Connection(
                "Error accessing pooled connection: connection is invalid".into(),
            ));
        }
        Ok(&self.inner.real)
    }

    /// Identity of the underlying physical connection
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn type_code(&self) -> u64 {
        self.inner.type_code
    }

    /// Whether the pool still considers this handle usable
    pub fn is_valid(&self) -> bool {
        !self.released.load(Ordering::SeqCst) && self.inner.is_valid()
    }

    /// When the physical connection was opened
    pub fn created_at(&self) -> Instant {
        self.inner.created_at
    }

    pub fn last_used_at(&self) -> Instant {
        self.inner.last_used_at
    }

    pub fn checkout_at(&self) -> Instant {
        self.inner.checkout_at
    }

    /// How long this handle has been checked out
    pub fn checkout_time(&self) -> Duration {
        self.inner.checkout_time()
    }

    pub fn age(&self) -> Duration {
        self.inner.created_at.elapsed()
    }

    pub fn time_since_last_use(&self) -> Duration {
        self.inner.time_since_last_use()
    }

    /// Unwrap the physical connection.
    ///
    /// Closing the returned connection bypasses the pool; the pool will find
    /// it broken when it comes back.
    pub fn real_connection(&self) -> Result<Arc<dyn Connection>> {
        self.checked().map(Arc::clone)
    }

    fn release(&self) {
        if !self.released.swap(true, Ordering::SeqCst) {
            self.pool.release(&self.inner);
        }
    }
}

impl Connection for PooledConnection {
    fn driver_name(&self) -> &str {
        self.inner.real.driver_name()
    }

    fn create_statement(&self) -> Result<Box<dyn Statement>> {
        self.checked()?.create_statement()
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.checked()?.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.checked()?.execute(sql, params)
    }

    fn auto_commit(&self) -> Result<bool> {
        self.checked()?.auto_commit()
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.checked()?.set_auto_commit(auto_commit)
    }

    fn transaction_isolation(&self) -> Result<Option<TransactionIsolation>> {
        self.checked()?.transaction_isolation()
    }

    fn set_transaction_isolation(&self, level: TransactionIsolation) -> Result<()> {
        self.checked()?.set_transaction_isolation(level)
    }

    fn commit(&self) -> Result<()> {
        self.checked()?.commit()
    }

    fn rollback(&self) -> Result<()> {
        self.checked()?.rollback()
    }

    /// Return the connection to the pool.
    ///
    /// Fails if this handle was already closed.
    fn close(&self) -> Result<()> {
        if self.released.load(Ordering::SeqCst) {
            return Err(TidepoolError::Connection(
                "Error accessing pooled connection: connection is already closed".into(),
            ));
        }
        self.release();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        !self.is_valid() || self.inner.real.is_closed()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PooledConnection")
            .field("id", &self.inner.id)
            .field("driver", &self.inner.real.driver_name())
            .field("valid", &self.is_valid())
            .field("checkout_time", &self.checkout_time())
            .finish()
    }
}
