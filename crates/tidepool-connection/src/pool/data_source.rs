//! Connection pool implementation

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};
use tidepool_core::{
    Driver, DriverProperties, DriverRegistry, Result, TidepoolError, TransactionIsolation,
};

use super::config::PoolConfig;
use super::connection::{PooledConnection, PooledConnectionInner};
use super::state::PoolState;
use super::stats::PoolStats;
use super::type_code::connection_type_code;
use crate::settings::DataSourceSettings;
use crate::unpooled::UnpooledDataSource;

/// Everything guarded by the pool mutex
pub(crate) struct PoolInner {
    config: PoolConfig,
    source: UnpooledDataSource,
    expected_type_code: u64,
    state: PoolState,
    shut_down: bool,
}

impl PoolInner {
    fn refresh_type_code(&mut self) {
        self.expected_type_code = connection_type_code(
            self.source.url(),
            self.source.username(),
            self.source.password(),
        );
    }

    /// Pick the next connection to try, or `None` if the caller must wait.
    ///
    /// Order: an idle connection, then a new one while under `max_active`,
    /// then the oldest checkout if it is overdue.
    fn next_candidate(
        &mut self,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Option<PooledConnectionInner>> {
        if let Some(conn) = self.state.idle.pop_front() {
            tracing::debug!(connection_id = %conn.id(), "checked out connection from pool");
            return Ok(Some(conn));
        }

        if self.state.active.len() < self.config.max_active() {
            let conn = PooledConnectionInner::new(self.source.open(username, password)?);
            tracing::debug!(connection_id = %conn.id(), "created connection");
            return Ok(Some(conn));
        }

        let Some(oldest) = self.state.active.first() else {
            return Ok(None);
        };
        let checkout_time = oldest.checkout_time();
        if checkout_time <= self.config.max_checkout_time() {
            return Ok(None);
        }

        let oldest = self.state.active.remove(0);
        self.state.record_overdue_claim(checkout_time);
        if let Err(e) = oldest.rollback_if_needed() {
            tracing::debug!(
                connection_id = %oldest.id(),
                error = %e,
                "bad connection, could not roll back"
            );
        }
        let conn = oldest.rewrap();
        oldest.invalidate();
        tracing::debug!(
            connection_id = %conn.id(),
            checkout_time = ?checkout_time,
            "claimed overdue connection"
        );
        Ok(Some(conn))
    }

    /// Close every pooled connection, newest checkout first, then the idle list.
    fn force_close_all(&mut self) {
        self.refresh_type_code();
        while let Some(conn) = self.state.active.pop() {
            conn.discard();
        }
        while let Some(conn) = self.state.idle.pop_back() {
            conn.discard();
        }
    }
}

/// State shared between the data source and the connections it hands out
pub(crate) struct PoolShared {
    inner: Mutex<PoolInner>,
    available: Condvar,
}

impl PoolShared {
    /// Take a connection back from a caller.
    ///
    /// Valid connections go back to the idle list while there is room and
    /// the pool still targets the database they were opened for; everything
    /// else is closed. Never fails.
    pub(crate) fn release(&self, conn: &Arc<PooledConnectionInner>) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        inner.state.remove_active(conn);

        if !conn.is_valid() {
            // Reclaimed or force-closed: the physical connection is no longer ours.
            tracing::debug!(
                connection_id = %conn.id(),
                "a bad connection attempted to return to the pool, discarding"
            );
            inner.state.bad_connection_count += 1;
            return;
        }

        inner.state.accumulated_checkout_time += conn.checkout_time();

        if conn.real().is_closed() {
            tracing::debug!(
                connection_id = %conn.id(),
                "a closed connection attempted to return to the pool, discarding"
            );
            conn.invalidate();
            inner.state.bad_connection_count += 1;
            self.available.notify_all();
            return;
        }

        let reusable = !inner.shut_down
            && inner.state.idle.len() < inner.config.max_idle()
            && conn.type_code() == inner.expected_type_code;

        if reusable {
            match conn.rollback_if_needed() {
                Ok(()) => {
                    let replacement = conn.rewrap();
                    conn.invalidate();
                    inner.state.idle.push_back(replacement);
                    tracing::debug!(connection_id = %conn.id(), "returned connection to pool");
                }
                Err(e) => {
                    tracing::debug!(
                        connection_id = %conn.id(),
                        error = %e,
                        "rollback on return failed, discarding connection"
                    );
                    conn.discard();
                    inner.state.bad_connection_count += 1;
                }
            }
        } else {
            conn.discard();
            tracing::debug!(connection_id = %conn.id(), "closed connection");
        }

        self.available.notify_all();
    }
}

/// A synchronous, thread-safe pool of database connections
///
/// Cloning is cheap and yields another handle to the same pool.
///
/// # Example
///
/// ```ignore
/// use tidepool_connection::{PoolConfig, PooledDataSource, UnpooledDataSource};
///
/// let source = UnpooledDataSource::new(driver, "postgres://localhost/app")
///     .with_credentials("app", "secret");
/// let pool = PooledDataSource::new(source, PoolConfig::new(10, 5));
///
/// let conn = pool.get_connection()?;
/// conn.query("SELECT 1", &[])?;
/// conn.close()?; // back to the pool
/// ```
#[derive(Clone)]
pub struct PooledDataSource {
    shared: Arc<PoolShared>,
}

impl PooledDataSource {
    /// Create a pool that opens connections through `source`
    pub fn new(source: UnpooledDataSource, mut config: PoolConfig) -> Self {
        config.set_max_active(config.max_active());
        let mut inner = PoolInner {
            config,
            source,
            expected_type_code: 0,
            state: PoolState::default(),
            shut_down: false,
        };
        inner.refresh_type_code();

        Self {
            shared: Arc::new(PoolShared {
                inner: Mutex::new(inner),
                available: Condvar::new(),
            }),
        }
    }

    /// Build a pool from loaded settings, resolving the driver by name
    pub fn from_settings(settings: &DataSourceSettings, registry: &DriverRegistry) -> Result<Self> {
        let driver = registry.require(&settings.driver)?;
        let mut source = UnpooledDataSource::new(driver, settings.url.clone())
            .with_auto_commit(settings.auto_commit)
            .with_driver_properties(settings.properties.clone());
        source.set_username(settings.username.clone());
        source.set_password(settings.password.clone());
        if let Some(level) = settings.transaction_isolation {
            source = source.with_transaction_isolation(level);
        }
        Ok(Self::new(source, settings.pool.clone()))
    }

    /// Get a connection using the configured credentials
    pub fn get_connection(&self) -> Result<PooledConnection> {
        let guard = self.shared.inner.lock();
        let username = guard.source.username().map(str::to_string);
        let password = guard.source.password().map(str::to_string);
        self.acquire_locked(guard, username.as_deref(), password.as_deref(), None)
    }

    /// Get a connection using explicit credentials
    pub fn get_connection_as(&self, username: &str, password: &str) -> Result<PooledConnection> {
        self.acquire(Some(username), Some(password), None)
    }

    /// Get a connection from the pool
    ///
    /// This will:
    /// 1. Take the oldest idle connection, if any
    /// 2. Otherwise open a new one while under `max_active`
    /// 3. Otherwise reclaim the oldest checkout if it is overdue
    /// 4. Otherwise wait up to `time_to_wait` for a release and try again
    ///
    /// Candidates that fail validation are discarded and the search restarts;
    /// after more than `max_idle + bad_connection_tolerance` of them the call
    /// fails with [`TidepoolError::PoolExhausted`].
    ///
    /// Without a `deadline` the call only returns once it gets a connection
    /// (or the pool is exhausted or shut down). With one it fails with
    /// [`TidepoolError::Timeout`] once the deadline passes while waiting.
    pub fn acquire(
        &self,
        username: Option<&str>,
        password: Option<&str>,
        deadline: Option<Instant>,
    ) -> Result<PooledConnection> {
        let guard = self.shared.inner.lock();
        self.acquire_locked(guard, username, password, deadline)
    }

    fn acquire_locked(
        &self,
        mut guard: MutexGuard<'_, PoolInner>,
        username: Option<&str>,
        password: Option<&str>,
        deadline: Option<Instant>,
    ) -> Result<PooledConnection> {
        let started = Instant::now();
        let mut counted_wait = false;
        let mut local_bad_connections = 0usize;

        loop {
            if guard.shut_down {
                return Err(TidepoolError::PoolClosed);
            }

            let Some(mut candidate) = guard.next_candidate(username, password)? else {
                if !counted_wait {
                    guard.state.had_to_wait_count += 1;
                    counted_wait = true;
                }
                let timeout = wait_timeout(guard.config.time_to_wait(), deadline)?;
                tracing::debug!(
                    wait = ?timeout,
                    "waiting for a connection"
                );
                let wait_started = Instant::now();
                match timeout {
                    Some(timeout) => {
                        self.shared.available.wait_for(&mut guard, timeout);
                    }
                    None => self.shared.available.wait(&mut guard),
                }
                guard.state.accumulated_wait_time += wait_started.elapsed();
                continue;
            };

            if candidate.probe(&guard.config) && candidate.rollback_if_needed().is_ok() {
                let type_code = connection_type_code(guard.source.url(), username, password);
                candidate.mark_checked_out(type_code);
                let conn = Arc::new(candidate);
                guard.state.active.push(Arc::clone(&conn));
                guard.state.record_request(started.elapsed());
                return Ok(PooledConnection::new(conn, Arc::clone(&self.shared)));
            }

            tracing::debug!(
                connection_id = %candidate.id(),
                "a bad connection was returned from the pool, getting another connection"
            );
            candidate.discard();
            guard.state.bad_connection_count += 1;
            local_bad_connections += 1;
            if local_bad_connections > guard.config.bad_connection_limit() {
                tracing::debug!("could not get a good connection to the database");
                return Err(TidepoolError::PoolExhausted(
                    "Could not get a good connection to the database".into(),
                ));
            }
        }
    }

    /// Return a connection to the pool. Equivalent to closing it.
    pub fn release(&self, conn: PooledConnection) {
        drop(conn);
    }

    /// Run the validation probe on a checked-out connection
    pub fn validate(&self, conn: &PooledConnection) -> bool {
        let config = self.shared.inner.lock().config.clone();
        conn.is_valid() && conn.inner().probe(&config)
    }

    /// Close all active and idle connections.
    ///
    /// Holders of active connections find them invalid afterwards. Blocked
    /// acquires wake up and open fresh connections.
    pub fn force_close_all(&self) {
        let mut guard = self.shared.inner.lock();
        let closed = guard.state.active.len() + guard.state.idle.len();
        guard.force_close_all();
        self.shared.available.notify_all();
        drop(guard);
        tracing::info!(closed, "forcefully closed and removed all connections");
    }

    /// Close every connection and refuse further acquires.
    ///
    /// Callers blocked in [`acquire`](Self::acquire) fail with
    /// [`TidepoolError::PoolClosed`].
    pub fn shutdown(&self) {
        let mut guard = self.shared.inner.lock();
        guard.shut_down = true;
        guard.force_close_all();
        self.shared.available.notify_all();
        drop(guard);
        tracing::info!("connection pool shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.inner.lock().shut_down
    }

    /// Get a snapshot of the pool statistics
    pub fn stats(&self) -> PoolStats {
        self.shared.inner.lock().state.snapshot()
    }

    pub fn idle_count(&self) -> usize {
        self.shared.inner.lock().state.idle.len()
    }

    pub fn active_count(&self) -> usize {
        self.shared.inner.lock().state.active.len()
    }

    /// Type code that connections must carry to be pooled
    pub fn expected_type_code(&self) -> u64 {
        self.shared.inner.lock().expected_type_code
    }

    pub fn config(&self) -> PoolConfig {
        self.shared.inner.lock().config.clone()
    }

    pub fn url(&self) -> String {
        self.shared.inner.lock().source.url().to_string()
    }

    pub fn username(&self) -> Option<String> {
        self.shared.inner.lock().source.username().map(str::to_string)
    }

    pub fn auto_commit(&self) -> bool {
        self.shared.inner.lock().source.auto_commit()
    }

    pub fn default_transaction_isolation(&self) -> Option<TransactionIsolation> {
        self.shared.inner.lock().source.default_transaction_isolation()
    }

    /// Apply a configuration change and invalidate every pooled connection
    /// in the same critical section.
    fn reconfigure(&self, apply: impl FnOnce(&mut PoolInner)) {
        let mut guard = self.shared.inner.lock();
        apply(&mut guard);
        guard.force_close_all();
        self.shared.available.notify_all();
        drop(guard);
        tracing::info!("pool reconfigured, all connections closed");
    }

    pub fn set_driver(&self, driver: Arc<dyn Driver>) {
        self.reconfigure(|inner| inner.source.set_driver(driver));
    }

    pub fn set_url(&self, url: impl Into<String>) {
        let url = url.into();
        self.reconfigure(|inner| inner.source.set_url(url));
    }

    pub fn set_username(&self, username: Option<String>) {
        self.reconfigure(|inner| inner.source.set_username(username));
    }

    pub fn set_password(&self, password: Option<String>) {
        self.reconfigure(|inner| inner.source.set_password(password));
    }

    pub fn set_driver_properties(&self, properties: DriverProperties) {
        self.reconfigure(|inner| inner.source.set_driver_properties(properties));
    }

    pub fn set_auto_commit(&self, auto_commit: bool) {
        self.reconfigure(|inner| inner.source.set_auto_commit(auto_commit));
    }

    pub fn set_default_transaction_isolation(&self, level: Option<TransactionIsolation>) {
        self.reconfigure(|inner| inner.source.set_default_transaction_isolation(level));
    }

    /// Set the active limit; 0 is raised to 1
    pub fn set_max_active(&self, max_active: usize) {
        self.reconfigure(|inner| inner.config.set_max_active(max_active));
    }

    pub fn set_max_idle(&self, max_idle: usize) {
        self.reconfigure(|inner| inner.config.set_max_idle(max_idle));
    }

    pub fn set_max_checkout_time_ms(&self, time_ms: u64) {
        self.reconfigure(|inner| inner.config.set_max_checkout_time_ms(time_ms));
    }

    pub fn set_time_to_wait_ms(&self, time_ms: u64) {
        self.reconfigure(|inner| inner.config.set_time_to_wait_ms(time_ms));
    }

    pub fn set_ping_enabled(&self, enabled: bool) {
        self.reconfigure(|inner| inner.config.set_ping_enabled(enabled));
    }

    pub fn set_ping_query(&self, query: impl Into<String>) {
        let query = query.into();
        self.reconfigure(|inner| inner.config.set_ping_query(query));
    }

    pub fn set_ping_idle_threshold_ms(&self, time_ms: u64) {
        self.reconfigure(|inner| inner.config.set_ping_idle_threshold_ms(time_ms));
    }

    /// Change the bad-connection tolerance.
    ///
    /// Only affects acquire bookkeeping, so pooled connections are kept.
    pub fn set_bad_connection_tolerance(&self, tolerance: usize) {
        self.shared
            .inner
            .lock()
            .config
            .set_bad_connection_tolerance(tolerance);
    }
}

/// How long one wait may last: `time_to_wait` capped by the deadline.
///
/// A zero `time_to_wait` waits until signalled. Fails once the deadline has
/// passed.
fn wait_timeout(time_to_wait: Duration, deadline: Option<Instant>) -> Result<Option<Duration>> {
    let per_wait = (!time_to_wait.is_zero()).then_some(time_to_wait);
    let Some(deadline) = deadline else {
        return Ok(per_wait);
    };

    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(TidepoolError::Timeout(
            "Timed out waiting for a pooled connection".into(),
        ));
    }
    Ok(Some(per_wait.map_or(remaining, |wait| wait.min(remaining))))
}

impl std::fmt::Debug for PooledDataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let guard = self.shared.inner.lock();
        f.debug_struct("PooledDataSource")
            .field("source", &guard.source)
            .field("config", &guard.config)
            .field("stats", &guard.state.snapshot())
            .field("shut_down", &guard.shut_down)
            .finish()
    }
}
