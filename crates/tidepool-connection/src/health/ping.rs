//! Database ping implementation
//!
//! Provides lightweight liveness checking by executing the configured probe
//! statement and measuring response time.

use std::time::{Duration, Instant};

use thiserror::Error;
use tidepool_core::Connection;

/// Result of a ping operation
pub type PingResult = Result<Duration, PingError>;

/// Error that can occur during a ping operation
#[derive(Debug, Clone, Error)]
pub enum PingError {
    /// The connection is closed
    #[error("Connection is closed")]
    ConnectionClosed,
    /// Query execution failed
    #[error("Ping query failed: {0}")]
    QueryFailed(String),
}

/// Ping a database connection to check if it's alive.
///
/// Runs `query` on a fresh statement and returns the round-trip time. If the
/// connection is not in auto-commit mode the probe's transaction is rolled
/// back afterwards so it leaves no work pending.
///
/// # Example
///
/// ```ignore
/// use tidepool_connection::health::ping_connection;
///
/// let latency = ping_connection(connection.as_ref(), "SELECT 1")?;
/// println!("Database latency: {:?}", latency);
/// ```
pub fn ping_connection(conn: &dyn Connection, query: &str) -> PingResult {
    if conn.is_closed() {
        return Err(PingError::ConnectionClosed);
    }

    let start = Instant::now();

    let failed = |e: tidepool_core::TidepoolError| PingError::QueryFailed(e.to_string());
    let mut statement = conn.create_statement().map_err(failed)?;
    let outcome = statement.execute_query(query, &[]);
    let closed = statement.close();
    outcome.map_err(failed)?;
    closed.map_err(failed)?;

    if !conn.auto_commit().map_err(failed)? {
        conn.rollback().map_err(failed)?;
    }

    Ok(start.elapsed())
}
