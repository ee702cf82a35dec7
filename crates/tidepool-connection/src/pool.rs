//! Connection pooling for database connections
//!
//! A [`PooledDataSource`] keeps up to `max_active` physical connections
//! checked out and up to `max_idle` waiting for reuse. Callers that find the
//! pool saturated either reclaim an overdue checkout or wait for a release.
//!
//! # Example
//!
//! ```ignore
//! use tidepool_connection::pool::{PoolConfig, PooledDataSource};
//!
//! let config = PoolConfig::new(5, 2)
//!     .with_max_checkout_time_ms(10_000)
//!     .with_ping("SELECT 1", 30_000);
//!
//! let pool = PooledDataSource::new(unpooled, config);
//! let conn = pool.get_connection()?;
//! // Use connection...
//! // Connection returned to pool on close or drop
//! ```

mod config;
mod connection;
mod data_source;
mod state;
mod stats;
mod type_code;


pub use config::PoolConfig;
pub use connection::PooledConnection;
pub use data_source::PooledDataSource;
pub use stats::PoolStats;
pub use type_code::connection_type_code;
