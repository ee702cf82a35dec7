//! Tidepool Connection - Pooled and unpooled data sources
//!
//! This crate opens physical connections through a [`tidepool_core::Driver`]
//! and keeps them in a bounded, thread-safe pool.

pub mod health;
pub mod pool;
mod settings;
mod unpooled;

pub use health::{PingError, PingResult, ping_connection};
pub use pool::{PoolConfig, PoolStats, PooledConnection, PooledDataSource, connection_type_code};
pub use settings::DataSourceSettings;
pub use unpooled::UnpooledDataSource;
