//! Liveness probing for database connections
//!
//! # Example
//!
//! ```ignore
//! use tidepool_connection::health::ping_connection;
//!
//! let latency = ping_connection(connection.as_ref(), "SELECT 1")?;
//! ```

mod ping;

#[cfg(test)]
mod tests;

pub use ping::{PingError, PingResult, ping_connection};
