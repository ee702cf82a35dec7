//! Tidepool Core - Driver-facing abstractions for the connection pool
//!
//! This crate provides the traits and types the pool is written against:
//!
//! - `Driver` - Opens physical connections (the connection factory)
//! - `Connection` / `Statement` - Operations on a physical connection
//! - `DriverRegistry` - Drivers looked up by name
//! - `TidepoolError` - The shared error type

mod connection;
mod driver;
mod error;
mod types;

pub use connection::*;
pub use driver::*;
pub use error::*;
pub use types::*;
