//! Error types for Tidepool

use thiserror::Error;

/// Core error type for Tidepool operations
#[derive(Error, Debug)]
pub enum TidepoolError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error("Driver error: {0}")]
    Driver(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not supported: {0}")]
    NotSupported(String),

    /// Too many bad connections were handed out during a single acquire
    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    /// The pool was shut down, either before or during an acquire
    #[error("Pool closed")]
    PoolClosed,

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for Tidepool operations
pub type Result<T> = std::result::Result<T, TidepoolError>;
