//! Connection and statement traits

use crate::{QueryResult, Result, Value};
use serde::{Deserialize, Serialize};

/// Transaction isolation levels a connection can be switched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionIsolation {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl std::fmt::Display for TransactionIsolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            TransactionIsolation::ReadUncommitted => "READ UNCOMMITTED",
            TransactionIsolation::ReadCommitted => "READ COMMITTED",
            TransactionIsolation::RepeatableRead => "REPEATABLE READ",
            TransactionIsolation::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

/// A statement created from a connection
///
/// Statements borrow nothing from their connection; drivers share whatever
/// session state they need internally.
pub trait Statement: Send {
    /// Execute a query that returns rows
    fn execute_query(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult>;

    /// Execute a statement that modifies data, returning the affected row count
    fn execute_update(&mut self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Release the statement's resources
    fn close(self: Box<Self>) -> Result<()>;
}

/// A physical database connection
///
/// Every method takes `&self`: drivers are expected to synchronise their
/// own session state, which lets a pool share one connection between its
/// bookkeeping and the handle it gives to callers.
pub trait Connection: Send + Sync {
    /// Get the driver name (e.g., "sqlite", "postgresql", "mysql")
    fn driver_name(&self) -> &str;

    /// Create a new statement on this connection
    fn create_statement(&self) -> Result<Box<dyn Statement>>;

    /// Execute a query that returns rows (SELECT)
    fn query(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let mut statement = self.create_statement()?;
        let result = statement.execute_query(sql, params);
        statement.close()?;
        result
    }

    /// Execute a statement that modifies data (INSERT/UPDATE/DELETE)
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let mut statement = self.create_statement()?;
        let result = statement.execute_update(sql, params);
        statement.close()?;
        result
    }

    /// Whether each statement commits on its own
    fn auto_commit(&self) -> Result<bool>;

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()>;

    /// Current isolation level, if the driver reports one
    fn transaction_isolation(&self) -> Result<Option<TransactionIsolation>>;

    fn set_transaction_isolation(&self, level: TransactionIsolation) -> Result<()>;

    /// Commit pending work (no-op in auto-commit mode)
    fn commit(&self) -> Result<()>;

    /// Roll back pending work (no-op in auto-commit mode)
    fn rollback(&self) -> Result<()>;

    /// Close the connection
    fn close(&self) -> Result<()>;

    /// Check if the connection is closed
    fn is_closed(&self) -> bool;
}
