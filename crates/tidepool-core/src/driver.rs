//! Database driver trait and registry

use crate::{Connection, Result, TidepoolError};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Key/value properties handed to a driver when opening a connection.
///
/// The `user` and `password` keys carry credentials.
pub type DriverProperties = BTreeMap<String, String>;

/// Property key carrying the user name
pub const USER_PROPERTY: &str = "user";
/// Property key carrying the password
pub const PASSWORD_PROPERTY: &str = "password";

/// Opens physical connections to one kind of database
pub trait Driver: Send + Sync {
    /// Unique identifier for this driver (e.g., "postgres", "mysql", "sqlite")
    fn name(&self) -> &str;

    /// Open a new physical connection to `url`
    fn open(&self, url: &str, properties: &DriverProperties) -> Result<Arc<dyn Connection>>;
}

/// Registry of available drivers, looked up by name
#[derive(Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<dyn Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver under its own name, replacing any previous one
    pub fn register(&mut self, driver: Arc<dyn Driver>) {
        let name = driver.name().to_string();
        tracing::debug!(driver = %name, "registering driver");
        self.drivers.insert(name, driver);
    }

    /// Get a driver by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Driver>> {
        self.drivers.get(name).cloned()
    }

    /// Get a driver by name, failing with a driver error if unknown
    pub fn require(&self, name: &str) -> Result<Arc<dyn Driver>> {
        self.get(name)
            .ok_or_else(|| TidepoolError::Driver(format!("Unknown driver: {}", name)))
    }

    /// Names of all registered drivers, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.drivers.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Statement, TransactionIsolation};

    struct NullDriver;

    impl Driver for NullDriver {
        fn name(&self) -> &str {
            "null"
        }

        fn open(&self, _url: &str, _properties: &DriverProperties) -> Result<Arc<dyn Connection>> {
            Err(TidepoolError::NotSupported("null driver cannot connect".into()))
        }
    }

    struct StatementlessConnection;

    impl Connection for StatementlessConnection {
        fn driver_name(&self) -> &str {
            "statementless"
        }
        fn create_statement(&self) -> Result<Box<dyn Statement>> {
            Err(TidepoolError::NotSupported("statements".into()))
        }
        fn auto_commit(&self) -> Result<bool> {
            Ok(true)
        }
        fn set_auto_commit(&self, _auto_commit: bool) -> Result<()> {
            Ok(())
        }
        fn transaction_isolation(&self) -> Result<Option<TransactionIsolation>> {
            Ok(None)
        }
        fn set_transaction_isolation(&self, _level: TransactionIsolation) -> Result<()> {
            Ok(())
        }
        fn commit(&self) -> Result<()> {
            Ok(())
        }
        fn rollback(&self) -> Result<()> {
            Ok(())
        }
        fn close(&self) -> Result<()> {
            Ok(())
        }
        fn is_closed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = DriverRegistry::new();
        registry.register(Arc::new(NullDriver));

        assert!(registry.get("null").is_some());
        assert!(registry.get("postgres").is_none());
        assert_eq!(registry.names(), vec!["null".to_string()]);
    }

    #[test]
    fn test_registry_require_unknown() {
        let registry = DriverRegistry::new();
        let err = registry.require("mysql").err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Driver error: Unknown driver: mysql"));
    }

    #[test]
    fn test_default_query_goes_through_statement() {
        let err = StatementlessConnection.query("SELECT 1", &[]).err().map(|e| e.to_string());
        assert_eq!(err.as_deref(), Some("Not supported: statements"));
    }
}
