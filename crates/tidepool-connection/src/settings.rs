//! Data source settings loaded from TOML
//!
//! ```toml
//! driver = "postgres"
//! url = "postgres://localhost/app"
//! username = "app"
//! password = "secret"
//! auto_commit = false
//! transaction_isolation = "read_committed"
//!
//! [properties]
//! application_name = "billing"
//!
//! [pool]
//! max_active = 20
//! max_idle = 5
//! ping_enabled = true
//! ping_query = "SELECT 1"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tidepool_core::{DriverProperties, Result, TidepoolError, TransactionIsolation};

use crate::pool::PoolConfig;

/// Everything needed to build a [`PooledDataSource`](crate::PooledDataSource)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceSettings {
    /// Registry name of the driver (postgres, sqlite, mysql, etc.)
    pub driver: String,

    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_auto_commit")]
    pub auto_commit: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_isolation: Option<TransactionIsolation>,

    /// Extra properties passed to the driver on every open
    #[serde(default)]
    pub properties: DriverProperties,

    #[serde(default)]
    pub pool: PoolConfig,
}

fn default_auto_commit() -> bool {
    true
}

impl DataSourceSettings {
    pub fn new(driver: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            url: url.into(),
            username: None,
            password: None,
            auto_commit: default_auto_commit(),
            transaction_isolation: None,
            properties: DriverProperties::new(),
            pool: PoolConfig::default(),
        }
    }

    /// Parse settings from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            TidepoolError::Configuration(format!("Failed to parse data source settings: {e}"))
        })
    }

    /// Read and parse a TOML settings file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading data source settings");
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            TidepoolError::Configuration(format!("Failed to serialize data source settings: {e}"))
        })
    }
}

impl std::fmt::Debug for DataSourceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DataSourceSettings")
            .field("driver", &self.driver)
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("auto_commit", &self.auto_commit)
            .field("transaction_isolation", &self.transaction_isolation)
            .field("properties", &self.properties)
            .field("pool", &self.pool)
            .finish()
    }
}
