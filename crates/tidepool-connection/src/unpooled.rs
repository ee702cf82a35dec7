//! Non-pooled data source
//!
//! Opens a brand new physical connection on every request and applies the
//! configured session defaults to it. The pool uses this as its connection
//! factory.

use std::fmt;
use std::sync::Arc;

use tidepool_core::{
    Connection, Driver, DriverProperties, PASSWORD_PROPERTY, Result, TransactionIsolation,
    USER_PROPERTY,
};

/// Connection target and session defaults for opening physical connections
#[derive(Clone)]
pub struct UnpooledDataSource {
    driver: Arc<dyn Driver>,
    url: String,
    username: Option<String>,
    password: Option<String>,
    driver_properties: DriverProperties,
    auto_commit: bool,
    default_transaction_isolation: Option<TransactionIsolation>,
}

impl UnpooledDataSource {
    /// Create a data source for `url` opened through `driver`
    pub fn new(driver: Arc<dyn Driver>, url: impl Into<String>) -> Self {
        Self {
            driver,
            url: url.into(),
            username: None,
            password: None,
            driver_properties: DriverProperties::new(),
            auto_commit: true,
            default_transaction_isolation: None,
        }
    }

    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    pub fn with_auto_commit(mut self, auto_commit: bool) -> Self {
        self.auto_commit = auto_commit;
        self
    }

    pub fn with_transaction_isolation(mut self, level: TransactionIsolation) -> Self {
        self.default_transaction_isolation = Some(level);
        self
    }

    pub fn with_driver_properties(mut self, properties: DriverProperties) -> Self {
        self.driver_properties = properties;
        self
    }

    /// Open a connection with the configured credentials
    pub fn open_default(&self) -> Result<Arc<dyn Connection>> {
        self.open(self.username.as_deref(), self.password.as_deref())
    }

    /// Open a connection with explicit credentials.
    ///
    /// Credentials are merged over the configured driver properties, then the
    /// auto-commit and isolation defaults are applied where the connection
    /// differs from them.
    pub fn open(&self, username: Option<&str>, password: Option<&str>) -> Result<Arc<dyn Connection>> {
        let mut properties = self.driver_properties.clone();
        if let Some(username) = username {
            properties.insert(USER_PROPERTY.to_string(), username.to_string());
        }
        if let Some(password) = password {
            properties.insert(PASSWORD_PROPERTY.to_string(), password.to_string());
        }

        let connection = self.driver.open(&self.url, &properties)?;
        if let Err(e) = self.configure(connection.as_ref()) {
            tracing::debug!(error = %e, "failed to apply session defaults, closing connection");
            if let Err(close_err) = connection.close() {
                tracing::debug!(error = %close_err, "close failed");
            }
            return Err(e);
        }
        Ok(connection)
    }

    fn configure(&self, connection: &dyn Connection) -> Result<()> {
        if connection.auto_commit()? != self.auto_commit {
            connection.set_auto_commit(self.auto_commit)?;
        }
        if let Some(level) = self.default_transaction_isolation {
            if connection.transaction_isolation()? != Some(level) {
                connection.set_transaction_isolation(level)?;
            }
        }
        Ok(())
    }

    pub fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> Option<&str> {
        self.username.as_deref()
    }

    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    pub fn driver_properties(&self) -> &DriverProperties {
        &self.driver_properties
    }

    pub fn auto_commit(&self) -> bool {
        self.auto_commit
    }

    pub fn default_transaction_isolation(&self) -> Option<TransactionIsolation> {
        self.default_transaction_isolation
    }

    pub(crate) fn set_driver(&mut self, driver: Arc<dyn Driver>) {
        self.driver = driver;
    }

    pub(crate) fn set_url(&mut self, url: String) {
        self.url = url;
    }

    pub(crate) fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub(crate) fn set_password(&mut self, password: Option<String>) {
        self.password = password;
    }

    pub(crate) fn set_driver_properties(&mut self, properties: DriverProperties) {
        self.driver_properties = properties;
    }

    pub(crate) fn set_auto_commit(&mut self, auto_commit: bool) {
        self.auto_commit = auto_commit;
    }

    pub(crate) fn set_default_transaction_isolation(&mut self, level: Option<TransactionIsolation>) {
        self.default_transaction_isolation = level;
    }
}

impl fmt::Debug for UnpooledDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnpooledDataSource")
            .field("driver", &self.driver.name())
            .field("url", &self.url)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("auto_commit", &self.auto_commit)
            .field(
                "default_transaction_isolation",
                &self.default_transaction_isolation,
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tidepool_core::{Statement, TidepoolError};

    struct SessionConnection {
        auto_commit: AtomicBool,
        isolation: Mutex<Option<TransactionIsolation>>,
        isolation_changes: Mutex<Vec<TransactionIsolation>>,
        reject_isolation: bool,
        reject_close: bool,
        closed: AtomicBool,
    }

    impl Connection for SessionConnection {
        fn driver_name(&self) -> &str {
            "session"
        }

        fn create_statement(&self) -> Result<Box<dyn Statement>> {
            Err(TidepoolError::NotSupported("statements".into()))
        }

        fn auto_commit(&self) -> Result<bool> {
            Ok(self.auto_commit.load(Ordering::SeqCst))
        }

        fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
            self.auto_commit.store(auto_commit, Ordering::SeqCst);
            Ok(())
        }

        fn transaction_isolation(&self) -> Result<Option<TransactionIsolation>> {
            Ok(*self.isolation.lock())
        }

        fn set_transaction_isolation(&self, level: TransactionIsolation) -> Result<()> {
            if self.reject_isolation {
                return Err(TidepoolError::Driver("isolation not supported".into()));
            }
            *self.isolation.lock() = Some(level);
            self.isolation_changes.lock().push(level);
            Ok(())
        }

        fn commit(&self) -> Result<()> {
            Ok(())
        }

        fn rollback(&self) -> Result<()> {
            Ok(())
        }

        fn close(&self) -> Result<()> {
            if self.reject_close {
                return Err(TidepoolError::Connection("close refused".into()));
            }
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct SessionDriver {
        reject_isolation: bool,
        reject_close: bool,
        opened: Mutex<Vec<(String, DriverProperties, Arc<SessionConnection>)>>,
    }

    impl Driver for SessionDriver {
        fn name(&self) -> &str {
            "session"
        }

        fn open(&self, url: &str, properties: &DriverProperties) -> Result<Arc<dyn Connection>> {
            let conn = Arc::new(SessionConnection {
                auto_commit: AtomicBool::new(true),
                isolation: Mutex::new(Some(TransactionIsolation::ReadCommitted)),
                isolation_changes: Mutex::new(Vec::new()),
                reject_isolation: self.reject_isolation,
                reject_close: self.reject_close,
                closed: AtomicBool::new(false),
            });
            self.opened
                .lock()
                .push((url.to_string(), properties.clone(), Arc::clone(&conn)));
            Ok(conn)
        }
    }

    fn last_opened(driver: &SessionDriver) -> (String, DriverProperties, Arc<SessionConnection>) {
        driver.opened.lock().last().cloned().expect("nothing opened")
    }

    #[test]
    fn test_open_merges_credentials_into_properties() {
        let driver = Arc::new(SessionDriver::default());
        let mut properties = DriverProperties::new();
        properties.insert("sslmode".into(), "require".into());
        properties.insert(USER_PROPERTY.into(), "ignored".into());

        let source = UnpooledDataSource::new(driver.clone(), "session://db")
            .with_credentials("app", "secret")
            .with_driver_properties(properties);
        source.open_default().unwrap();

        let (url, opened_with, _) = last_opened(&driver);
        assert_eq!(url, "session://db");
        assert_eq!(opened_with.get("sslmode").map(String::as_str), Some("require"));
        assert_eq!(opened_with.get(USER_PROPERTY).map(String::as_str), Some("app"));
        assert_eq!(opened_with.get(PASSWORD_PROPERTY).map(String::as_str), Some("secret"));
        // configured properties are not modified
        assert_eq!(
            source.driver_properties().get(USER_PROPERTY).map(String::as_str),
            Some("ignored")
        );
    }

    #[test]
    fn test_open_without_credentials() {
        let driver = Arc::new(SessionDriver::default());
        let source = UnpooledDataSource::new(driver.clone(), "session://db");

        source.open(None, None).unwrap();

        let (_, opened_with, _) = last_opened(&driver);
        assert!(opened_with.is_empty());
    }

    #[test]
    fn test_session_defaults_only_applied_when_different() {
        let driver = Arc::new(SessionDriver::default());
        let source = UnpooledDataSource::new(driver.clone(), "session://db")
            .with_auto_commit(false)
            .with_transaction_isolation(TransactionIsolation::ReadCommitted);

        let conn = source.open_default().unwrap();

        assert!(!conn.auto_commit().unwrap());
        let (_, _, physical) = last_opened(&driver);
        assert!(physical.isolation_changes.lock().is_empty());

        let source = source.with_transaction_isolation(TransactionIsolation::Serializable);
        source.open_default().unwrap();
        let (_, _, physical) = last_opened(&driver);
        assert_eq!(
            *physical.isolation_changes.lock(),
            vec![TransactionIsolation::Serializable]
        );
    }

    #[test]
    fn test_failed_session_setup_closes_connection() {
        let driver = Arc::new(SessionDriver {
            reject_isolation: true,
            ..Default::default()
        });
        let source = UnpooledDataSource::new(driver.clone(), "session://db")
            .with_transaction_isolation(TransactionIsolation::Serializable);

        let err = match source.open_default() {
            Ok(_) => panic!("session setup should fail"),
            Err(e) => e,
        };

        assert!(matches!(err, TidepoolError::Driver(_)));
        let (_, _, physical) = last_opened(&driver);
        assert!(physical.is_closed());
    }

    #[test]
    fn test_debug_redacts_password() {
        let source = UnpooledDataSource::new(Arc::new(SessionDriver::default()), "session://db")
            .with_credentials("app", "secret");

        let rendered = format!("{source:?}");
        assert!(rendered.contains("app"));
        assert!(!rendered.contains("secret"));
    }

    #[test]
    fn test_failed_close_after_setup_error_keeps_setup_error() {
        let driver = Arc::new(SessionDriver {
            reject_isolation: true,
            reject_close: true,
            ..Default::default()
        });
        let source = UnpooledDataSource::new(driver, "session://db")
            .with_transaction_isolation(TransactionIsolation::Serializable);

        match source.open_default() {
            Ok(_) => panic!("session setup should fail"),
            Err(e) => assert!(matches!(e, TidepoolError::Driver(_))),
        }
    }
}
