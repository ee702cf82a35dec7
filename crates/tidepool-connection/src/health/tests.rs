//! Tests for the health module

use super::*;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tidepool_core::{Connection, QueryResult, Result, Statement, TidepoolError, Value};

#[derive(Default)]
struct ProbeLog {
    queries: Mutex<Vec<String>>,
    statements_closed: AtomicUsize,
}

struct ProbeStatement {
    log: Arc<ProbeLog>,
    fail: bool,
}

impl Statement for ProbeStatement {
    fn execute_query(&mut self, sql: &str, _params: &[Value]) -> Result<QueryResult> {
        self.log.queries.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err(TidepoolError::Query("relation does not exist".into()));
        }
        Ok(QueryResult::empty())
    }

    fn execute_update(&mut self, _sql: &str, _params: &[Value]) -> Result<u64> {
        Ok(0)
    }

    fn close(self: Box<Self>) -> Result<()> {
        self.log.statements_closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct ProbeConnection {
    log: Arc<ProbeLog>,
    closed: AtomicBool,
    auto_commit: AtomicBool,
    fail_queries: bool,
    rollbacks: AtomicUsize,
}

impl ProbeConnection {
    fn new(auto_commit: bool, fail_queries: bool) -> Self {
        Self {
            log: Arc::new(ProbeLog::default()),
            closed: AtomicBool::new(false),
            auto_commit: AtomicBool::new(auto_commit),
            fail_queries,
            rollbacks: AtomicUsize::new(0),
        }
    }
}

impl Connection for ProbeConnection {
    fn driver_name(&self) -> &str {
        "probe"
    }

    fn create_statement(&self) -> Result<Box<dyn Statement>> {
        Ok(Box::new(ProbeStatement {
            log: Arc::clone(&self.log),
            fail: self.fail_queries,
        }))
    }

    fn auto_commit(&self) -> Result<bool> {
        Ok(self.auto_commit.load(Ordering::SeqCst))
    }

    fn set_auto_commit(&self, auto_commit: bool) -> Result<()> {
        self.auto_commit.store(auto_commit, Ordering::SeqCst);
        Ok(())
    }

    fn transaction_isolation(&self) -> Result<Option<tidepool_core::TransactionIsolation>> {
        Ok(None)
    }

    fn set_transaction_isolation(&self, _level: tidepool_core::TransactionIsolation) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

mod ping_tests {
    use super::*;

    #[test]
    fn test_ping_runs_query_and_closes_statement() {
        let conn = ProbeConnection::new(true, false);

        let latency = ping_connection(&conn, "SELECT 1");

        assert!(latency.is_ok());
        assert_eq!(*conn.log.queries.lock().unwrap(), vec!["SELECT 1".to_string()]);
        assert_eq!(conn.log.statements_closed.load(Ordering::SeqCst), 1);
        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_ping_rolls_back_without_auto_commit() {
        let conn = ProbeConnection::new(false, false);

        ping_connection(&conn, "SELECT 1").unwrap();

        assert_eq!(conn.rollbacks.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_ping_closed_connection() {
        let conn = ProbeConnection::new(true, false);
        conn.close().unwrap();

        let result = ping_connection(&conn, "SELECT 1");

        assert!(matches!(result, Err(PingError::ConnectionClosed)));
        assert!(conn.log.queries.lock().unwrap().is_empty());
    }

    #[test]
    fn test_ping_query_failure() {
        let conn = ProbeConnection::new(true, true);

        let result = ping_connection(&conn, "SELECT * FROM missing");

        match result {
            Err(PingError::QueryFailed(message)) => {
                assert!(message.contains("relation does not exist"));
            }
            other => panic!("expected QueryFailed, got {other:?}"),
        }
        // statement is still closed when the query fails
        assert_eq!(conn.log.statements_closed.load(Ordering::SeqCst), 1);
    }
}

mod error_tests {
    use super::*;

    #[test]
    fn test_ping_error_display() {
        assert_eq!(PingError::ConnectionClosed.to_string(), "Connection is closed");
        assert_eq!(
            PingError::QueryFailed("timeout".into()).to_string(),
            "Ping query failed: timeout"
        );
    }
}
