//! Values passed to statements and the rows they return

use serde::{Deserialize, Serialize};

/// A statement parameter or a column value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    String(String),
}

/// One row of a query result, in column order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    pub values: Vec<Value>,
}

/// Rows returned by a query
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl QueryResult {
    /// A result with no columns and no rows
    pub fn empty() -> Self {
        Self::default()
    }
}
