//! Data Source Trait - the contract every tabular store implements.
//!
//! The core never opens or closes a store; a handle is passed in per call
//! and shared read-only by the matcher and the executor within one request.

use crate::error::{Nl2SqlError, Result};
use crate::safety_guardrails::ensure_read_only;
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

lazy_static! {
    static ref IDENTIFIER: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$")
            .expect("identifier pattern is valid");
}

/// Raw tabular output of a statement: column names plus positional rows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl RowSet {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A queryable tabular store (file-based or networked)
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Engine name (e.g. "sqlite", "postgres")
    fn name(&self) -> &'static str;

    /// Run a statement and collect every row in server order
    async fn query(&self, sql: &str) -> Result<RowSet>;

    /// Human-readable schema of every user table
    async fn describe_schema(&self) -> Result<String>;

    /// Distinct non-null values stored in `table.column`, in returned order.
    ///
    /// Always reflects current data; nothing is cached.
    async fn distinct_values(&self, table: &str, column: &str) -> Result<Vec<Value>> {
        let sql = distinct_values_sql(table, column)?;
        ensure_read_only(&sql)?;
        let result = self.query(&sql).await?;
        Ok(result
            .rows
            .into_iter()
            .filter_map(|row| row.into_iter().next())
            .filter(|v| !v.is_null())
            .collect())
    }
}

/// `SELECT DISTINCT` over a validated identifier pair
pub fn distinct_values_sql(table: &str, column: &str) -> Result<String> {
    for ident in [table, column] {
        if !IDENTIFIER.is_match(ident) {
            return Err(Nl2SqlError::Validation(format!(
                "Invalid identifier: '{}'",
                ident
            )));
        }
    }
    Ok(format!("SELECT DISTINCT {} FROM {}", column, table))
}

/// Textual form of a stored value, as used for fuzzy comparison
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
