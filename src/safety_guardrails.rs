//! Read-only Guardrail
//!
//! Every statement that reaches a data source passes through here first.
//! A query is read-only iff its first token is not a blocked command and no
//! blocked command appears anywhere in it as a whole word.

use crate::error::{Nl2SqlError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

pub const BLOCKED_COMMANDS: [&str; 11] = [
    "insert", "update", "delete", "drop", "create", "alter", "truncate", "grant", "revoke",
    "commit", "rollback",
];

pub const READ_ONLY_VIOLATION: &str = "Only SELECT queries are allowed for security reasons";

lazy_static! {
    static ref BLOCKED_WORD: Regex = Regex::new(&format!(
        r"\b(?:{})\b",
        BLOCKED_COMMANDS.join("|")
    ))
    .expect("blocked command pattern is valid");
}

pub fn is_read_only(sql: &str) -> bool {
    let query = sql.trim_start().to_lowercase();

    let first_word = query.split_whitespace().next().unwrap_or("");
    if BLOCKED_COMMANDS.contains(&first_word) {
        return false;
    }

    !BLOCKED_WORD.is_match(&query)
}

/// Fails with a fixed message when `sql` is not read-only.
pub fn ensure_read_only(sql: &str) -> Result<()> {
    if is_read_only(sql) {
        Ok(())
    } else {
        warn!("Rejected non read-only query");
        Err(Nl2SqlError::Validation(READ_ONLY_VIOLATION.to_string()))
    }
}
