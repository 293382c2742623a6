//! Safety-gated SQL executor.
//!
//! Validation always runs first; a rejected statement never reaches the
//! data source. Any failure after that is folded into the returned
//! `ExecutionResult` instead of being raised.

use crate::config::ExecutorConfig;
use crate::execution::engine::DataSource;
use crate::execution::result::ExecutionResult;
use crate::safety_guardrails::{is_read_only, READ_ONLY_VIOLATION};
use std::time::Instant;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct SqlExecutor {
    config: ExecutorConfig,
}

impl SqlExecutor {
    pub fn new(config: ExecutorConfig) -> Self {
        Self { config }
    }

    pub async fn execute(&self, sql: &str, source: &dyn DataSource) -> ExecutionResult {
        if !is_read_only(sql) {
            warn!("Refusing to execute non read-only SQL");
            return ExecutionResult::failure(READ_ONLY_VIOLATION);
        }

        let start = Instant::now();
        let outcome = match self.config.query_timeout {
            Some(limit) => match tokio::time::timeout(limit, source.query(sql)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!("Query timed out after {:?}", limit);
                    return ExecutionResult::failure(format!("Query timed out after {:?}", limit));
                }
            },
            None => source.query(sql).await,
        };

        match outcome {
            Ok(set) => {
                let result = ExecutionResult::from_row_set(set);
                info!(
                    "Executed on {} in {}ms, {} row(s)",
                    source.name(),
                    start.elapsed().as_millis(),
                    result.row_count()
                );
                result
            }
            Err(e) => {
                warn!("Execution failed on {}: {}", source.name(), e);
                ExecutionResult::failure(e.to_string())
            }
        }
    }
}
