//! Execution - data sources and the safety-gated executor

pub mod engine;
pub mod executor;
pub mod postgres_engine;
pub mod result;
pub mod sqlite_engine;

pub use engine::{DataSource, RowSet};
pub use executor::SqlExecutor;
pub use postgres_engine::PostgresSource;
pub use result::{ExecutionResult, Row};
pub use sqlite_engine::SqliteSource;
