pub mod analyzer;
pub mod config;
pub mod conversation;
pub mod db;
pub mod entity_extractor;
pub mod error;
pub mod execution;
pub mod fuzzy_matcher;
pub mod generator;
pub mod llm;
pub mod pipeline;
pub mod refiner;
pub mod safety_guardrails;
pub mod schema;
pub mod value_matcher;

#[cfg(test)]
pub(crate) mod test_support;

pub use conversation::SessionContext;
pub use entity_extractor::{EntityExtractor, ExtractedEntity, Extraction, ExtractionOutcome};
pub use error::{Nl2SqlError, Result};
pub use execution::{DataSource, ExecutionResult, PostgresSource, SqlExecutor, SqliteSource};
pub use llm::{LlmClient, TextGenerator};
pub use pipeline::{Pipeline, PipelineReport};
pub use refiner::{RefinedResult, RefinementPlan, SqlRefiner};
pub use value_matcher::{MatchOutcome, ValueMatch, ValueMatcher};
