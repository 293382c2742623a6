//! Pipeline: Generator -> Extractor -> Matcher x N -> Refiner -> Executor -> Analyzer
//!
//! Stages run strictly one after another. Entities are matched in the
//! order the extractor returned them, so the mapping list is deterministic.

use crate::analyzer::{Analysis, SqlAnalyzer};
use crate::conversation::SessionContext;
use crate::entity_extractor::{EntityExtractor, Extraction};
use crate::error::Result;
use crate::execution::engine::DataSource;
use crate::execution::executor::SqlExecutor;
use crate::execution::result::ExecutionResult;
use crate::generator::SqlGenerator;
use crate::llm::TextGenerator;
use crate::refiner::{RefinedResult, SqlRefiner};
use crate::value_matcher::{ValueMatch, ValueMatcher};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

/// Output of the correction stages only
#[derive(Debug, Clone, Serialize)]
pub struct Correction {
    pub extraction: Extraction,
    pub matches: Vec<ValueMatch>,
    pub refinement: RefinedResult,
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub request_id: Uuid,
    pub question: String,
    pub generated_sql: String,
    pub correction: Correction,
    pub execution: ExecutionResult,
    /// Skipped when execution failed or analysis is disabled
    pub analysis: Option<Analysis>,
}

impl PipelineReport {
    pub fn final_sql(&self) -> &str {
        &self.correction.refinement.refined_sql
    }
}

pub struct Pipeline {
    llm: Arc<dyn TextGenerator>,
    generator: SqlGenerator,
    extractor: EntityExtractor,
    matcher: ValueMatcher,
    refiner: SqlRefiner,
    executor: SqlExecutor,
    analyzer: Option<SqlAnalyzer>,
}

impl Pipeline {
    pub fn new(llm: Arc<dyn TextGenerator>) -> Self {
        Self {
            llm,
            generator: SqlGenerator::new(),
            extractor: EntityExtractor::new(),
            matcher: ValueMatcher::new(),
            refiner: SqlRefiner::new(),
            executor: SqlExecutor::default(),
            analyzer: Some(SqlAnalyzer::new()),
        }
    }

    pub fn with_executor(mut self, executor: SqlExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn without_analysis(mut self) -> Self {
        self.analyzer = None;
        self
    }

    /// Full run for one question. Generation or rewrite failures abort with
    /// `Err`; a failed execution is reported and analysis is skipped.
    pub async fn run(
        &self,
        question: &str,
        schema: &str,
        source: &dyn DataSource,
        ctx: &mut SessionContext,
    ) -> Result<PipelineReport> {
        let request_id = Uuid::new_v4();
        let span = info_span!("pipeline", %request_id);
        self.run_stages(request_id, question, schema, source, ctx)
            .instrument(span)
            .await
    }

    async fn run_stages(
        &self,
        request_id: Uuid,
        question: &str,
        schema: &str,
        source: &dyn DataSource,
        ctx: &mut SessionContext,
    ) -> Result<PipelineReport> {
        info!("Question: {}", question);
        let generated = self
            .generator
            .generate(question, schema, self.llm.as_ref(), ctx)
            .await?;

        let correction = self.correct(&generated.sql, source, ctx).await?;
        let execution = self
            .executor
            .execute(&correction.refinement.refined_sql, source)
            .await;

        let analysis = match (&self.analyzer, execution.success) {
            (Some(analyzer), true) => Some(
                analyzer
                    .analyze(question, &execution.rows, self.llm.as_ref(), ctx)
                    .await?,
            ),
            (_, false) => {
                warn!(
                    "Execution failed, skipping analysis: {}",
                    execution.error.as_deref().unwrap_or_default()
                );
                None
            }
            (None, true) => None,
        };

        Ok(PipelineReport {
            request_id,
            question: question.to_string(),
            generated_sql: generated.sql,
            correction,
            execution,
            analysis,
        })
    }

    /// Extractor -> Matcher x N -> Refiner on an existing query
    pub async fn correct(
        &self,
        sql: &str,
        source: &dyn DataSource,
        ctx: &mut SessionContext,
    ) -> Result<Correction> {
        let extraction = self.extractor.extract(sql, self.llm.as_ref(), ctx).await;

        let mut matches = Vec::with_capacity(extraction.entities.len());
        for entity in &extraction.entities {
            if let Some(m) = self.matcher.match_entity(entity, source).await {
                matches.push(m);
            }
        }
        info!(
            "{} of {} entit(ies) matched stored values",
            matches.len(),
            extraction.entities.len()
        );

        let refinement = self
            .refiner
            .refine(sql, &matches, self.llm.as_ref(), ctx)
            .await?;

        Ok(Correction {
            extraction,
            matches,
            refinement,
        })
    }
}
