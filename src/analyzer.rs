//! Narrative analysis of executed rows (opaque text-generation call)

use crate::conversation::SessionContext;
use crate::error::Result;
use crate::execution::result::Row;
use crate::llm::TextGenerator;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analysis {
    pub question: String,
    pub record_count: usize,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct SqlAnalyzer;

impl SqlAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub async fn analyze(
        &self,
        question: &str,
        rows: &[Row],
        llm: &dyn TextGenerator,
        ctx: &mut SessionContext,
    ) -> Result<Analysis> {
        let prompt = if rows.is_empty() {
            format!(
                r#"Analyze the following query and provide insights:
"{}"

Provide a comprehensive analysis including:
1. Query intent and objectives
2. Key information requirements
3. Potential data points of interest
4. Suggested approach for data retrieval"#,
                question
            )
        } else {
            format!(
                r#"Analyze the following data based on the query:
"{}"

Data (list of records):
{}

Provide a comprehensive analysis including:
1. Key findings and patterns
2. Notable relationships between metrics
3. Important trends or anomalies
4. Actionable insights and recommendations"#,
                question,
                serde_json::to_string(rows)?
            )
        };

        let text = llm.generate(&prompt, ctx).await?;
        Ok(Analysis {
            question: question.to_string(),
            record_count: rows.len(),
            text,
        })
    }
}
