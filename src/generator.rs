//! Query Generator: schema + natural-language question -> candidate SQL

use crate::conversation::SessionContext;
use crate::error::{Nl2SqlError, Result};
use crate::llm::{strip_code_fences, TextGenerator};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedSql {
    pub question: String,
    pub sql: String,
}

#[derive(Debug, Clone, Default)]
pub struct SqlGenerator;

impl SqlGenerator {
    pub fn new() -> Self {
        Self
    }

    pub async fn generate(
        &self,
        question: &str,
        schema: &str,
        llm: &dyn TextGenerator,
        ctx: &mut SessionContext,
    ) -> Result<GeneratedSql> {
        let prompt = generation_prompt(question, schema);
        let sql = strip_code_fences(&llm.generate(&prompt, ctx).await?);
        if sql.is_empty() {
            return Err(Nl2SqlError::Llm("Generator returned no SQL".to_string()));
        }
        info!("Generated SQL: {}", sql);
        Ok(GeneratedSql {
            question: question.to_string(),
            sql,
        })
    }
}

fn generation_prompt(question: &str, schema: &str) -> String {
    format!(
        r#"Given these tables and columns (Schema):
{schema}

Generate a single SQL query for this request:
{question}

CRITICAL NOTE:
- Table and column names must match the schema exactly, including casing.
- Do not reference columns that the schema does not define for that table.
- Respect column data types; compare values of consistent types.
- Do not use a subquery as an expression if it can return more than one row.
- Never use reserved SQL keywords as aliases (is, as, by, on, in, to, for, from, where, select, group, order, having, join, left, right, inner, outer, cross, natural, using, with).
- Use descriptive, unique aliases; short table names may be used without an alias.

Requirements:
- Return ONLY the raw SQL query text, no markdown formatting
- No explanations or additional text
- Use JOINs, subqueries or aggregations only as the request needs
- The query must be complete and executable"#
    )
}
