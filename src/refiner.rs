//! SQL Refiner
//!
//! Rewrites literal values in a generated query to the stored values the
//! matcher found. Exact matches need no rewrite; when nothing is left to
//! change the query passes through untouched and no call is made.

use crate::conversation::SessionContext;
use crate::error::Result;
use crate::llm::{strip_code_fences, TextGenerator};
use crate::value_matcher::ValueMatch;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// The substitutions that actually require a rewrite
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinementPlan {
    pub replacements: Vec<(String, String)>,
}

impl RefinementPlan {
    /// Drops exact (score 100) matches; keeps input order.
    pub fn from_matches(matches: &[ValueMatch]) -> Self {
        Self {
            replacements: matches
                .iter()
                .filter(|m| !m.is_exact())
                .map(|m| (m.original_value.clone(), m.matched_value.clone()))
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    /// `original -> matched`, one pair per line
    pub fn instructions(&self) -> String {
        self.replacements
            .iter()
            .map(|(from, to)| format!("{} -> {}", from, to))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinedResult {
    pub original_sql: String,
    /// Every match handed in, exact ones included
    pub value_mappings: Vec<ValueMatch>,
    pub refined_sql: String,
}

impl RefinedResult {
    fn unchanged(sql: &str, matches: &[ValueMatch]) -> Self {
        Self {
            original_sql: sql.to_string(),
            value_mappings: matches.to_vec(),
            refined_sql: sql.to_string(),
        }
    }

    pub fn was_rewritten(&self) -> bool {
        self.refined_sql != self.original_sql
    }
}

#[derive(Debug, Clone, Default)]
pub struct SqlRefiner;

impl SqlRefiner {
    pub fn new() -> Self {
        Self
    }

    pub async fn refine(
        &self,
        sql: &str,
        matches: &[ValueMatch],
        llm: &dyn TextGenerator,
        ctx: &mut SessionContext,
    ) -> Result<RefinedResult> {
        let plan = RefinementPlan::from_matches(matches);
        if plan.is_empty() {
            info!("No value rewrites needed ({} exact match(es))", matches.len());
            return Ok(RefinedResult::unchanged(sql, matches));
        }

        let prompt = format!(
            "Return ONLY the modified SQL query with these replacements:\n{}\nQuery: {}",
            plan.instructions(),
            sql
        );
        let refined_sql = strip_code_fences(&llm.generate(&prompt, ctx).await?);

        // The rewrite is trusted as-is; this only flags suspicious output.
        for (_, to) in &plan.replacements {
            if !refined_sql.contains(to.as_str()) {
                warn!("Rewritten SQL does not contain requested value '{}'", to);
            }
        }
        info!("Applied {} value rewrite(s)", plan.replacements.len());

        Ok(RefinedResult {
            original_sql: sql.to_string(),
            value_mappings: matches.to_vec(),
            refined_sql,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::ScriptedGenerator;

    fn value_match(original: &str, matched: &str, score: u8) -> ValueMatch {
        ValueMatch {
            original_value: original.to_string(),
            matched_value: matched.to_string(),
            score,
        }
    }

    #[tokio::test]
    async fn test_empty_matches_pass_through_without_a_call() {
        let llm = ScriptedGenerator::new(Vec::<String>::new());
        let mut ctx = SessionContext::default();
        let sql = "SELECT * FROM t WHERE a = 'x'";
        let result = SqlRefiner::new().refine(sql, &[], &llm, &mut ctx).await.unwrap();
        assert_eq!(result.refined_sql, sql);
        assert!(result.value_mappings.is_empty());
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_exact_matches_are_idempotent() {
        let llm = ScriptedGenerator::new(Vec::<String>::new());
        let mut ctx = SessionContext::default();
        let sql = "SELECT * FROM districts WHERE district_uid = '220'";
        let matches = vec![value_match("220", "220", 100)];
        let result = SqlRefiner::new().refine(sql, &matches, &llm, &mut ctx).await.unwrap();
        assert_eq!(result.refined_sql, sql);
        assert!(!result.was_rewritten());
        assert_eq!(result.value_mappings, matches);
        assert!(llm.prompts().is_empty());
    }

    #[tokio::test]
    async fn test_rewrite_sends_instruction_and_strips_fences() {
        let llm = ScriptedGenerator::new([
            "```sql\nSELECT * FROM Learner WHERE name = 'John Hancock';\n```",
        ]);
        let mut ctx = SessionContext::default();
        let sql = "SELECT * FROM Learner WHERE name = 'John Handcock';";
        let matches = vec![
            value_match("John Handcock", "John Hancock", 96),
            value_match("220", "220", 100),
        ];
        let result = SqlRefiner::new().refine(sql, &matches, &llm, &mut ctx).await.unwrap();

        assert_eq!(result.refined_sql, "SELECT * FROM Learner WHERE name = 'John Hancock';");
        assert_eq!(result.original_sql, sql);
        assert_eq!(result.value_mappings.len(), 2);

        let prompts = llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("John Handcock -> John Hancock\n"));
        assert!(!prompts[0].contains("220 -> 220"));
        assert!(prompts[0].ends_with(&format!("Query: {}", sql)));
    }

    #[tokio::test]
    async fn test_rewrite_failure_propagates() {
        let llm = ScriptedGenerator::failing("timeout");
        let mut ctx = SessionContext::default();
        let matches = vec![value_match("Jon", "John", 86)];
        let result = SqlRefiner::new()
            .refine("SELECT 1 WHERE n = 'Jon'", &matches, &llm, &mut ctx)
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_plan_keeps_order_and_drops_exact() {
        let plan = RefinementPlan::from_matches(&[
            value_match("b", "B1", 80),
            value_match("x", "x", 100),
            value_match("a", "A1", 60),
        ]);
        assert_eq!(plan.instructions(), "b -> B1\na -> A1");
    }
}
