//! Entity Extractor
//!
//! Asks the text-generation collaborator for the literal comparisons in a
//! query's filtering clauses, one `table|column|value` record per line, and
//! keeps only records that survive validation. A bad response never becomes
//! an error: it degrades to fewer (or zero) entities.

use crate::conversation::SessionContext;
use crate::llm::TextGenerator;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Words whose presence marks the whole response as commentary, not records
const REJECTION_MARKERS: [&str; 5] = ["error", "no entities", "not found", "invalid", "cannot"];

const NOT_ALIASES: [&str; 22] = [
    "where", "join", "inner", "left", "right", "full", "cross", "outer", "natural", "on",
    "using", "group", "order", "having", "limit", "offset", "union", "intersect", "except",
    "window", "lateral", "as",
];

lazy_static! {
    static ref CTE_NAME: Regex =
        Regex::new(r"(?i)(?:\bwith\s+(?:recursive\s+)?|,\s*)([A-Za-z_][A-Za-z0-9_]*)\s+as\s*\(")
            .expect("cte pattern is valid");
    static ref TABLE_REF: Regex = Regex::new(
        r"(?i)\b(?:from|join)\s+([A-Za-z_][A-Za-z0-9_.]*)(?:\s+(?:as\s+)?([A-Za-z_][A-Za-z0-9_]*))?"
    )
    .expect("table reference pattern is valid");
    static ref DATE_LITERAL: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$")
            .expect("date pattern is valid");
    static ref AGGREGATE_CALL: Regex = Regex::new(r"(?i)^\s*(?:count|sum|avg|min|max)\s*\(")
        .expect("aggregate pattern is valid");
}

/// A candidate WHERE-clause literal comparison
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractedEntity {
    pub table: String,
    pub column: String,
    pub value: String,
}

impl ExtractedEntity {
    pub fn new(table: impl Into<String>, column: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            value: value.into(),
        }
    }
}

/// Why an extraction produced what it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtractionOutcome {
    /// At least one valid entity
    Found,
    /// The response held no valid record
    NoneFound,
    /// The response was commentary (error words, explanations)
    Rejected,
    /// The text-generation call itself failed
    CallFailed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extraction {
    pub entities: Vec<ExtractedEntity>,
    pub outcome: ExtractionOutcome,
}

impl Extraction {
    fn empty(outcome: ExtractionOutcome) -> Self {
        Self {
            entities: Vec::new(),
            outcome,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntityExtractor;

impl EntityExtractor {
    pub fn new() -> Self {
        Self
    }

    pub async fn extract(
        &self,
        sql: &str,
        llm: &dyn TextGenerator,
        ctx: &mut SessionContext,
    ) -> Extraction {
        let prompt = format!("{}\n\nQuery: {}", EXTRACTION_PROMPT, sql);
        let response = match llm.generate(&prompt, ctx).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Entity extraction call failed: {}", e);
                return Extraction::empty(ExtractionOutcome::CallFailed(e.to_string()));
            }
        };

        if is_rejection(&response) {
            debug!("Extraction response rejected as commentary");
            return Extraction::empty(ExtractionOutcome::Rejected);
        }

        let names = QueryNames::collect(sql);
        let entities: Vec<ExtractedEntity> = parse_entities(&response)
            .into_iter()
            .filter(|entity| match discard_reason(entity, &names) {
                Some(reason) => {
                    debug!("Discarding entity {:?}: {}", entity, reason);
                    false
                }
                None => true,
            })
            .collect();

        info!("Extracted {} entit(ies)", entities.len());
        if entities.is_empty() {
            Extraction::empty(ExtractionOutcome::NoneFound)
        } else {
            Extraction {
                entities,
                outcome: ExtractionOutcome::Found,
            }
        }
    }
}

/// Parse `table|column|value` lines; anything else is dropped silently.
pub fn parse_entities(response: &str) -> Vec<ExtractedEntity> {
    response
        .lines()
        .filter_map(|line| {
            let parts: Vec<&str> = line.trim().split('|').map(str::trim).collect();
            match parts.as_slice() {
                [table, column, value]
                    if !table.is_empty() && !column.is_empty() && !value.is_empty() =>
                {
                    Some(ExtractedEntity::new(*table, *column, *value))
                }
                _ => None,
            }
        })
        .collect()
}

fn is_rejection(response: &str) -> bool {
    let lower = response.to_lowercase();
    REJECTION_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// CTE names and table aliases declared by a query, lowercased
#[derive(Debug, Default)]
struct QueryNames {
    ctes: HashSet<String>,
    aliases: HashSet<String>,
}

impl QueryNames {
    fn collect(sql: &str) -> Self {
        let ctes: HashSet<String> = CTE_NAME
            .captures_iter(sql)
            .map(|c| c[1].to_lowercase())
            .collect();

        let mut tables = HashSet::new();
        let mut aliases = HashSet::new();
        for caps in TABLE_REF.captures_iter(sql) {
            tables.insert(caps[1].to_lowercase());
            if let Some(alias) = caps.get(2) {
                let alias = alias.as_str().to_lowercase();
                if !NOT_ALIASES.contains(&alias.as_str()) {
                    aliases.insert(alias);
                }
            }
        }
        aliases.retain(|a| !tables.contains(a));

        Self { ctes, aliases }
    }
}

fn discard_reason(entity: &ExtractedEntity, names: &QueryNames) -> Option<&'static str> {
    let value = entity.value.trim_matches(|c| c == '\'' || c == '"');
    let table = entity.table.to_lowercase();

    if value.eq_ignore_ascii_case("null") {
        Some("null comparison")
    } else if DATE_LITERAL.is_match(value) {
        Some("date literal")
    } else if value.starts_with(['=', '<', '>', '!']) {
        Some("operator comparison")
    } else if AGGREGATE_CALL.is_match(&entity.column) || AGGREGATE_CALL.is_match(value) {
        Some("aggregate")
    } else if names.ctes.contains(&table) {
        Some("CTE used as table")
    } else if names.aliases.contains(&table) {
        Some("alias used as table")
    } else {
        None
    }
}

const EXTRACTION_PROMPT: &str = r#"You extract filter entities from SQL. Output format, one per line:
table_name|column_name|comparison_value

How to read the query:
- Real tables only. WITH-clause CTEs, subqueries and views are temporary and never count as tables.
- Table aliases (e.g. 'p', 't1') are shortcuts: resolve every alias to its real table name (p.name -> Program.name).
- Follow JOINs to the table a column really comes from. Computed or derived columns are not data.

Output a record only when ALL of these hold:
- the table is a real database table, not a CTE, view, alias or intermediate join
- the column is a real stored column (names, descriptions, ids, ...), not computed, aggregated or transformed
- the column is compared in a WHERE condition; columns that only appear in SELECT do not count
- the value is a specific literal (numbers allowed), not NULL, not a date such as 2025-01-01,
  not a range comparison (>, <, >=, <=), not a logical condition (AND, OR, NOT),
  not a pattern or set match (LIKE, IN)

Valid:
Program|name|John Smith
Student|email|alice@example.com
district|id|30

Never output:
pm|count|5                      (CTE as table)
p|name|NULL                     (alias and NULL)
Program|enrolled_learners|>0    (range comparison)
Program|avg_completion_time|3.5 (computed column)
course|date|2025-01-01          (date)

If nothing qualifies, output nothing at all: no blank lines, no explanations.
Any output other than table_name|column_name|comparison_value lines is an error."#;
