//! Execution Result - outcome of running one SQL string

use crate::execution::engine::{value_to_text, RowSet};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

/// One result row: column name -> value, in server column order
pub type Row = Map<String, Value>;

pub const NO_RESULTS: &str = "No results found";

/// Success and error are mutually exclusive; use the constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,

    /// Empty (not absent) when the query legitimately returned no rows
    pub rows: Vec<Row>,

    /// Fixed-width text rendering of `rows`
    pub formatted: String,

    pub error: Option<String>,
}

impl ExecutionResult {
    pub fn success(rows: Vec<Row>) -> Self {
        let formatted = format_rows(&rows);
        Self {
            success: true,
            rows,
            formatted,
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            formatted: String::new(),
            error: Some(error.into()),
        }
    }

    pub fn from_row_set(set: RowSet) -> Self {
        Self::success(zip_rows(set))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Zip column names onto positional rows, keeping row and column order.
///
/// Repeated output names (`SELECT d.name, b.name`) are suffixed `_2`, `_3`, ...
/// so no column is lost from the row map.
pub fn zip_rows(set: RowSet) -> Vec<Row> {
    let RowSet { columns, rows } = set;
    let columns = unique_columns(columns);
    rows.into_iter()
        .map(|values| columns.iter().cloned().zip(values).collect())
        .collect()
}

fn unique_columns(columns: Vec<String>) -> Vec<String> {
    // first occurrences keep their name; later ones never take an existing name
    let originals: HashSet<String> = columns.iter().cloned().collect();
    let mut taken: HashSet<String> = HashSet::with_capacity(columns.len());
    columns
        .into_iter()
        .map(|name| {
            if taken.insert(name.clone()) {
                return name;
            }
            let mut n = 2;
            let mut candidate = format!("{}_{}", name, n);
            while taken.contains(&candidate) || originals.contains(&candidate) {
                n += 1;
                candidate = format!("{}_{}", name, n);
            }
            taken.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// Header, dashed separator, then one line per row; columns joined by " | ".
///
/// Column width is the longest of the header and every cell in that column.
pub fn format_rows(rows: &[Row]) -> String {
    let Some(first) = rows.first() else {
        return NO_RESULTS.to_string();
    };
    let columns: Vec<&String> = first.keys().collect();

    let cell = |row: &Row, col: &str| -> String {
        match row.get(col) {
            Some(Value::Null) => "None".to_string(),
            Some(v) => value_to_text(v),
            None => String::new(),
        }
    };

    let widths: Vec<usize> = columns
        .iter()
        .map(|col| {
            rows.iter()
                .map(|row| cell(row, col).chars().count())
                .chain(std::iter::once(col.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let render = |cells: Vec<String>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(c, w)| format!("{:<width$}", c, width = *w))
            .collect::<Vec<_>>()
            .join(" | ")
    };

    let header = render(columns.iter().map(|c| c.to_string()).collect());
    let separator = "-".repeat(header.chars().count());
    let mut lines = vec![header, separator];
    for row in rows {
        lines.push(render(columns.iter().map(|col| cell(row, col)).collect()));
    }
    lines.join("\n")
}
