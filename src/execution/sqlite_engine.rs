//! SQLite data source
//!
//! Backs uploaded `.db`/`.sqlite` files plus CSV and Excel uploads (loaded
//! into an in-memory database). Every connection is switched to `query_only` before
//! it is handed out, so the engine itself refuses writes too.

use crate::error::{Nl2SqlError, Result};
use crate::execution::engine::{DataSource, RowSet};
use async_trait::async_trait;
use calamine::{open_workbook_auto, Data, Reader};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, OpenFlags};
use serde_json::{Number, Value};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};

/// Table name used for single-table uploads (CSV)
pub const UPLOADED_TABLE: &str = "uploaded_table";

pub struct SqliteSource {
    conn: Mutex<Connection>,
}

impl SqliteSource {
    /// Open an existing database file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            Nl2SqlError::Database(format!("Failed to open {}: {}", path.display(), e))
        })?;
        info!("Opened SQLite database {}", path.display());
        Self::from_connection(conn)
    }

    /// Wrap a prepared connection; it becomes query-only from here on.
    pub fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA query_only = ON;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        Self::from_csv_reader(file)
    }

    /// Load a CSV (header row required) into `uploaded_table` in memory
    pub fn from_csv_reader<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut csv_reader = csv::Reader::from_reader(reader);
        let headers: Vec<String> = csv_reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut records: Vec<Vec<String>> = Vec::new();
        for record in csv_reader.records() {
            let record = record?;
            records.push(record.iter().map(|c| c.to_string()).collect());
        }
        Self::from_records("CSV", headers, records)
    }

    /// Load the first sheet of an `.xlsx`/`.xls` workbook into `uploaded_table`.
    ///
    /// The first row is the header; cells go through the same type inference
    /// as CSV uploads.
    pub fn from_excel_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut workbook = open_workbook_auto(path)?;
        let range = workbook.worksheet_range_at(0).ok_or_else(|| {
            Nl2SqlError::Schema(format!("Workbook {} has no sheets", path.display()))
        })??;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .map(|row| row.iter().map(|c| excel_cell_text(c).trim().to_string()).collect())
            .unwrap_or_default();
        let records: Vec<Vec<String>> = rows
            .map(|row| row.iter().map(excel_cell_text).collect())
            .collect();
        Self::from_records("Excel", headers, records)
    }

    fn from_records(kind: &str, headers: Vec<String>, records: Vec<Vec<String>>) -> Result<Self> {
        if headers.is_empty() || headers.iter().any(|h| h.is_empty()) {
            return Err(Nl2SqlError::Schema(format!(
                "{} header must name every column",
                kind
            )));
        }

        let types: Vec<&'static str> = (0..headers.len())
            .map(|idx| infer_column_type(records.iter().filter_map(|r| r.get(idx))))
            .collect();

        let mut conn = Connection::open_in_memory()?;
        let column_defs: Vec<String> = headers
            .iter()
            .zip(&types)
            .map(|(name, ty)| format!("{} {}", quote_ident(name), ty))
            .collect();
        conn.execute_batch(&format!(
            "CREATE TABLE {} ({});",
            UPLOADED_TABLE,
            column_defs.join(", ")
        ))?;

        let placeholders = vec!["?"; headers.len()].join(", ");
        let insert = format!("INSERT INTO {} VALUES ({})", UPLOADED_TABLE, placeholders);
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&insert)?;
            for record in &records {
                let values: Vec<SqlValue> = (0..headers.len())
                    .map(|idx| to_sql_value(record.get(idx).map(String::as_str), types[idx]))
                    .collect();
                stmt.execute(rusqlite::params_from_iter(values))?;
            }
        }
        tx.commit()?;

        info!(
            "Loaded {} {} row(s) into {} ({} columns)",
            records.len(),
            kind,
            UPLOADED_TABLE,
            headers.len()
        );
        Self::from_connection(conn)
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Nl2SqlError::Database("SQLite connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl DataSource for SqliteSource {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn query(&self, sql: &str) -> Result<RowSet> {
        debug!("sqlite query: {}", sql);
        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut result = RowSet::new(columns);

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for idx in 0..width {
                values.push(to_json(row.get_ref(idx)?));
            }
            result.rows.push(values);
        }
        Ok(result)
    }

    async fn describe_schema(&self) -> Result<String> {
        let conn = self.lock()?;
        let mut tables_stmt = conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;
        let tables: Vec<String> = tables_stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<_, _>>()?;

        let mut blocks = Vec::with_capacity(tables.len());
        for table in &tables {
            let mut info = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
            let columns: Vec<String> = info
                .query_map([], |row| {
                    let name: String = row.get(1)?;
                    let ty: String = row.get(2)?;
                    Ok(format!("  - {} ({})", name, ty))
                })?
                .collect::<std::result::Result<_, _>>()?;
            blocks.push(format!("Table: {}\nColumns:\n{}", table, columns.join("\n")));
        }
        Ok(blocks.join("\n\n"))
    }
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<blob {} bytes>", b.len())),
    }
}

fn excel_cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::DateTime(dt) => dt
            .as_datetime()
            .map(|d| d.to_string())
            .unwrap_or_else(|| dt.as_f64().to_string()),
        other => other.to_string(),
    }
}

fn infer_column_type<'a>(cells: impl Iterator<Item = &'a String>) -> &'static str {
    let mut ty = "INTEGER";
    let mut seen = false;
    for cell in cells.map(|c| c.trim()).filter(|c| !c.is_empty()) {
        seen = true;
        if ty == "INTEGER" && cell.parse::<i64>().is_err() {
            ty = "REAL";
        }
        if ty == "REAL" && cell.parse::<f64>().is_err() {
            return "TEXT";
        }
    }
    if seen {
        ty
    } else {
        "TEXT"
    }
}

fn to_sql_value(cell: Option<&str>, ty: &str) -> SqlValue {
    let cell = match cell.map(str::trim) {
        Some(c) if !c.is_empty() => c,
        _ => return SqlValue::Null,
    };
    match ty {
        "INTEGER" => cell
            .parse()
            .map(SqlValue::Integer)
            .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
        "REAL" => cell
            .parse()
            .map(SqlValue::Real)
            .unwrap_or_else(|_| SqlValue::Text(cell.to_string())),
        _ => SqlValue::Text(cell.to_string()),
    }
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn districts() -> SqliteSource {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE districts (id INTEGER, district_uid TEXT, name TEXT);
             INSERT INTO districts VALUES (1, '209', 'North'), (2, '217', NULL), (3, '220', 'South'), (4, '220', 'East');",
        )
        .unwrap();
        SqliteSource::from_connection(conn).unwrap()
    }

    #[tokio::test]
    async fn test_query_preserves_column_and_row_order() {
        let source = districts();
        let result = source
            .query("SELECT name, id FROM districts ORDER BY id")
            .await
            .unwrap();
        assert_eq!(result.columns, vec!["name", "id"]);
        assert_eq!(result.rows[0], vec![json!("North"), json!(1)]);
        assert_eq!(result.rows[1], vec![Value::Null, json!(2)]);
        assert_eq!(result.len(), 4);
    }

    #[tokio::test]
    async fn test_distinct_values_skip_nulls() {
        let source = districts();
        let values = source.distinct_values("districts", "name").await.unwrap();
        assert_eq!(values.len(), 3);
        assert!(values.iter().all(|v| !v.is_null()));

        let uids = source
            .distinct_values("districts", "district_uid")
            .await
            .unwrap();
        assert_eq!(uids, vec![json!("209"), json!("217"), json!("220")]);
    }

    #[tokio::test]
    async fn test_missing_table_is_an_error() {
        let source = districts();
        assert!(source.distinct_values("nope", "name").await.is_err());
    }

    #[tokio::test]
    async fn test_connection_is_query_only() {
        let source = districts();
        let err = source
            .query("INSERT INTO districts VALUES (9, '999', 'X')")
            .await
            .unwrap_err();
        assert!(matches!(err, Nl2SqlError::Database(_)));
    }

    #[tokio::test]
    async fn test_csv_upload_infers_types() {
        let csv = "program,enrolled,rate\nProgram A,16,0.5\nProgram B,,1\n";
        let source = SqliteSource::from_csv_reader(csv.as_bytes()).unwrap();
        let schema = source.describe_schema().await.unwrap();
        assert!(schema.starts_with("Table: uploaded_table\nColumns:"));
        assert!(schema.contains("  - program (TEXT)"));
        assert!(schema.contains("  - enrolled (INTEGER)"));
        assert!(schema.contains("  - rate (REAL)"));

        let result = source
            .query("SELECT program, enrolled FROM uploaded_table WHERE enrolled IS NULL")
            .await
            .unwrap();
        assert_eq!(result.rows, vec![vec![json!("Program B"), Value::Null]]);
    }

    #[test]
    fn test_infer_column_type() {
        let ints = vec!["1".to_string(), " 2 ".to_string(), "".to_string()];
        assert_eq!(infer_column_type(ints.iter()), "INTEGER");
        let mixed = vec!["1".to_string(), "x".to_string()];
        assert_eq!(infer_column_type(mixed.iter()), "TEXT");
        let empty: Vec<String> = vec!["".to_string()];
        assert_eq!(infer_column_type(empty.iter()), "TEXT");
    }
}
