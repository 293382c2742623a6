//! PostgreSQL data source (sqlx)

use crate::db::connection::{init_pool, read_only};
use crate::db::DbPool;
use crate::error::Result;
use crate::execution::engine::{DataSource, RowSet};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{Number, Value};
use sqlx::postgres::types::PgInterval;
use sqlx::postgres::{PgConnectOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};
use std::str::FromStr;
use tracing::{debug, warn};

pub struct PostgresSource {
    pool: DbPool,
}

impl PostgresSource {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Connect with a URL; sessions are forced read-only.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = read_only(PgConnectOptions::from_str(database_url)?);
        Ok(Self::new(init_pool(options).await?))
    }

    pub async fn connect_with(options: PgConnectOptions) -> Result<Self> {
        Ok(Self::new(init_pool(options).await?))
    }
}

#[async_trait]
impl DataSource for PostgresSource {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn query(&self, sql: &str) -> Result<RowSet> {
        debug!("postgres query: {}", sql);
        let rows = sqlx::query(sql).fetch_all(&self.pool).await?;

        let columns: Vec<String> = rows
            .first()
            .map(|row| row.columns().iter().map(|c| c.name().to_string()).collect())
            .unwrap_or_default();
        let mut result = RowSet::new(columns);
        for row in &rows {
            result
                .rows
                .push((0..row.len()).map(|idx| decode_cell(row, idx)).collect());
        }
        Ok(result)
    }

    async fn describe_schema(&self) -> Result<String> {
        let rows = sqlx::query(
            "SELECT table_name, column_name, data_type
             FROM information_schema.columns
             WHERE table_schema NOT IN ('pg_catalog', 'information_schema')
             ORDER BY table_schema, table_name, ordinal_position",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut blocks: Vec<(String, Vec<String>)> = Vec::new();
        for row in rows {
            let table: String = row.try_get("table_name")?;
            let column: String = row.try_get("column_name")?;
            let data_type: String = row.try_get("data_type")?;
            let line = format!("  - {} ({})", column, data_type);
            match blocks.last_mut() {
                Some((name, lines)) if *name == table => lines.push(line),
                _ => blocks.push((table, vec![line])),
            }
        }

        Ok(blocks
            .into_iter()
            .map(|(table, lines)| format!("Table: {}\nColumns:\n{}", table, lines.join("\n")))
            .collect::<Vec<_>>()
            .join("\n\n"))
    }
}

fn decode_cell(row: &PgRow, idx: usize) -> Value {
    let type_name = row.columns()[idx].type_info().name().to_string();
    let decoded = match type_name.as_str() {
        "BOOL" => row.try_get::<Option<bool>, _>(idx).map(|v| v.map(Value::from)),
        "INT2" => row.try_get::<Option<i16>, _>(idx).map(|v| v.map(Value::from)),
        "INT4" => row.try_get::<Option<i32>, _>(idx).map(|v| v.map(Value::from)),
        "INT8" => row.try_get::<Option<i64>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(idx)
            .map(|v| v.and_then(|f| Number::from_f64(f as f64)).map(Value::Number)),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(idx)
            .map(|v| v.and_then(Number::from_f64).map(Value::Number)),
        // AVG(), SUM(bigint) and ROUND(x, n) all come back as NUMERIC
        "NUMERIC" => row
            .try_get::<Option<Decimal>, _>(idx)
            .map(|v| v.map(decimal_to_json)),
        "JSON" | "JSONB" => row.try_get::<Option<Value>, _>(idx),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "TIME" => row
            .try_get::<Option<chrono::NaiveTime>, _>(idx)
            .map(|v| v.map(|t| Value::String(t.to_string()))),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_string()))),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(idx)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        "INTERVAL" => row
            .try_get::<Option<PgInterval>, _>(idx)
            .map(|v| v.map(|i| Value::String(interval_to_text(&i)))),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(idx)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        "TEXT[]" | "VARCHAR[]" => row.try_get::<Option<Vec<String>>, _>(idx).map(|v| v.map(Value::from)),
        "INT4[]" => row.try_get::<Option<Vec<i32>>, _>(idx).map(|v| v.map(Value::from)),
        "INT8[]" => row.try_get::<Option<Vec<i64>>, _>(idx).map(|v| v.map(Value::from)),
        "FLOAT8[]" => row.try_get::<Option<Vec<f64>>, _>(idx).map(|v| v.map(Value::from)),
        "BOOL[]" => row.try_get::<Option<Vec<bool>>, _>(idx).map(|v| v.map(Value::from)),
        "NUMERIC[]" => row
            .try_get::<Option<Vec<Decimal>>, _>(idx)
            .map(|v| v.map(|items| Value::Array(items.into_iter().map(decimal_to_json).collect()))),
        // text-like types (enums, citext, ...) arrive as UTF-8 even when sqlx has no mapping
        _ => row
            .try_get::<Option<String>, _>(idx)
            .or_else(|_| row.try_get_unchecked::<Option<String>, _>(idx))
            .map(|v| v.map(Value::String)),
    };

    match decoded {
        Ok(value) => value.unwrap_or(Value::Null),
        Err(e) => {
            warn!("Cannot decode column {} of type {}: {}", idx, type_name, e);
            Value::String(format!("<{}>", type_name))
        }
    }
}

/// JSON number when the decimal survives the trip through f64, its exact
/// text otherwise. Trailing zeros are dropped (`19.50` -> `19.5`).
fn decimal_to_json(value: Decimal) -> Value {
    let text = value.normalize().to_string();
    if let Ok(int) = text.parse::<i64>() {
        return Value::from(int);
    }
    match text.parse::<f64>() {
        Ok(float) if float.to_string() == text => Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::String(text)),
        _ => Value::String(text),
    }
}

/// Postgres-style interval text: `1 year 2 mons 3 days 04:05:06.5`
fn interval_to_text(interval: &PgInterval) -> String {
    let unit = |n: i64, name: &str| format!("{} {}{}", n, name, if n.abs() == 1 { "" } else { "s" });

    let mut parts = Vec::new();
    let (years, months) = (interval.months / 12, interval.months % 12);
    if years != 0 {
        parts.push(unit(years as i64, "year"));
    }
    if months != 0 {
        parts.push(unit(months as i64, "mon"));
    }
    if interval.days != 0 {
        parts.push(unit(interval.days as i64, "day"));
    }

    if interval.microseconds != 0 || parts.is_empty() {
        let sign = if interval.microseconds < 0 { "-" } else { "" };
        let total = interval.microseconds.unsigned_abs();
        let (secs, micros) = (total / 1_000_000, total % 1_000_000);
        let mut time = format!(
            "{}{:02}:{:02}:{:02}",
            sign,
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if micros != 0 {
            time.push_str(format!(".{:06}", micros).trim_end_matches('0'));
        }
        parts.push(time);
    }
    parts.join(" ")
}
