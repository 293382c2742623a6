//! Schema descriptors for uploaded data
//!
//! Turns an uploaded file into a live data source plus the textual schema
//! the generator is prompted with.

use crate::error::{Nl2SqlError, Result};
use crate::execution::engine::DataSource;
use crate::execution::sqlite_engine::SqliteSource;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub struct SchemaDescriptor {
    pub source: Arc<dyn DataSource>,
    pub schema: String,
}

impl SchemaDescriptor {
    /// Describe an already-connected source
    pub async fn from_source(source: Arc<dyn DataSource>) -> Result<Self> {
        let schema = source.describe_schema().await?;
        if schema.trim().is_empty() {
            return Err(Nl2SqlError::Schema(format!(
                "No tables found in {} source",
                source.name()
            )));
        }
        Ok(Self { source, schema })
    }

    /// Picks the loader from the file extension: `.db`/`.sqlite`/`.sqlite3`
    /// open read-only, `.csv` and `.xlsx`/`.xls` load into memory.
    pub async fn from_upload(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        match extension.as_str() {
            "db" | "sqlite" | "sqlite3" => Self::from_sqlite(path).await,
            "csv" => Self::from_csv(path).await,
            "xlsx" | "xls" => Self::from_excel(path).await,
            other => Err(Nl2SqlError::Schema(format!(
                "Unsupported file type '{}'. Please upload SQLite, CSV or Excel.",
                other
            ))),
        }
    }

    pub async fn from_sqlite(path: impl AsRef<Path>) -> Result<Self> {
        Self::loaded(path.as_ref(), SqliteSource::open(path.as_ref())?).await
    }

    /// CSV regardless of extension
    pub async fn from_csv(path: impl AsRef<Path>) -> Result<Self> {
        Self::loaded(path.as_ref(), SqliteSource::from_csv_path(path.as_ref())?).await
    }

    pub async fn from_excel(path: impl AsRef<Path>) -> Result<Self> {
        Self::loaded(path.as_ref(), SqliteSource::from_excel_path(path.as_ref())?).await
    }

    async fn loaded(path: &Path, source: SqliteSource) -> Result<Self> {
        info!("Loaded {} as {} source", path.display(), source.name());
        Self::from_source(Arc::new(source)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_csv_upload() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "name,score").unwrap();
        writeln!(file, "John Hancock,91").unwrap();
        file.flush().unwrap();

        let descriptor = SchemaDescriptor::from_upload(file.path()).await.unwrap();
        assert_eq!(
            descriptor.schema,
            "Table: uploaded_table\nColumns:\n  - name (TEXT)\n  - score (INTEGER)"
        );
        let rows = descriptor
            .source
            .query("SELECT name FROM uploaded_table")
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_upload_is_read_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learners.db");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE Learner (id INTEGER PRIMARY KEY, name TEXT);
                 INSERT INTO Learner (name) VALUES ('John Hancock');",
            )
            .unwrap();
        }

        let descriptor = SchemaDescriptor::from_upload(&path).await.unwrap();
        assert!(descriptor.schema.contains("Table: Learner"));
        assert!(descriptor.schema.contains("  - name (TEXT)"));
        assert!(descriptor
            .source
            .query("DELETE FROM Learner")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_excel_upload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("learners.xlsx");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "name").unwrap();
        sheet.write_string(0, 1, "score").unwrap();
        sheet.write_string(1, 0, "John Hancock").unwrap();
        sheet.write_number(1, 1, 91).unwrap();
        sheet.write_string(2, 0, "Jane Austen").unwrap();
        workbook.save(&path).unwrap();

        let descriptor = SchemaDescriptor::from_upload(&path).await.unwrap();
        assert_eq!(
            descriptor.schema,
            "Table: uploaded_table\nColumns:\n  - name (TEXT)\n  - score (INTEGER)"
        );
        let rows = descriptor
            .source
            .query("SELECT name, score FROM uploaded_table ORDER BY name")
            .await
            .unwrap();
        assert_eq!(
            rows.rows,
            vec![
                vec![serde_json::json!("Jane Austen"), serde_json::Value::Null],
                vec![serde_json::json!("John Hancock"), serde_json::json!(91)],
            ]
        );
    }

    #[tokio::test]
    async fn test_explicit_loader_ignores_extension() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        writeln!(file, "district_uid,name").unwrap();
        writeln!(file, "220,Nadia").unwrap();
        file.flush().unwrap();

        assert!(SchemaDescriptor::from_upload(file.path()).await.is_err());
        let descriptor = SchemaDescriptor::from_csv(file.path()).await.unwrap();
        assert!(descriptor.schema.contains("  - district_uid (INTEGER)"));

        // CSV text is not a SQLite database
        assert!(SchemaDescriptor::from_sqlite(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_unsupported_extension() {
        let result = SchemaDescriptor::from_upload("report.parquet").await;
        assert!(matches!(result, Err(Nl2SqlError::Schema(_))));
    }
}
