mod common;

use common::education_db;
use nl2sql_refiner::safety_guardrails::is_read_only;
use nl2sql_refiner::SqlExecutor;
use serde_json::json;

#[tokio::test]
async fn substring_identifiers_are_queryable() {
    let source = education_db();
    let result = SqlExecutor::default()
        .execute("SELECT id, note FROM customer_update_log", &source)
        .await;
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.rows[0]["note"], json!("first"));
}

#[tokio::test]
async fn rows_keep_server_order() {
    let source = education_db();
    let result = SqlExecutor::default()
        .execute(
            "SELECT district_uid, name FROM districts ORDER BY district_uid DESC",
            &source,
        )
        .await;
    let uids: Vec<_> = result.rows.iter().map(|r| r["district_uid"].clone()).collect();
    assert_eq!(uids, vec![json!("220"), json!("217"), json!("209")]);
    let columns: Vec<&String> = result.rows[0].keys().collect();
    assert_eq!(columns, vec!["district_uid", "name"]);
}

#[tokio::test]
async fn missing_relation_is_a_failure_result() {
    let source = education_db();
    let result = SqlExecutor::default()
        .execute("SELECT * FROM nowhere", &source)
        .await;
    assert!(!result.success);
    assert!(result.error.unwrap().contains("nowhere"));
    assert!(result.rows.is_empty());
}

#[tokio::test]
async fn zero_rows_is_an_empty_success() {
    let source = education_db();
    let result = SqlExecutor::default()
        .execute("SELECT * FROM districts WHERE district_uid = '999'", &source)
        .await;
    assert!(result.success);
    assert!(result.rows.is_empty());
    assert_eq!(result.formatted, "No results found");
}

#[test]
fn blocked_first_token_rejected_regardless_of_case_and_whitespace() {
    for command in [
        "insert", "update", "delete", "drop", "create", "alter", "truncate", "grant", "revoke",
        "commit", "rollback",
    ] {
        for variant in [
            command.to_string(),
            command.to_uppercase(),
            format!("  \n\t{}", command),
        ] {
            let sql = format!("{} something", variant);
            assert!(!is_read_only(&sql), "{:?} accepted", sql);
        }
    }
}
