//! Running queries and reading their results.

use std::time::Duration;

use dbtools_athena::{Column, DbToolsError, QueryParams, QueryState};

use crate::fakes::{tools, FakeAws, OUTPUT_DIR};

#[tokio::test]
async fn read_sql_query_returns_rows() {
    let aws = FakeAws::new();
    aws.return_rows(
        &[("id", "bigint"), ("name", "varchar")],
        &[&[Some("1"), Some("alice")], &[Some("2"), None]],
    );
    let tools = tools(&aws);

    let result = tools
        .read_sql_query("SELECT id, name FROM people", QueryParams::new())
        .await
        .unwrap();

    assert_eq!(result.row_count(), 2);
    assert_eq!(result.get_value(0, "name"), Some("alice"));
    assert_eq!(result.get_value(1, "name"), None);
    assert_eq!(result.execution.state, QueryState::Succeeded);
    assert_eq!(
        result.execution.output_location,
        Some(format!("{OUTPUT_DIR}q-1.csv"))
    );
}

#[tokio::test]
async fn read_sql_queries_runs_each_statement() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    let results = tools
        .read_sql_queries(
            "SELECT 1;\n-- second one\nSELECT 2 FROM __temp__.t;\n",
            QueryParams::new(),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    let sql = aws.sql_log();
    assert_eq!(sql[0], "SELECT 1");
    assert_eq!(sql[1], "-- second one\nSELECT 2 FROM mojap_de_temp_alpha_user_jane.t");
}

#[tokio::test]
async fn failed_query_carries_the_reason() {
    let aws = FakeAws::new();
    aws.finish_with(QueryState::Failed, Some("SYNTAX_ERROR: line 1:8"));
    let tools = tools(&aws);

    let err = tools
        .start_query_execution_and_wait("SELECT nope", QueryParams::new())
        .await
        .unwrap_err();

    match err {
        DbToolsError::QueryFailed { query_id, reason } => {
            assert_eq!(query_id, "q-1");
            assert_eq!(reason, "SYNTAX_ERROR: line 1:8");
        }
        other => panic!("expected QueryFailed, got {other:?}"),
    }
}

#[tokio::test]
async fn cancelled_query_is_an_unexpected_state() {
    let aws = FakeAws::new();
    aws.finish_with(QueryState::Cancelled, None);
    let tools = tools(&aws);

    let err = tools
        .read_sql_query("SELECT 1", QueryParams::new())
        .await
        .unwrap_err();

    assert!(err.is_remote());
    assert!(matches!(err, DbToolsError::UnexpectedState { ref state, .. } if state == "CANCELLED"));
}

#[tokio::test(start_paused = true)]
async fn timeout_leaves_the_query_running() {
    let aws = FakeAws::new();
    aws.never_finish();
    let tools = tools(&aws);

    let err = tools
        .read_sql_query(
            "SELECT 1",
            QueryParams::new().with_timeout(Duration::from_secs(2)),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DbToolsError::Timeout { waited, .. } if waited == Duration::from_secs(2)));
    assert!(!err.is_remote());
    assert!(!aws.events().iter().any(|e| e.starts_with("stop")));
}

#[tokio::test]
async fn start_then_wait_separately() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    let query_id = tools
        .start_query_execution("SELECT 1", QueryParams::new())
        .await
        .unwrap();
    let running = tools
        .get_query_execution(&query_id, QueryParams::new())
        .await
        .unwrap();
    assert!(running.state.is_pending());

    let done = tools.wait_query(&query_id, QueryParams::new()).await.unwrap();
    assert_eq!(done.state, QueryState::Succeeded);
}

#[tokio::test]
async fn stop_query_execution_reaches_athena() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    tools
        .stop_query_execution("q-9", QueryParams::new())
        .await
        .unwrap();

    assert!(aws.events().contains(&"stop q-9".to_string()));
}

#[tokio::test]
async fn columns_types_come_without_rows() {
    let aws = FakeAws::new();
    aws.return_rows(&[("n", "integer")], &[&[Some("1")]]);
    let tools = tools(&aws);

    let columns = tools
        .get_query_columns_types("q-1", QueryParams::new())
        .await
        .unwrap();

    assert_eq!(columns, vec![Column::new("n", "integer")]);
}

#[tokio::test]
async fn athena_query_response_converts_types() {
    let aws = FakeAws::new();
    aws.return_rows(
        &[("id", "bigint"), ("name", "varchar"), ("seen", "timestamp"), ("amount", "decimal(10,2)")],
        &[],
    );
    let tools = tools(&aws);

    let response = tools
        .get_athena_query_response("SELECT * FROM t", false, QueryParams::new())
        .await
        .unwrap();

    assert_eq!(response.s3_path, format!("{OUTPUT_DIR}__athena_temp__/q-1.csv"));
    let types: Vec<&str> = response.meta.iter().map(|c| c.data_type.as_str()).collect();
    assert_eq!(types, vec!["long", "character", "datetime", "decimal(10,2)"]);

    let raw = tools
        .get_athena_query_response("SELECT * FROM t", true, QueryParams::new())
        .await
        .unwrap();
    assert_eq!(raw.meta[0].data_type, "bigint");
}

#[tokio::test]
async fn read_sql_table_selects_every_row() {
    let aws = FakeAws::new();
    aws.return_rows(&[("x", "integer")], &[&[Some("1")], &[Some("2")]]);
    let tools = tools(&aws);

    let result = tools
        .read_sql_table("scratch", "__temp__", QueryParams::new())
        .await
        .unwrap();

    assert_eq!(result.row_count(), 2);
    assert_eq!(aws.sql_log(), vec!["SELECT * FROM mojap_de_temp_alpha_user_jane.scratch"]);
}

#[tokio::test]
async fn read_sql_table_rejects_names_that_are_not_identifiers() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    for (table, database) in [("t; DROP TABLE x", "db"), ("t", "db.other")] {
        let err = tools
            .read_sql_table(table, database, QueryParams::new())
            .await
            .unwrap_err();
        assert!(err.is_validation(), "{table} in {database}");
    }
    assert!(aws.queries().is_empty());
}

#[tokio::test]
async fn get_work_group_defaults_to_primary() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    let workgroup = tools.get_work_group(QueryParams::new()).await.unwrap();

    assert_eq!(workgroup.name, "primary");
    assert_eq!(workgroup.output_location.as_deref(), Some("s3://wg-results/"));
    assert!(aws.events().contains(&"work_group primary".to_string()));
    assert_eq!(aws.identity_calls(), 0);
}
