//! Parameter injection as seen through the public operations.

use dbtools_athena::{OperationKind, QueryParams, SessionOptions};

use crate::fakes::{tools, FakeAws, OUTPUT_DIR, TEMP_DB};

#[tokio::test]
async fn sql_is_rewritten_and_output_forced_to_user_dir() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    tools
        .start_query_execution(
            "SELECT * FROM __temp__.people",
            QueryParams::new().with_s3_output("s3://somewhere-else/"),
        )
        .await
        .unwrap();

    let queries = aws.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].sql, format!("SELECT * FROM {TEMP_DB}.people"));
    assert_eq!(queries[0].output_location.as_deref(), Some(OUTPUT_DIR));
    assert_eq!(queries[0].database, None);
}

#[tokio::test]
async fn temp_database_keyword_resolves_case_insensitively() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    tools
        .start_query_execution("SELECT 1", QueryParams::new().with_database("__TEMP__"))
        .await
        .unwrap();

    assert_eq!(aws.queries()[0].database.as_deref(), Some(TEMP_DB));
}

#[tokio::test]
async fn explicit_database_is_kept() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    tools
        .start_query_execution("SELECT 1", QueryParams::new().with_database("analytics"))
        .await
        .unwrap();

    assert_eq!(aws.queries()[0].database.as_deref(), Some("analytics"));
}

#[tokio::test]
async fn ctas_approach_creates_the_temp_database_first() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    tools
        .read_sql_query("SELECT 1", QueryParams::new().with_ctas_approach(true))
        .await
        .unwrap();

    let sql = aws.sql_log();
    assert_eq!(sql, vec![format!("CREATE DATABASE IF NOT EXISTS {TEMP_DB}"), "SELECT 1".to_string()]);
    assert!(aws.has_database(TEMP_DB));
    assert_eq!(aws.queries()[1].database.as_deref(), Some(TEMP_DB));
}

#[tokio::test]
async fn ctas_approach_skips_creation_when_database_exists() {
    let aws = FakeAws::new();
    aws.add_database(TEMP_DB);
    let tools = tools(&aws);

    tools
        .read_sql_query("SELECT 1", QueryParams::new().with_ctas_approach(true))
        .await
        .unwrap();

    assert_eq!(aws.sql_log(), vec!["SELECT 1"]);
}

#[tokio::test]
async fn ctas_approach_defaults_to_false() {
    let aws = FakeAws::new();
    let tools = tools(&aws);

    let prepared = tools
        .injector()
        .prepare(OperationKind::ReadSqlQuery, QueryParams::new().with_sql("SELECT 1"))
        .await
        .unwrap();

    assert_eq!(prepared.ctas_approach, Some(false));
    assert_eq!(prepared.database, None);
    assert!(aws.sql_log().is_empty());
}

#[tokio::test]
async fn caller_session_is_ignored_unless_allowed() {
    let aws = FakeAws::new();
    let other = FakeAws::with_user("AROAOTHER:alpha_user_bob");
    let tools = tools(&aws);

    tools
        .start_query_execution(
            "SELECT * FROM __temp__.t",
            QueryParams::new().with_backend(other.backend()),
        )
        .await
        .unwrap();

    assert_eq!(aws.sessions().len(), 1);
    assert!(other.queries().is_empty());
    assert_eq!(aws.queries()[0].sql, format!("SELECT * FROM {TEMP_DB}.t"));
}

#[tokio::test]
async fn create_temp_database_honours_caller_session() {
    let aws = FakeAws::new();
    let other = FakeAws::with_user("AROAOTHER:alpha_user_bob");
    let tools = tools(&aws);

    let name = tools
        .create_temp_database(None, QueryParams::new().with_backend(other.backend()))
        .await
        .unwrap();

    assert_eq!(name, "mojap_de_temp_alpha_user_bob");
    assert!(aws.sessions().is_empty());
    assert!(other.has_database("mojap_de_temp_alpha_user_bob"));
}

#[tokio::test]
async fn session_options_reach_the_connector() {
    let aws = FakeAws::new();
    let tools = tools(&aws);
    let session = SessionOptions {
        force_ec2: true,
        region: Some("eu-west-2".into()),
    };

    tools
        .get_query_execution("q-1", QueryParams::new().with_session(session.clone()))
        .await
        .ok();

    assert_eq!(aws.sessions(), vec![session]);
}

#[tokio::test]
async fn id_only_operations_skip_identity_lookup() {
    let aws = FakeAws::new();
    let tools = tools(&aws);
    let query_id = tools
        .start_query_execution("SELECT 1", QueryParams::new())
        .await
        .unwrap();
    let calls = aws.identity_calls();

    tools.wait_query(&query_id, QueryParams::new()).await.unwrap();
    tools.stop_query_execution(&query_id, QueryParams::new()).await.unwrap();

    assert_eq!(aws.identity_calls(), calls);
}

#[tokio::test]
async fn unknown_identity_fails_before_submitting() {
    let aws = FakeAws::with_user("AROAEXAMPLE:my-name");
    let tools = tools(&aws);

    let err = tools
        .start_query_execution("SELECT 1", QueryParams::new())
        .await
        .unwrap_err();

    assert!(err.is_validation());
    assert!(err.to_string().contains("invalid user"));
    assert!(aws.queries().is_empty());
}

#[tokio::test]
async fn email_identity_maps_to_local_part() {
    let aws = FakeAws::with_user("AROAEXAMPLE:my-name@digital.justice.gov.uk");
    let tools = tools(&aws);

    let caller = tools.whoami(QueryParams::new()).await.unwrap();

    assert_eq!(caller.temp_database, "mojap_de_temp_my_name");
    assert_eq!(
        caller.output_dir,
        "s3://dump-bucket/AROAEXAMPLE:my-name@digital.justice.gov.uk/"
    );
}
