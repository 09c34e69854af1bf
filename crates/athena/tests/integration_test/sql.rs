//! SQL helpers through the crate's public surface.

use dbtools_athena::error::{QUOTED_PLACEHOLDER_MESSAGE, SINGLE_SELECT_MESSAGE};
use dbtools_athena::{
    check_sql, clean_query, default_user_rules, replace_temp_database_name_reference, FormatOptions,
    UserIdResolver,
};

#[test]
fn clean_then_check() {
    let cleaned = clean_query("SELECT *\nFROM t -- comment\n;", &FormatOptions::strip_comments());
    assert_eq!(cleaned, "SELECT * FROM t");
    assert!(check_sql(&cleaned).is_ok());
}

#[test]
fn select_disguised_ctas_is_rejected() {
    for sql in [
        "CREATE TABLE x AS SELECT * FROM y",
        "INSERT INTO x SELECT * FROM y",
        "WITH a AS (SELECT 1) INSERT INTO x SELECT * FROM a",
    ] {
        assert_eq!(check_sql(sql).unwrap_err().to_string(), SINGLE_SELECT_MESSAGE, "{sql}");
    }
    assert!(check_sql("WITH a AS (SELECT 1) SELECT * FROM a").is_ok());
}

#[test]
fn rewrite_pipeline_with_derived_database() {
    let resolver = UserIdResolver::new(&default_user_rules(), "mojap_de_temp_").unwrap();
    let db = resolver.database_name("d347875:alpha_user_some_user").unwrap();
    assert_eq!(db, "mojap_de_temp_alpha_user_some_user");

    let sql = "SELECT * FROM __TEMP__.a JOIN (SELECT * FROM __temp__.b) b ON a.id = b.id";
    let rewritten = replace_temp_database_name_reference(sql, &db).unwrap();
    assert_eq!(
        rewritten,
        "SELECT * FROM mojap_de_temp_alpha_user_some_user.a JOIN \
         (SELECT * FROM mojap_de_temp_alpha_user_some_user.b) b ON a.id = b.id"
    );
    assert_eq!(replace_temp_database_name_reference(&rewritten, &db).unwrap(), rewritten);
}

#[test]
fn quoted_placeholder_is_rejected() {
    for sql in [r#"SELECT * FROM "__temp__".t"#, r#"SELECT * FROM "__TEMP__".t"#] {
        let err = replace_temp_database_name_reference(sql, "db").unwrap_err();
        assert_eq!(err.to_string(), QUOTED_PLACEHOLDER_MESSAGE);
    }
}
