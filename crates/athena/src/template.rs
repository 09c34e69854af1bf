//! SQL templates rendered with minijinja.
//!
//! Templates are arbitrary strings (not pre-registered), so a fresh
//! [`minijinja::Environment`] is created per render call.

use std::path::Path;

use serde_json::Value;

use crate::error::{DbToolsError, Result};

fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    // Missing variables fail loudly instead of rendering as empty SQL.
    env.set_undefined_behavior(minijinja::UndefinedBehavior::Strict);
    env
}

/// Render a SQL template with the given variables.
pub fn render_sql_template(sql: &str, vars: &Value) -> Result<String> {
    build_env()
        .render_str(sql, vars)
        .map_err(|e| DbToolsError::Template(e.to_string()))
}

/// Read a SQL file, rendering it when variables are given.
///
/// With no variables (or an empty map) the file is returned verbatim.
pub fn get_sql_from_file(path: impl AsRef<Path>, vars: Option<&Value>) -> Result<String> {
    let path = path.as_ref();
    let sql = std::fs::read_to_string(path)?;

    match vars {
        Some(vars) if !is_empty_vars(vars) => {
            tracing::debug!(path = %path.display(), "Rendering SQL template");
            render_sql_template(&sql, vars)
        }
        _ => Ok(sql),
    }
}

fn is_empty_vars(vars: &Value) -> bool {
    match vars {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}
