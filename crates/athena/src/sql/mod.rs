//! SQL text handling: cleaning, single-SELECT validation and `__temp__`
//! placeholder rewriting. Every token keeps its source slice, so text that
//! is not rewritten comes back byte-identical.

pub mod normalize;
pub mod placeholder;
pub mod tokens;
pub mod validate;

pub use normalize::{clean_query, FormatOptions};
pub use placeholder::{is_placeholder, replace_temp_database_name_reference, TEMP_DATABASE_PLACEHOLDER};
pub use tokens::{parse, Lexeme, Statement, TokenTree};
pub use validate::{check_sql, classify, StatementKind};

/// Split SQL text into its non-blank statements, each rendered back to text
/// without its terminating semicolon.
pub fn split_queries(sql: &str) -> crate::Result<Vec<String>> {
    Ok(parse(sql)?
        .iter()
        .filter(|s| !s.is_blank())
        .map(|s| {
            let sql = s.to_sql();
            let sql = sql.trim();
            sql.strip_suffix(';').unwrap_or(sql).trim_end().to_string()
        })
        .collect())
}
