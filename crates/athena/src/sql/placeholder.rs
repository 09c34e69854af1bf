use sqlparser::tokenizer::Token;

use super::tokens;
use crate::error::{DbToolsError, Result, QUOTED_PLACEHOLDER_MESSAGE};

/// Placeholder standing in for the caller's temporary database.
pub const TEMP_DATABASE_PLACEHOLDER: &str = "__temp__";

/// True when `name` is the placeholder, ignoring case and surrounding space.
pub fn is_placeholder(name: &str) -> bool {
    name.trim().eq_ignore_ascii_case(TEMP_DATABASE_PLACEHOLDER)
}

fn starts_with_placeholder(value: &str) -> bool {
    value
        .get(..TEMP_DATABASE_PLACEHOLDER.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(TEMP_DATABASE_PLACEHOLDER))
}

/// Quoted identifier or string literal whose content is the placeholder.
fn is_quoted_placeholder(token: &Token) -> bool {
    match token {
        Token::Word(w) => w.quote_style.is_some() && is_placeholder(&w.value),
        Token::SingleQuotedString(s) | Token::DoubleQuotedString(s) => is_placeholder(s),
        _ => false,
    }
}

/// Replace `__temp__` references with `database_name`.
///
/// Every unquoted word starting with the placeholder (any case) has that
/// prefix replaced; everything else is emitted byte-for-byte, including
/// string literals such as `'__temp__'`. A quoted placeholder used as a
/// qualifier (`"__temp__".t`) is ambiguous and rejected. The result is
/// trimmed of surrounding whitespace.
pub fn replace_temp_database_name_reference(sql: &str, database_name: &str) -> Result<String> {
    let statements = tokens::parse(sql)?;
    let mut out = String::with_capacity(sql.len() + database_name.len());

    for statement in &statements {
        let leaves = statement.lexemes();

        if leaves.windows(2).any(|pair| {
            is_quoted_placeholder(&pair[0].token) && matches!(pair[1].token, Token::Period)
        }) {
            return Err(DbToolsError::validation(QUOTED_PLACEHOLDER_MESSAGE));
        }

        for lexeme in leaves {
            match &lexeme.token {
                Token::Word(w) if w.quote_style.is_none() && starts_with_placeholder(&w.value) => {
                    out.push_str(database_name);
                    out.push_str(&lexeme.text[TEMP_DATABASE_PLACEHOLDER.len()..]);
                }
                _ => out.push_str(&lexeme.text),
            }
        }
    }

    Ok(out.trim().to_string())
}
