use sqlparser::tokenizer::{Token, Whitespace};
use tracing::debug;

use super::tokens;

/// Options for [`clean_query`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FormatOptions {
    /// Drop `--` and `/* */` comments before joining lines.
    pub strip_comments: bool,
}

impl FormatOptions {
    pub fn strip_comments() -> Self {
        Self { strip_comments: true }
    }
}

/// Flatten SQL onto one line.
///
/// Optionally removes comments, joins all lines with a single space, trims
/// the result and removes one trailing semicolon. Never fails: text that
/// cannot be tokenized is cleaned with its comments left in place.
pub fn clean_query(sql: &str, opts: &FormatOptions) -> String {
    let text = if opts.strip_comments {
        strip_comments(sql)
    } else {
        sql.to_string()
    };

    let joined = text.lines().collect::<Vec<_>>().join(" ");
    let trimmed = joined.trim();
    let trimmed = trimmed.strip_suffix(';').unwrap_or(trimmed);
    trimmed.trim_end().to_string()
}

fn strip_comments(sql: &str) -> String {
    let tokens = match tokens::tokenize(sql) {
        Ok(tokens) => tokens,
        Err(e) => {
            debug!(error = %e, "Leaving comments in place");
            return sql.to_string();
        }
    };

    let mut out = String::with_capacity(sql.len());
    for lexeme in &tokens {
        match &lexeme.token {
            // Keep the line break a line comment swallows.
            Token::Whitespace(Whitespace::SingleLineComment { comment, .. }) => {
                if comment.ends_with('\n') {
                    out.push('\n');
                }
            }
            Token::Whitespace(Whitespace::MultiLineComment(_)) => out.push(' '),
            _ => out.push_str(&lexeme.text),
        }
    }
    out
}
