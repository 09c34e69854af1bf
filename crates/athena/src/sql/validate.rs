use std::fmt;

use sqlparser::tokenizer::Token;

use super::normalize::{clean_query, FormatOptions};
use super::tokens::{self, Lexeme, Statement, TokenTree};
use crate::error::{DbToolsError, Result, SINGLE_SELECT_MESSAGE};

/// Statement type, decided by the statement's leading keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Merge,
    Create,
    Drop,
    Alter,
    Unload,
    /// Any other leading keyword (`SHOW`, `MSCK`, `DESCRIBE`, ...), upper-cased.
    Other(String),
    /// No leading word at all.
    Unknown,
}

impl StatementKind {
    fn from_keyword(word: &str) -> Self {
        match word.to_ascii_uppercase().as_str() {
            "SELECT" => Self::Select,
            "INSERT" => Self::Insert,
            "UPDATE" => Self::Update,
            "DELETE" => Self::Delete,
            "MERGE" => Self::Merge,
            "CREATE" => Self::Create,
            "DROP" => Self::Drop,
            "ALTER" => Self::Alter,
            "UNLOAD" => Self::Unload,
            other => Self::Other(other.to_string()),
        }
    }

    /// Keywords that can open the main body after a `WITH` list.
    fn follows_cte(word: &str) -> bool {
        matches!(
            word.to_ascii_uppercase().as_str(),
            "SELECT" | "INSERT" | "UPDATE" | "DELETE" | "MERGE" | "CREATE" | "UNLOAD" | "VALUES"
        )
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(word) => f.write_str(word),
            Self::Unknown => f.write_str("UNKNOWN"),
            kind => write!(f, "{}", format!("{kind:?}").to_ascii_uppercase()),
        }
    }
}

/// Classify a statement from its top-level tokens.
///
/// A leading `WITH` list is skipped: CTE bodies are parenthesised groups,
/// so the first statement keyword at the top level after `WITH` is the one
/// that decides. A statement that opens with a parenthesised group takes
/// the kind of the group's contents.
pub fn classify(statement: &Statement) -> StatementKind {
    classify_trees(statement.trees())
}

fn classify_trees(trees: &[TokenTree]) -> StatementKind {
    let mut significant = trees.iter().filter(|t| !is_trivia(t));

    match significant.next() {
        Some(TokenTree::Group(children)) => classify_trees(children),
        Some(TokenTree::Leaf(Lexeme { token: Token::Word(w), .. })) if w.quote_style.is_none() => {
            if !w.value.eq_ignore_ascii_case("WITH") {
                return StatementKind::from_keyword(&w.value);
            }
            significant
                .find_map(|t| match t {
                    TokenTree::Leaf(Lexeme { token: Token::Word(w), .. })
                        if w.quote_style.is_none() && StatementKind::follows_cte(&w.value) =>
                    {
                        Some(StatementKind::from_keyword(&w.value))
                    }
                    _ => None,
                })
                .unwrap_or(StatementKind::Unknown)
        }
        _ => StatementKind::Unknown,
    }
}

fn is_trivia(tree: &TokenTree) -> bool {
    matches!(
        tree.token(),
        Some(Token::Whitespace(_) | Token::LParen | Token::RParen | Token::SemiColon)
    )
}

/// Require `sql` to be exactly one SELECT statement.
///
/// Comments are stripped first; a trailing `;` is allowed. Anything that
/// cannot be tokenized, holds several statements, or leads with another
/// statement type (including `CREATE TABLE ... AS SELECT`) is rejected.
pub fn check_sql(sql: &str) -> Result<()> {
    let cleaned = clean_query(sql, &FormatOptions::strip_comments());
    let statements = tokens::parse(&cleaned)
        .map_err(|_| DbToolsError::validation(SINGLE_SELECT_MESSAGE))?;

    let mut statements = statements.iter().filter(|s| !s.is_blank());
    match (statements.next(), statements.next()) {
        (Some(only), None) if classify(only) == StatementKind::Select => Ok(()),
        _ => Err(DbToolsError::validation(SINGLE_SELECT_MESSAGE)),
    }
}
