//! Lossless SQL token trees.
//!
//! Text is lexed with `sqlparser`'s tokenizer (whitespace and comments kept,
//! literals left escaped), grouped into parenthesised sub-trees, and split
//! into statements at top-level semicolons. Each leaf keeps the exact source
//! slice it was lexed from, so rendering the flattened leaves of every
//! statement in order reproduces the input byte for byte.

use sqlparser::dialect::GenericDialect;
use sqlparser::tokenizer::{Token, TokenWithSpan, Tokenizer};

use crate::error::{DbToolsError, Result};

/// A token together with the source text it came from.
///
/// `Token`'s `Display` normalises some spellings (`!=` prints as `<>`,
/// `x'ff'` as `X'ff'`, CRLF as LF), so output is always built from `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub text: String,
}

impl Lexeme {
    pub fn new(token: Token, text: impl Into<String>) -> Self {
        Self { token, text: text.into() }
    }
}

/// A token or a parenthesised group of trees.
///
/// A group's first and last children are its `(` and `)` leaves (the
/// closing leaf is missing when the input is unbalanced).
#[derive(Debug, Clone, PartialEq)]
pub enum TokenTree {
    Leaf(Lexeme),
    Group(Vec<TokenTree>),
}

impl TokenTree {
    /// The token of a leaf, `None` for a group.
    pub fn token(&self) -> Option<&Token> {
        match self {
            Self::Leaf(lexeme) => Some(&lexeme.token),
            Self::Group(_) => None,
        }
    }
}

/// One statement: the trees up to and including its terminating `;`.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    trees: Vec<TokenTree>,
}

impl Statement {
    /// Top-level trees, nested groups unexpanded.
    pub fn trees(&self) -> &[TokenTree] {
        &self.trees
    }

    /// Every leaf in source order, at any nesting depth.
    pub fn lexemes(&self) -> Vec<&Lexeme> {
        flatten(&self.trees)
    }

    /// Every leaf token in source order, at any nesting depth.
    pub fn tokens(&self) -> Vec<&Token> {
        self.lexemes().into_iter().map(|l| &l.token).collect()
    }

    /// True when the statement holds only whitespace, comments and `;`.
    pub fn is_blank(&self) -> bool {
        self.tokens()
            .iter()
            .all(|t| matches!(t, Token::Whitespace(_) | Token::SemiColon | Token::EOF))
    }

    pub fn to_sql(&self) -> String {
        render(self.lexemes())
    }
}

/// Lex `sql` without unescaping literals, pairing every token with its
/// source slice.
pub fn tokenize(sql: &str) -> Result<Vec<Lexeme>> {
    let dialect = GenericDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .with_unescape(false)
        .tokenize_with_location()
        .map_err(|e| DbToolsError::validation(format!("could not tokenize sql: {e}")))?;
    Ok(attach_source(sql, tokens))
}

/// Cut `sql` at each token's start location. Tokens are contiguous, so a
/// token's text runs up to the next token's start.
fn attach_source(sql: &str, tokens: Vec<TokenWithSpan>) -> Vec<Lexeme> {
    let mut chars = sql.char_indices().peekable();
    let (mut line, mut column) = (1u64, 1u64);
    let mut starts = Vec::with_capacity(tokens.len());

    // Line and column are counted the way the tokenizer counts them: only
    // `\n` starts a new line and every other char is one column.
    for t in &tokens {
        let target = (t.span.start.line, t.span.start.column);
        while (line, column) < target {
            match chars.next() {
                Some((_, '\n')) => {
                    line += 1;
                    column = 1;
                }
                Some(_) => column += 1,
                None => break,
            }
        }
        starts.push(chars.peek().map_or(sql.len(), |(i, _)| *i));
    }

    tokens
        .into_iter()
        .enumerate()
        .filter(|(_, t)| !matches!(t.token, Token::EOF))
        .map(|(i, t)| {
            let end = starts.get(i + 1).copied().unwrap_or(sql.len());
            Lexeme::new(t.token, &sql[starts[i]..end])
        })
        .collect()
}

/// Tokenize and split into statements.
pub fn parse(sql: &str) -> Result<Vec<Statement>> {
    Ok(split_statements(tokenize(sql)?))
}

/// Group lexemes by parentheses, then split at top-level semicolons.
pub fn split_statements(lexemes: Vec<Lexeme>) -> Vec<Statement> {
    let mut statements = Vec::new();
    let mut current = Vec::new();

    for tree in group(lexemes) {
        let ends_statement = matches!(tree.token(), Some(Token::SemiColon));
        current.push(tree);
        if ends_statement {
            statements.push(Statement { trees: std::mem::take(&mut current) });
        }
    }
    if !current.is_empty() {
        statements.push(Statement { trees: current });
    }
    statements
}

/// Build parenthesised groups with an explicit stack of open groups.
fn group(lexemes: Vec<Lexeme>) -> Vec<TokenTree> {
    let mut stack: Vec<Vec<TokenTree>> = vec![Vec::new()];

    for lexeme in lexemes {
        match lexeme.token {
            Token::EOF => {}
            Token::LParen => stack.push(vec![TokenTree::Leaf(lexeme)]),
            Token::RParen if stack.len() > 1 => {
                let mut children = stack.pop().unwrap_or_default();
                children.push(TokenTree::Leaf(lexeme));
                push_tree(&mut stack, TokenTree::Group(children));
            }
            _ => push_tree(&mut stack, TokenTree::Leaf(lexeme)),
        }
    }

    // Unclosed groups fold into their parents.
    while stack.len() > 1 {
        let children = stack.pop().unwrap_or_default();
        push_tree(&mut stack, TokenTree::Group(children));
    }
    stack.pop().unwrap_or_default()
}

fn push_tree(stack: &mut [Vec<TokenTree>], tree: TokenTree) {
    if let Some(top) = stack.last_mut() {
        top.push(tree);
    }
}

/// Depth-first walk over `trees` yielding leaves in source order.
pub fn flatten(trees: &[TokenTree]) -> Vec<&Lexeme> {
    let mut out = Vec::new();
    let mut stack = vec![trees.iter()];

    while let Some(top) = stack.last_mut() {
        match top.next() {
            Some(TokenTree::Leaf(lexeme)) => out.push(lexeme),
            Some(TokenTree::Group(children)) => stack.push(children.iter()),
            None => {
                stack.pop();
            }
        }
    }
    out
}

/// Concatenate lexemes back into SQL text.
pub fn render<'a>(lexemes: impl IntoIterator<Item = &'a Lexeme>) -> String {
    lexemes.into_iter().map(|l| l.text.as_str()).collect()
}
