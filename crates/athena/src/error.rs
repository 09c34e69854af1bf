use std::time::Duration;

/// Message for SQL that is not exactly one SELECT statement.
pub const SINGLE_SELECT_MESSAGE: &str = "The sql statement must be a single select query";

/// Message for a quoted temp-database placeholder used as a qualifier.
pub const QUOTED_PLACEHOLDER_MESSAGE: &str =
    "When querying a temporary database, __temp__ should not be wrapped in quotes";

/// Errors raised by the Athena tooling layer.
#[derive(Debug, thiserror::Error)]
pub enum DbToolsError {
    /// Bad input or configuration detected before anything is sent to AWS.
    #[error("{0}")]
    Validation(String),

    /// Athena reported the query as FAILED.
    #[error("Query {query_id} failed: {reason}")]
    QueryFailed { query_id: String, reason: String },

    /// The query ended in a terminal state other than SUCCEEDED or FAILED.
    #[error("Query {query_id} ended in state {state}")]
    UnexpectedState { query_id: String, state: String },

    /// The caller's wait budget ran out. The query itself keeps running.
    #[error("Query {query_id} timed out after {waited:?}")]
    Timeout { query_id: String, waited: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    /// An AWS SDK error (stringified).
    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DbToolsError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// True for errors reported by the remote query engine.
    pub fn is_remote(&self) -> bool {
        matches!(self, Self::QueryFailed { .. } | Self::UnexpectedState { .. })
    }
}

impl From<dbtools_core::S3UriError> for DbToolsError {
    fn from(e: dbtools_core::S3UriError) -> Self {
        Self::Validation(e.to_string())
    }
}

pub type Result<T, E = DbToolsError> = std::result::Result<T, E>;
