//! Submit-and-wait plumbing shared by the injector and the orchestrators.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::{DbToolsError, Result};
use crate::result::{QueryExecution, QueryState};
use crate::services::{QueryService, StartQuery};

/// Poll `GetQueryExecution` at a fixed interval until the query leaves
/// QUEUED/RUNNING.
///
/// Running out of `timeout` yields [`DbToolsError::Timeout`]; the query is
/// not cancelled and keeps running remotely.
pub async fn poll_until_complete(
    queries: &dyn QueryService,
    query_id: &str,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<QueryExecution> {
    let start = Instant::now();

    loop {
        let execution = queries.get_query_execution(query_id).await?;

        debug!(
            query_id = %query_id,
            state = %execution.state,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Polling query status"
        );

        match &execution.state {
            QueryState::Succeeded => return Ok(execution),
            QueryState::Failed => {
                let reason = execution
                    .state_change_reason
                    .clone()
                    .unwrap_or_else(|| "unknown".to_string());
                error!(query_id = %query_id, reason = %reason, "Query failed");
                return Err(DbToolsError::QueryFailed {
                    query_id: query_id.to_string(),
                    reason,
                });
            }
            QueryState::Cancelled | QueryState::Unknown(_) => {
                warn!(query_id = %query_id, state = %execution.state, "Query ended unexpectedly");
                return Err(DbToolsError::UnexpectedState {
                    query_id: query_id.to_string(),
                    state: execution.state.to_string(),
                });
            }
            QueryState::Queued | QueryState::Running => {}
        }

        if let Some(limit) = timeout {
            if start.elapsed() >= limit {
                warn!(
                    query_id = %query_id,
                    timeout_ms = limit.as_millis() as u64,
                    "Stopped waiting on query"
                );
                return Err(DbToolsError::Timeout {
                    query_id: query_id.to_string(),
                    waited: limit,
                });
            }
        }

        tokio::time::sleep(interval).await;
    }
}

/// Start `request` and wait for it to succeed.
pub async fn run_to_completion(
    queries: &dyn QueryService,
    request: &StartQuery,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<QueryExecution> {
    info!(sql = %request.sql, "Running statement");
    let query_id = queries.start_query(request).await?;
    poll_until_complete(queries, &query_id, interval, timeout).await
}

/// Names interpolated into generated SQL must be plain identifiers.
pub fn check_identifier(kind: &str, name: &str) -> Result<()> {
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        Ok(())
    } else {
        Err(DbToolsError::validation(format!("invalid {kind} name: {name:?}")))
    }
}
