use async_trait::async_trait;
use aws_sdk_athena::types::{QueryExecutionContext, ResultConfiguration};
use tracing::{debug, info};

use crate::error::{DbToolsError, Result};
use crate::result::{Column, QueryExecution, QueryState};
use crate::services::{QueryService, ResultSet, StartQuery, WorkGroup};

/// Largest page `GetQueryResults` returns.
const MAX_PAGE_SIZE: usize = 1000;

fn sdk_err(e: impl std::fmt::Display) -> DbToolsError {
    DbToolsError::AwsSdk(e.to_string())
}

/// [`QueryService`] over the Athena API.
pub struct AthenaQueryService {
    client: aws_sdk_athena::Client,
}

impl AthenaQueryService {
    pub fn new(client: aws_sdk_athena::Client) -> Self {
        Self { client }
    }

    /// Extract a [`QueryExecution`] from an SDK [`QueryExecution`].
    fn extract_execution(
        query_id: &str,
        qe: &aws_sdk_athena::types::QueryExecution,
    ) -> QueryExecution {
        let stats = qe.statistics();
        let status = qe.status();

        QueryExecution {
            query_id: query_id.to_string(),
            state: status
                .and_then(|s| s.state())
                .map(|s| QueryState::parse(s.as_str()))
                .unwrap_or(QueryState::Queued),
            state_change_reason: status
                .and_then(|s| s.state_change_reason())
                .map(String::from),
            output_location: qe
                .result_configuration()
                .and_then(|rc| rc.output_location())
                .map(String::from),
            bytes_scanned: stats
                .and_then(|s| s.data_scanned_in_bytes())
                .unwrap_or(0)
                .max(0) as u64,
            execution_time_ms: stats
                .and_then(|s| s.engine_execution_time_in_millis())
                .unwrap_or(0)
                .max(0) as u64,
        }
    }
}

#[async_trait]
impl QueryService for AthenaQueryService {
    async fn start_query(&self, request: &StartQuery) -> Result<String> {
        let mut req = self
            .client
            .start_query_execution()
            .query_string(&request.sql);

        if let Some(database) = &request.database {
            req = req.query_execution_context(
                QueryExecutionContext::builder().database(database).build(),
            );
        }
        if let Some(output) = &request.output_location {
            req = req.result_configuration(
                ResultConfiguration::builder().output_location(output).build(),
            );
        }
        if let Some(workgroup) = &request.workgroup {
            req = req.work_group(workgroup);
        }

        let resp = req.send().await.map_err(sdk_err)?;
        let query_id = resp
            .query_execution_id()
            .ok_or_else(|| DbToolsError::AwsSdk("No query execution ID returned".into()))?
            .to_string();

        info!(query_id = %query_id, database = ?request.database, "Query execution started");
        Ok(query_id)
    }

    async fn get_query_execution(&self, query_id: &str) -> Result<QueryExecution> {
        let resp = self
            .client
            .get_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(sdk_err)?;

        let qe = resp
            .query_execution()
            .ok_or_else(|| DbToolsError::AwsSdk("No query execution in response".into()))?;

        Ok(Self::extract_execution(query_id, qe))
    }

    async fn stop_query(&self, query_id: &str) -> Result<()> {
        self.client
            .stop_query_execution()
            .query_execution_id(query_id)
            .send()
            .await
            .map_err(sdk_err)?;

        info!(query_id = %query_id, "Query cancellation requested");
        Ok(())
    }

    /// Page through `GetQueryResults`.
    ///
    /// The first row of the first page echoes the column names for SELECT
    /// results and is dropped.
    async fn get_query_results(&self, query_id: &str, max_rows: Option<usize>) -> Result<ResultSet> {
        let mut columns: Vec<Column> = Vec::new();
        let mut rows: Vec<Vec<Option<String>>> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut first_page = true;

        loop {
            // One extra row on the first page covers the header echo.
            let page_size = max_rows
                .map(|n| (n.saturating_sub(rows.len()) + usize::from(first_page)).min(MAX_PAGE_SIZE))
                .unwrap_or(MAX_PAGE_SIZE);

            let output = self
                .client
                .get_query_results()
                .query_execution_id(query_id)
                .set_next_token(next_token.take())
                .max_results(page_size.max(1) as i32)
                .send()
                .await
                .map_err(sdk_err)?;

            let result_set = output
                .result_set()
                .ok_or_else(|| DbToolsError::AwsSdk("No ResultSet in response".into()))?;

            if first_page {
                columns = result_set
                    .result_set_metadata()
                    .map(|meta| {
                        meta.column_info()
                            .iter()
                            .map(|ci| Column::new(ci.name(), ci.r#type()))
                            .collect()
                    })
                    .unwrap_or_default();
            }

            for (i, row) in result_set.rows().iter().enumerate() {
                let values: Vec<Option<String>> = row
                    .data()
                    .iter()
                    .map(|datum| datum.var_char_value().map(String::from))
                    .collect();

                let is_header = first_page
                    && i == 0
                    && !columns.is_empty()
                    && values
                        .iter()
                        .zip(&columns)
                        .all(|(v, c)| v.as_deref() == Some(c.name.as_str()));
                if !is_header {
                    rows.push(values);
                }
            }
            first_page = false;

            next_token = output.next_token().map(String::from);
            let full = max_rows.is_some_and(|n| rows.len() >= n);
            if next_token.is_none() || full {
                break;
            }
        }

        if let Some(n) = max_rows {
            rows.truncate(n);
        }

        debug!(
            columns = columns.len(),
            rows = rows.len(),
            query_id = %query_id,
            "Fetched query results"
        );

        Ok(ResultSet { columns, rows })
    }

    async fn get_work_group(&self, name: &str) -> Result<WorkGroup> {
        let resp = self
            .client
            .get_work_group()
            .work_group(name)
            .send()
            .await
            .map_err(sdk_err)?;

        let wg = resp
            .work_group()
            .ok_or_else(|| DbToolsError::NotFound(format!("workgroup {name}")))?;
        let config = wg.configuration();

        Ok(WorkGroup {
            name: wg.name().to_string(),
            state: wg.state().map(|s| s.as_str().to_string()),
            description: wg.description().map(String::from),
            output_location: config
                .and_then(|c| c.result_configuration())
                .and_then(|rc| rc.output_location())
                .map(String::from),
            enforce_configuration: config
                .and_then(|c| c.enforce_work_group_configuration())
                .unwrap_or(false),
        })
    }
}
