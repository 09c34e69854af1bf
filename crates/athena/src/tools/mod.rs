//! [`AthenaTools`]: the operations callers use.
//!
//! Every operation runs its parameters through the [`ParamInjector`] first,
//! then drives the collaborators in [`crate::services`].

mod catalog;
mod temp;

use std::sync::Arc;

use dbtools_core::s3_path_join;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aws::AwsConnector;
use crate::config::AthenaConfig;
use crate::error::{DbToolsError, Result};
use crate::execution::{check_identifier, poll_until_complete};
use crate::injector::{Caller, OperationKind, ParamInjector, Prepared, QueryParams};
use crate::result::{Column, QueryExecution, QueryResult};
use crate::services::{Connector, WorkGroup};
use crate::sql::{is_placeholder, split_queries};
use crate::types::athena_type_to_etl;

/// Workgroup Athena uses when none is named.
const DEFAULT_WORKGROUP: &str = "primary";

/// Output location and column metadata of a finished query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AthenaQueryResponse {
    /// S3 location of the result CSV.
    pub s3_path: String,
    pub meta: Vec<Column>,
}

/// Athena operations bound to one configuration.
pub struct AthenaTools {
    injector: ParamInjector,
}

impl AthenaTools {
    pub fn new(config: AthenaConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        Ok(Self {
            injector: ParamInjector::new(config, connector)?,
        })
    }

    /// Tools talking to AWS with credentials from `config`.
    pub fn aws(config: AthenaConfig) -> Result<Self> {
        let connector = Arc::new(AwsConnector::new(config.clone()));
        Self::new(config, connector)
    }

    pub fn config(&self) -> &AthenaConfig {
        self.injector.config()
    }

    pub fn injector(&self) -> &ParamInjector {
        &self.injector
    }

    async fn prepare(&self, kind: OperationKind, params: QueryParams) -> Result<Prepared> {
        self.injector.prepare(kind, params).await
    }

    async fn submit(&self, prepared: &Prepared) -> Result<String> {
        let request = prepared.start_query(self.config().workgroup.as_deref());
        if request.sql.trim().is_empty() {
            return Err(DbToolsError::validation("no sql to run"));
        }
        prepared.backend.queries.start_query(&request).await
    }

    async fn wait(&self, prepared: &Prepared, query_id: &str) -> Result<QueryExecution> {
        poll_until_complete(
            prepared.backend.queries.as_ref(),
            query_id,
            self.config().poll_interval(),
            prepared.timeout,
        )
        .await
    }

    async fn submit_and_wait(&self, prepared: &Prepared) -> Result<QueryExecution> {
        let query_id = self.submit(prepared).await?;
        self.wait(prepared, &query_id).await
    }

    async fn fetch(&self, prepared: &Prepared, execution: QueryExecution) -> Result<QueryResult> {
        let set = prepared
            .backend
            .queries
            .get_query_results(&execution.query_id, None)
            .await?;

        Ok(QueryResult {
            columns: set.columns,
            rows: set.rows,
            execution,
        })
    }

    /// The calling principal, its output directory and temporary database.
    pub async fn whoami(&self, params: QueryParams) -> Result<Caller> {
        let prepared = self.prepare(OperationKind::Whoami, params).await?;
        self.injector.caller(&prepared.backend).await
    }

    // ── Query execution ──────────────────────────────────────────

    /// Submit `sql` and return its execution id without waiting.
    pub async fn start_query_execution(&self, sql: &str, params: QueryParams) -> Result<String> {
        let prepared = self
            .prepare(OperationKind::StartQueryExecution, params.with_sql(sql))
            .await?;
        self.submit(&prepared).await
    }

    /// Wait for a submitted query to finish.
    ///
    /// Polls at the configured interval. When the timeout runs out the
    /// query is left running and [`DbToolsError::Timeout`] is returned.
    pub async fn wait_query(&self, query_id: &str, params: QueryParams) -> Result<QueryExecution> {
        let prepared = self.prepare(OperationKind::WaitQuery, params).await?;
        self.wait(&prepared, query_id).await
    }

    pub async fn start_query_execution_and_wait(
        &self,
        sql: &str,
        params: QueryParams,
    ) -> Result<QueryExecution> {
        let prepared = self
            .prepare(OperationKind::StartQueryExecutionAndWait, params.with_sql(sql))
            .await?;
        self.submit_and_wait(&prepared).await
    }

    pub async fn stop_query_execution(&self, query_id: &str, params: QueryParams) -> Result<()> {
        let prepared = self.prepare(OperationKind::StopQueryExecution, params).await?;
        prepared.backend.queries.stop_query(query_id).await
    }

    pub async fn get_query_execution(&self, query_id: &str, params: QueryParams) -> Result<QueryExecution> {
        let prepared = self.prepare(OperationKind::GetQueryExecution, params).await?;
        prepared.backend.queries.get_query_execution(query_id).await
    }

    /// Settings of the configured workgroup (`primary` when none is set).
    pub async fn get_work_group(&self, params: QueryParams) -> Result<WorkGroup> {
        let prepared = self.prepare(OperationKind::GetWorkGroup, params).await?;
        let name = self.config().workgroup.as_deref().unwrap_or(DEFAULT_WORKGROUP);
        prepared.backend.queries.get_work_group(name).await
    }

    // ── Reading results ──────────────────────────────────────────

    /// Run a query and collect every result row.
    pub async fn read_sql_query(&self, sql: &str, params: QueryParams) -> Result<QueryResult> {
        self.read(OperationKind::ReadSqlQuery, sql, params).await
    }

    /// Read every row of `database.table`. `database` may be `__temp__`.
    pub async fn read_sql_table(&self, table: &str, database: &str, params: QueryParams) -> Result<QueryResult> {
        check_identifier("table", table)?;
        if !is_placeholder(database) {
            check_identifier("database", database)?;
        }
        let sql = format!("SELECT * FROM {}.{table}", database.trim());
        self.read(OperationKind::ReadSqlTable, &sql, params).await
    }

    async fn read(&self, kind: OperationKind, sql: &str, params: QueryParams) -> Result<QueryResult> {
        let prepared = self.prepare(kind, params.with_sql(sql)).await?;
        let execution = self.submit_and_wait(&prepared).await?;
        let result = self.fetch(&prepared, execution).await?;

        info!(
            query_id = %result.execution.query_id,
            rows = result.row_count(),
            "Read query results"
        );
        Ok(result)
    }

    /// Run each statement of `sql` in turn, returning one result per
    /// statement.
    pub async fn read_sql_queries(&self, sql: &str, params: QueryParams) -> Result<Vec<QueryResult>> {
        let mut results = Vec::new();
        for query in split_queries(sql)? {
            results.push(self.read_sql_query(&query, params.clone()).await?);
        }
        Ok(results)
    }

    /// Column names and Athena types of a finished query.
    pub async fn get_query_columns_types(&self, query_id: &str, params: QueryParams) -> Result<Vec<Column>> {
        let prepared = self
            .prepare(OperationKind::GetQueryColumnsTypes, params)
            .await?;
        let set = prepared
            .backend
            .queries
            .get_query_results(query_id, Some(0))
            .await?;
        Ok(set.columns)
    }

    /// Run `sql` and return where its CSV output landed, with column
    /// metadata. Types are converted to ETL names unless
    /// `return_athena_types` is set.
    pub async fn get_athena_query_response(
        &self,
        sql: &str,
        return_athena_types: bool,
        params: QueryParams,
    ) -> Result<AthenaQueryResponse> {
        let mut prepared = self
            .prepare(OperationKind::GetAthenaQueryResponse, params.with_sql(sql))
            .await?;
        prepared.s3_output = prepared
            .s3_output
            .as_deref()
            .map(|dir| s3_path_join(dir, &["__athena_temp__/"]));

        let execution = self.submit_and_wait(&prepared).await?;
        let columns = prepared
            .backend
            .queries
            .get_query_results(&execution.query_id, Some(0))
            .await?
            .columns;

        let s3_path = execution.output_location.clone().ok_or_else(|| {
            DbToolsError::NotFound(format!("output location of query {}", execution.query_id))
        })?;

        let meta = if return_athena_types {
            columns
        } else {
            columns
                .into_iter()
                .map(|c| Column {
                    data_type: athena_type_to_etl(&c.data_type),
                    name: c.name,
                })
                .collect()
        };

        Ok(AthenaQueryResponse { s3_path, meta })
    }
}
