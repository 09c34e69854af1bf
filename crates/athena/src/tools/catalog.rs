use tracing::{info, warn};

use super::AthenaTools;
use crate::error::{DbToolsError, Result};
use crate::execution::check_identifier;
use crate::injector::{OperationKind, Prepared, QueryParams};
use crate::result::QueryState;
use crate::services::{Backend, TableColumn, TableInfo};

/// Storage locations are directories; deleting `s3://b/t` as a raw prefix
/// would also take `s3://b/t2`.
fn as_prefix(location: &str) -> String {
    format!("{}/", location.trim_end_matches('/'))
}

fn require_database(prepared: &Prepared) -> Result<String> {
    prepared
        .database
        .clone()
        .filter(|d| !d.trim().is_empty())
        .ok_or_else(|| {
            DbToolsError::validation(format!("{} needs a database", prepared.kind.name()))
        })
}

impl AthenaTools {
    /// Remove table data from S3, then the table from the catalog. The
    /// catalog entry stays when any object could not be deleted.
    pub(super) async fn drop_table_and_data(&self, backend: &Backend, database: &str, table: &str) -> Result<bool> {
        let Some(info) = backend.catalog.get_table(database, table).await? else {
            info!(database = %database, table = %table, "Table does not exist, nothing to delete");
            return Ok(false);
        };

        match info.location.as_deref() {
            Some(location) => {
                backend.objects.delete_prefix(&as_prefix(location)).await?;
            }
            None => warn!(database = %database, table = %table, "Table has no storage location"),
        }
        backend.catalog.delete_table(database, table).await
    }

    /// Delete a table and everything under its storage location.
    ///
    /// `database` may be `__temp__`. Returns `false` if the table did not
    /// exist.
    pub async fn delete_table_and_data(&self, table: &str, database: &str, params: QueryParams) -> Result<bool> {
        let prepared = self
            .prepare(OperationKind::DeleteTableAndData, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;
        self.drop_table_and_data(&prepared.backend, &database, table).await
    }

    /// Delete every table of `database` with its data, then the database.
    pub async fn delete_database_and_data(&self, database: &str, params: QueryParams) -> Result<bool> {
        let prepared = self
            .prepare(OperationKind::DeleteDatabaseAndData, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;
        let backend = &prepared.backend;

        if !backend.catalog.database_exists(&database).await? {
            info!(database = %database, "Database does not exist, nothing to delete");
            return Ok(false);
        }

        for table in backend.catalog.list_tables(&database).await? {
            self.drop_table_and_data(backend, &database, &table.name).await?;
        }
        backend.catalog.delete_database(&database).await
    }

    /// Delete the partitions of a table matching a catalog filter
    /// `expression`, data first. Returns how many were deleted.
    pub async fn delete_partitions_and_data(
        &self,
        database: &str,
        table: &str,
        expression: &str,
        params: QueryParams,
    ) -> Result<usize> {
        let prepared = self
            .prepare(OperationKind::DeletePartitionsAndData, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;
        let backend = &prepared.backend;

        let partitions = backend
            .catalog
            .get_partitions(&database, table, Some(expression))
            .await?;
        if partitions.is_empty() {
            return Ok(0);
        }

        for location in partitions.iter().filter_map(|p| p.location.as_deref()) {
            backend.objects.delete_prefix(&as_prefix(location)).await?;
        }

        let values: Vec<Vec<String>> = partitions.into_iter().map(|p| p.values).collect();
        backend.catalog.delete_partitions(&database, table, &values).await?;

        info!(
            database = %database,
            table = %table,
            partitions = values.len(),
            "Deleted partitions"
        );
        Ok(values.len())
    }

    /// Tables of `database` with their storage locations.
    pub async fn tables(&self, database: &str, params: QueryParams) -> Result<Vec<TableInfo>> {
        let prepared = self
            .prepare(OperationKind::Tables, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;
        prepared.backend.catalog.list_tables(&database).await
    }

    /// Columns of a table as the catalog records them, partition keys last.
    pub async fn describe_table(&self, table: &str, database: &str, params: QueryParams) -> Result<Vec<TableColumn>> {
        let prepared = self
            .prepare(OperationKind::DescribeTable, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;

        let info = prepared
            .backend
            .catalog
            .get_table(&database, table)
            .await?
            .ok_or_else(|| DbToolsError::NotFound(format!("table {database}.{table}")))?;
        Ok(info.columns)
    }

    /// The `CREATE TABLE` statement Athena reports for a table.
    pub async fn show_create_table(&self, table: &str, database: &str, params: QueryParams) -> Result<String> {
        check_identifier("table", table)?;
        let mut prepared = self
            .prepare(OperationKind::ShowCreateTable, params.with_database(database))
            .await?;
        let database = require_database(&prepared)?;
        check_identifier("database", &database)?;
        prepared.sql = Some(format!("SHOW CREATE TABLE {database}.{table}"));

        let execution = self.submit_and_wait(&prepared).await?;
        let result = self.fetch(&prepared, execution).await?;
        Ok(result.first_column().join("\n"))
    }

    /// Load partitions written outside the catalog (`MSCK REPAIR TABLE`).
    pub async fn repair_table(&self, table: &str, database: &str, params: QueryParams) -> Result<QueryState> {
        check_identifier("table", table)?;
        let mut prepared = self
            .prepare(OperationKind::RepairTable, params.with_database(database))
            .await?;
        require_database(&prepared)?;
        prepared.sql = Some(format!("MSCK REPAIR TABLE {table}"));

        let execution = self.submit_and_wait(&prepared).await?;
        info!(table = %table, query_id = %execution.query_id, "Repaired table");
        Ok(execution.state)
    }
}
