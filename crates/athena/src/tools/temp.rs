use dbtools_core::{s3_path_join, S3Uri};
use tracing::info;

use super::AthenaTools;
use crate::error::{DbToolsError, Result};
use crate::execution::check_identifier;
use crate::injector::{Caller, OperationKind, Prepared, QueryParams};
use crate::sql::{check_sql, is_placeholder};

/// Directory under the caller's output dir that holds temp table data.
const TEMP_DB_DIR: &str = "__athena_temp_db__/";

impl AthenaTools {
    /// Create `database` unless it exists. Returns whether it was created.
    pub async fn create_database(&self, database: &str, params: QueryParams) -> Result<bool> {
        check_identifier("database", database)?;
        let prepared = self.prepare(OperationKind::CreateDatabase, params).await?;

        if prepared.backend.catalog.database_exists(database).await? {
            return Ok(false);
        }

        let caller = self.injector.caller(&prepared.backend).await?;
        let mut create = prepared.clone();
        create.sql = Some(format!("CREATE DATABASE IF NOT EXISTS {database}"));
        create.s3_output = Some(caller.output_dir);
        self.submit_and_wait(&create).await?;

        info!(database = %database, "Created database");
        Ok(true)
    }

    /// Create the caller's temporary database if missing and return its
    /// name.
    ///
    /// `temp_db_name` of `None` or `__temp__` means the name derived from
    /// the caller's identity. This is the one operation that runs in a
    /// caller-supplied session when given one.
    pub async fn create_temp_database(&self, temp_db_name: Option<&str>, params: QueryParams) -> Result<String> {
        let prepared = self.prepare(OperationKind::CreateTempDatabase, params).await?;
        let mut caller = self.injector.caller(&prepared.backend).await?;

        if let Some(name) = temp_db_name.filter(|n| !is_placeholder(n.trim())) {
            caller.temp_database = name.trim().to_string();
        }

        self.injector
            .ensure_temp_database(&prepared.backend, &caller)
            .await?;
        Ok(caller.temp_database)
    }

    /// Materialise a SELECT as Parquet table `table_name` in the caller's
    /// temporary database, replacing any earlier table of that name.
    ///
    /// Returns the qualified table name.
    pub async fn create_temp_table(&self, sql: &str, table_name: &str, params: QueryParams) -> Result<String> {
        check_identifier("table", table_name)?;
        let prepared = self
            .prepare(OperationKind::CreateTempTable, params.with_sql(sql))
            .await?;
        let sql = prepared.sql.clone().unwrap_or_default();
        check_sql(&sql)?;

        let caller = self.injector.caller(&prepared.backend).await?;
        let db_path = s3_path_join(&caller.output_dir, &[TEMP_DB_DIR]);
        let table_path = s3_path_join(&db_path, &[&format!("{table_name}/")]);
        let qualified = format!("{}.{}", caller.temp_database, table_name);

        self.injector
            .ensure_temp_database(&prepared.backend, &caller)
            .await?;

        prepared.backend.objects.delete_prefix(&table_path).await?;

        let drop = format!("DROP TABLE IF EXISTS {qualified}");
        self.submit_and_wait(&ddl_step(&prepared, &caller, drop)).await?;
        let create = ctas(&qualified, &table_path, &sql);
        self.submit_and_wait(&ddl_step(&prepared, &caller, create)).await?;

        info!(table = %qualified, location = %table_path, "Created temporary table");
        Ok(qualified)
    }

    /// Materialise a SELECT as Parquet table `table_name` in `database`,
    /// with its data under `location`.
    ///
    /// `database` may be `__temp__` (created when missing); any other
    /// database must exist. An existing table of that name is an error.
    /// Returns the qualified table name.
    pub async fn create_table(
        &self,
        sql: &str,
        database: &str,
        table_name: &str,
        location: &str,
        params: QueryParams,
    ) -> Result<String> {
        check_identifier("table", table_name)?;
        S3Uri::parse(location)?;
        let prepared = self
            .prepare(
                OperationKind::CreateTable,
                params.with_sql(sql).with_database(database),
            )
            .await?;
        let sql = prepared.sql.clone().unwrap_or_default();
        check_sql(&sql)?;

        let caller = self.injector.caller(&prepared.backend).await?;
        let database = prepared
            .database
            .clone()
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| DbToolsError::validation("create_table needs a database"))?;
        check_identifier("database", &database)?;

        let backend = &prepared.backend;
        if database == caller.temp_database {
            self.injector.ensure_temp_database(backend, &caller).await?;
        } else if !backend.catalog.database_exists(&database).await? {
            return Err(DbToolsError::NotFound(format!("database {database}")));
        }
        if backend.catalog.get_table(&database, table_name).await?.is_some() {
            return Err(DbToolsError::validation(format!(
                "table {database}.{table_name} already exists"
            )));
        }

        let table_path = format!("{}/", location.trim_end_matches('/'));
        let qualified = format!("{database}.{table_name}");
        let create = ctas(&qualified, &table_path, &sql);
        self.submit_and_wait(&ddl_step(&prepared, &caller, create)).await?;

        info!(table = %qualified, location = %table_path, "Created table");
        Ok(qualified)
    }

    /// Drop a table from the caller's temporary database along with its
    /// data. Returns `false` if there was no such table.
    pub async fn delete_temp_table(&self, table_name: &str, params: QueryParams) -> Result<bool> {
        let prepared = self.prepare(OperationKind::DeleteTempTable, params).await?;
        let caller = self.injector.caller(&prepared.backend).await?;
        self.drop_table_and_data(&prepared.backend, &caller.temp_database, table_name)
            .await
    }
}

/// A DDL statement run in no database context, output to the caller's dir.
fn ddl_step(prepared: &Prepared, caller: &Caller, sql: String) -> Prepared {
    let mut step = prepared.clone();
    step.sql = Some(sql);
    step.database = None;
    step.s3_output = Some(caller.output_dir.clone());
    step
}

fn ctas(qualified: &str, location: &str, select: &str) -> String {
    format!(
        "CREATE TABLE {qualified}\n\
         WITH (\n    \
             format = 'Parquet',\n    \
             parquet_compression = 'SNAPPY',\n    \
             external_location = '{location}'\n\
         )\n\
         AS {select}"
    )
}
