use async_trait::async_trait;
use aws_sdk_glue::types::PartitionValueList;
use tracing::{info, warn};

use crate::error::{DbToolsError, Result};
use crate::services::{Catalog, PartitionInfo, TableColumn, TableInfo};

/// `BatchDeletePartition` accepts at most this many partitions per call.
const DELETE_PARTITION_BATCH: usize = 25;

fn sdk_err(e: impl std::fmt::Display) -> DbToolsError {
    DbToolsError::AwsSdk(e.to_string())
}

fn table_column(column: &aws_sdk_glue::types::Column, partition_key: bool) -> TableColumn {
    TableColumn {
        name: column.name().to_string(),
        data_type: column.r#type().unwrap_or_default().to_string(),
        partition_key,
        comment: column.comment().map(String::from),
    }
}

fn table_info(table: &aws_sdk_glue::types::Table) -> TableInfo {
    let sd = table.storage_descriptor();
    let data = sd.map(|sd| sd.columns()).unwrap_or_default();

    TableInfo {
        name: table.name().to_string(),
        location: sd.and_then(|sd| sd.location()).map(String::from),
        columns: data
            .iter()
            .map(|c| table_column(c, false))
            .chain(table.partition_keys().iter().map(|c| table_column(c, true)))
            .collect(),
    }
}

/// [`Catalog`] over the Glue Data Catalog API.
pub struct GlueCatalog {
    client: aws_sdk_glue::Client,
}

impl GlueCatalog {
    pub fn new(client: aws_sdk_glue::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Catalog for GlueCatalog {
    async fn database_exists(&self, database: &str) -> Result<bool> {
        match self.client.get_database().name(database).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_entity_not_found_exception()) => {
                Ok(false)
            }
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn delete_database(&self, database: &str) -> Result<bool> {
        match self.client.delete_database().name(database).send().await {
            Ok(_) => {
                info!(database = %database, "Deleted database");
                Ok(true)
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_entity_not_found_exception()) => {
                Ok(false)
            }
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<TableInfo>> {
        let mut tables = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .get_tables()
                .database_name(database)
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;

            tables.extend(resp.table_list().iter().map(table_info));

            token = resp.next_token().map(String::from);
            if token.is_none() {
                break;
            }
        }
        Ok(tables)
    }

    async fn get_table(&self, database: &str, table: &str) -> Result<Option<TableInfo>> {
        match self
            .client
            .get_table()
            .database_name(database)
            .name(table)
            .send()
            .await
        {
            Ok(resp) => Ok(resp.table().map(table_info)),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_entity_not_found_exception()) => {
                Ok(None)
            }
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn delete_table(&self, database: &str, table: &str) -> Result<bool> {
        match self
            .client
            .delete_table()
            .database_name(database)
            .name(table)
            .send()
            .await
        {
            Ok(_) => {
                info!(database = %database, table = %table, "Deleted table");
                Ok(true)
            }
            Err(e) if e.as_service_error().is_some_and(|se| se.is_entity_not_found_exception()) => {
                Ok(false)
            }
            Err(e) => Err(sdk_err(e)),
        }
    }

    async fn get_partitions(
        &self,
        database: &str,
        table: &str,
        expression: Option<&str>,
    ) -> Result<Vec<PartitionInfo>> {
        let mut partitions = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let resp = self
                .client
                .get_partitions()
                .database_name(database)
                .table_name(table)
                .set_expression(expression.map(String::from))
                .set_next_token(token.take())
                .send()
                .await
                .map_err(sdk_err)?;

            partitions.extend(resp.partitions().iter().map(|p| PartitionInfo {
                values: p.values().to_vec(),
                location: p
                    .storage_descriptor()
                    .and_then(|sd| sd.location())
                    .map(String::from),
            }));

            token = resp.next_token().map(String::from);
            if token.is_none() {
                break;
            }
        }
        Ok(partitions)
    }

    async fn delete_partitions(&self, database: &str, table: &str, partitions: &[Vec<String>]) -> Result<()> {
        let mut failed: Vec<Vec<String>> = Vec::new();

        for batch in partitions.chunks(DELETE_PARTITION_BATCH) {
            let values = batch
                .iter()
                .map(|v| {
                    PartitionValueList::builder()
                        .set_values(Some(v.clone()))
                        .build()
                        .map_err(sdk_err)
                })
                .collect::<Result<Vec<_>>>()?;

            let resp = self
                .client
                .batch_delete_partition()
                .database_name(database)
                .table_name(table)
                .set_partitions_to_delete(Some(values))
                .send()
                .await
                .map_err(sdk_err)?;

            for error in resp.errors() {
                warn!(
                    database = %database,
                    table = %table,
                    values = ?error.partition_values(),
                    reason = error
                        .error_detail()
                        .and_then(|d| d.error_message())
                        .unwrap_or_default(),
                    "Partition could not be deleted"
                );
                failed.push(error.partition_values().to_vec());
            }
        }

        if failed.is_empty() {
            Ok(())
        } else {
            Err(undeleted_partitions(database, table, &failed))
        }
    }
}

fn undeleted_partitions(database: &str, table: &str, partitions: &[Vec<String>]) -> DbToolsError {
    let listed: Vec<String> = partitions.iter().map(|v| format!("[{}]", v.join(", "))).collect();
    DbToolsError::AwsSdk(format!(
        "could not delete {} partition(s) of {database}.{table}: {}",
        partitions.len(),
        listed.join(" ")
    ))
}
