//! Seams to the AWS services this crate drives.
//!
//! The orchestrators only talk to these traits. [`crate::aws`] implements
//! them over the AWS SDK; tests implement them in memory.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::result::{Column, QueryExecution};

/// How credentials and region are chosen for a batch of calls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// Take credentials from the EC2 instance metadata service.
    pub force_ec2: bool,
    /// Region override; the configured region otherwise.
    pub region: Option<String>,
}

/// A query submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartQuery {
    pub sql: String,
    pub database: Option<String>,
    pub output_location: Option<String>,
    pub workgroup: Option<String>,
}

/// Columns and data rows of a finished query, header row excluded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// Query execution service (Athena).
#[async_trait]
pub trait QueryService: Send + Sync {
    /// Submit a query; returns its execution id.
    async fn start_query(&self, request: &StartQuery) -> Result<String>;

    async fn get_query_execution(&self, query_id: &str) -> Result<QueryExecution>;

    async fn stop_query(&self, query_id: &str) -> Result<()>;

    /// Fetch results, at most `max_rows` data rows when given.
    async fn get_query_results(&self, query_id: &str, max_rows: Option<usize>) -> Result<ResultSet>;

    async fn get_work_group(&self, name: &str) -> Result<WorkGroup>;
}

/// Settings of an Athena workgroup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkGroup {
    pub name: String,
    /// `ENABLED` or `DISABLED`.
    pub state: Option<String>,
    pub description: Option<String>,
    /// Result location queries in this workgroup default to.
    pub output_location: Option<String>,
    /// Workgroup settings override client-side settings.
    pub enforce_configuration: bool,
}

/// Object store (S3) addressed by `s3://bucket/key` URIs.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Delete every object under `uri`. A missing prefix deletes nothing.
    /// Fails, naming the keys, when any object could not be deleted.
    async fn delete_prefix(&self, uri: &str) -> Result<usize>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    pub name: String,
    pub location: Option<String>,
    /// Data columns, then partition keys.
    pub columns: Vec<TableColumn>,
}

impl TableInfo {
    pub fn new(name: impl Into<String>, location: Option<String>) -> Self {
        Self {
            name: name.into(),
            location,
            columns: Vec::new(),
        }
    }
}

/// A column as the catalog describes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColumn {
    pub name: String,
    pub data_type: String,
    pub partition_key: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionInfo {
    pub values: Vec<String>,
    pub location: Option<String>,
}

/// Data catalog (Glue).
///
/// Deletes report `false` instead of failing when the entry is absent.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn database_exists(&self, database: &str) -> Result<bool>;

    async fn delete_database(&self, database: &str) -> Result<bool>;

    async fn list_tables(&self, database: &str) -> Result<Vec<TableInfo>>;

    async fn get_table(&self, database: &str, table: &str) -> Result<Option<TableInfo>>;

    async fn delete_table(&self, database: &str, table: &str) -> Result<bool>;

    /// Partitions matching a catalog filter `expression` (all when `None`).
    async fn get_partitions(
        &self,
        database: &str,
        table: &str,
        expression: Option<&str>,
    ) -> Result<Vec<PartitionInfo>>;

    /// Fails, naming the partitions, when any could not be deleted.
    async fn delete_partitions(&self, database: &str, table: &str, partitions: &[Vec<String>]) -> Result<()>;
}

/// Who is calling (STS).
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// The caller's user id, e.g. `AROAEXAMPLE:alpha_user_bob`.
    async fn caller_user_id(&self) -> Result<String>;
}

/// The collaborators for one session.
#[derive(Clone)]
pub struct Backend {
    pub queries: Arc<dyn QueryService>,
    pub objects: Arc<dyn ObjectStore>,
    pub catalog: Arc<dyn Catalog>,
    pub identity: Arc<dyn IdentityService>,
}

/// Builds a [`Backend`] for a session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, session: &SessionOptions) -> Result<Backend>;
}
