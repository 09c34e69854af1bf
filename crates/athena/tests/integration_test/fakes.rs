//! In-memory AWS: an Athena that understands the DDL this crate emits, a
//! Glue catalog, an S3 bucket and a fixed STS identity. Every call is
//! appended to an event log.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dbtools_athena::services::{
    Backend, Catalog, Connector, IdentityService, ObjectStore, PartitionInfo, QueryService,
    ResultSet, SessionOptions, StartQuery, TableColumn, TableInfo, WorkGroup,
};
use dbtools_athena::{AthenaConfig, AthenaTools, Column, DbToolsError, QueryExecution, QueryState, Result};

pub const USER_ID: &str = "AROAEXAMPLE:alpha_user_jane";
pub const TEMP_DB: &str = "mojap_de_temp_alpha_user_jane";
pub const OUTPUT_DIR: &str = "s3://dump-bucket/AROAEXAMPLE:alpha_user_jane/";

#[derive(Default)]
struct State {
    events: Vec<String>,
    sessions: Vec<SessionOptions>,
    queries: Vec<StartQuery>,
    polls: BTreeMap<String, usize>,
    databases: BTreeSet<String>,
    tables: BTreeMap<(String, String), TableInfo>,
    partitions: BTreeMap<(String, String), Vec<PartitionInfo>>,
    objects: BTreeSet<String>,
    /// Objects S3 refuses to delete.
    stuck_objects: BTreeSet<String>,
    /// Partition values Glue refuses to delete.
    stuck_partitions: Vec<Vec<String>>,
    identity_calls: usize,
}

/// Fake AWS account shared by every session it hands out.
pub struct FakeAws {
    state: Mutex<State>,
    user_id: String,
    /// Status checks answered with RUNNING before the final state.
    pending_polls: Mutex<usize>,
    final_state: Mutex<(QueryState, Option<String>)>,
    results: Mutex<ResultSet>,
}

impl FakeAws {
    pub fn new() -> Arc<Self> {
        Self::with_user(USER_ID)
    }

    pub fn with_user(user_id: &str) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(State::default()),
            user_id: user_id.to_string(),
            pending_polls: Mutex::new(1),
            final_state: Mutex::new((QueryState::Succeeded, None)),
            results: Mutex::new(ResultSet::default()),
        })
    }

    pub fn backend(self: &Arc<Self>) -> Backend {
        Backend {
            queries: self.clone(),
            objects: self.clone(),
            catalog: self.clone(),
            identity: self.clone(),
        }
    }

    pub fn connector(self: &Arc<Self>) -> Arc<FakeConnector> {
        Arc::new(FakeConnector(self.clone()))
    }

    fn log(&self, event: String) {
        self.state.lock().unwrap().events.push(event);
    }

    // ── Arrangement ─────────────────────────────────────────────

    pub fn finish_with(&self, state: QueryState, reason: Option<&str>) {
        *self.final_state.lock().unwrap() = (state, reason.map(String::from));
    }

    pub fn never_finish(&self) {
        *self.pending_polls.lock().unwrap() = usize::MAX;
    }

    pub fn return_rows(&self, columns: &[(&str, &str)], rows: &[&[Option<&str>]]) {
        *self.results.lock().unwrap() = ResultSet {
            columns: columns.iter().map(|(n, t)| Column::new(n, t)).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|v| v.map(String::from)).collect())
                .collect(),
        };
    }

    pub fn add_database(&self, database: &str) {
        self.state.lock().unwrap().databases.insert(database.to_string());
    }

    pub fn add_table(&self, database: &str, table: &str, location: &str) {
        let mut state = self.state.lock().unwrap();
        state.databases.insert(database.to_string());
        state.tables.insert(
            (database.to_string(), table.to_string()),
            TableInfo::new(table, Some(location.to_string())),
        );
    }

    /// Record `(name, type, partition_key)` columns on an existing table.
    pub fn set_columns(&self, database: &str, table: &str, columns: &[(&str, &str, bool)]) {
        let mut state = self.state.lock().unwrap();
        if let Some(info) = state.tables.get_mut(&(database.to_string(), table.to_string())) {
            info.columns = columns
                .iter()
                .map(|(name, data_type, partition_key)| TableColumn {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                    partition_key: *partition_key,
                    comment: None,
                })
                .collect();
        }
    }

    /// Make deleting `uri` fail the way a partial `DeleteObjects` does.
    pub fn refuse_object_delete(&self, uri: &str) {
        self.state.lock().unwrap().stuck_objects.insert(uri.to_string());
    }

    /// Make deleting the partition with `values` fail.
    pub fn refuse_partition_delete(&self, values: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .stuck_partitions
            .push(values.iter().map(|v| v.to_string()).collect());
    }

    pub fn add_partition(&self, database: &str, table: &str, values: &[&str], location: &str) {
        self.state
            .lock()
            .unwrap()
            .partitions
            .entry((database.to_string(), table.to_string()))
            .or_default()
            .push(PartitionInfo {
                values: values.iter().map(|v| v.to_string()).collect(),
                location: Some(location.to_string()),
            });
    }

    pub fn put_object(&self, uri: &str) {
        self.state.lock().unwrap().objects.insert(uri.to_string());
    }

    // ── Inspection ──────────────────────────────────────────────

    pub fn events(&self) -> Vec<String> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn sessions(&self) -> Vec<SessionOptions> {
        self.state.lock().unwrap().sessions.clone()
    }

    pub fn queries(&self) -> Vec<StartQuery> {
        self.state.lock().unwrap().queries.clone()
    }

    pub fn sql_log(&self) -> Vec<String> {
        self.queries().into_iter().map(|q| q.sql).collect()
    }

    pub fn identity_calls(&self) -> usize {
        self.state.lock().unwrap().identity_calls
    }

    pub fn has_database(&self, database: &str) -> bool {
        self.state.lock().unwrap().databases.contains(database)
    }

    pub fn table(&self, database: &str, table: &str) -> Option<TableInfo> {
        self.state
            .lock()
            .unwrap()
            .tables
            .get(&(database.to_string(), table.to_string()))
            .cloned()
    }

    pub fn objects(&self) -> Vec<String> {
        self.state.lock().unwrap().objects.iter().cloned().collect()
    }

    pub fn partitions(&self, database: &str, table: &str) -> Vec<PartitionInfo> {
        self.state
            .lock()
            .unwrap()
            .partitions
            .get(&(database.to_string(), table.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Apply the catalog side effects of the DDL this crate generates.
    fn apply_ddl(&self, sql: &str) {
        let words: Vec<&str> = sql.split_whitespace().collect();
        let mut state = self.state.lock().unwrap();

        match words.as_slice() {
            ["CREATE", "DATABASE", "IF", "NOT", "EXISTS", name, ..] => {
                state.databases.insert(name.to_string());
            }
            ["DROP", "TABLE", "IF", "EXISTS", qualified, ..] => {
                if let Some((db, table)) = qualified.split_once('.') {
                    state.tables.remove(&(db.to_string(), table.to_string()));
                }
            }
            ["CREATE", "TABLE", qualified, ..] => {
                let location = sql
                    .split("external_location = '")
                    .nth(1)
                    .and_then(|rest| rest.split('\'').next())
                    .map(String::from);
                if let Some((db, table)) = qualified.split_once('.') {
                    if let Some(loc) = &location {
                        state.objects.insert(format!("{loc}part-0000.parquet"));
                    }
                    state
                        .tables
                        .insert((db.to_string(), table.to_string()), TableInfo::new(table, location));
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl QueryService for FakeAws {
    async fn start_query(&self, request: &StartQuery) -> Result<String> {
        let query_id = {
            let mut state = self.state.lock().unwrap();
            state.queries.push(request.clone());
            format!("q-{}", state.queries.len())
        };
        self.log(format!("start {query_id}: {}", request.sql));
        Ok(query_id)
    }

    async fn get_query_execution(&self, query_id: &str) -> Result<QueryExecution> {
        let index: usize = query_id
            .strip_prefix("q-")
            .and_then(|n| n.parse().ok())
            .filter(|n| *n > 0)
            .ok_or_else(|| DbToolsError::NotFound(format!("query {query_id}")))?;

        let polls = {
            let mut state = self.state.lock().unwrap();
            let polls = state.polls.entry(query_id.to_string()).or_insert(0);
            *polls += 1;
            *polls
        };

        if polls <= *self.pending_polls.lock().unwrap() {
            return Ok(QueryExecution::new(query_id, QueryState::Running));
        }

        let (final_state, reason) = self.final_state.lock().unwrap().clone();
        let request = self
            .state
            .lock()
            .unwrap()
            .queries
            .get(index - 1)
            .cloned()
            .ok_or_else(|| DbToolsError::NotFound(format!("query {query_id}")))?;
        if final_state == QueryState::Succeeded {
            self.apply_ddl(&request.sql);
        }

        let mut execution = QueryExecution::new(query_id, final_state);
        execution.state_change_reason = reason;
        execution.output_location = request
            .output_location
            .map(|dir| format!("{dir}{query_id}.csv"));
        Ok(execution)
    }

    async fn stop_query(&self, query_id: &str) -> Result<()> {
        self.log(format!("stop {query_id}"));
        Ok(())
    }

    async fn get_query_results(&self, query_id: &str, max_rows: Option<usize>) -> Result<ResultSet> {
        self.log(format!("results {query_id}"));
        let mut set = self.results.lock().unwrap().clone();
        if let Some(n) = max_rows {
            set.rows.truncate(n);
        }
        Ok(set)
    }

    async fn get_work_group(&self, name: &str) -> Result<WorkGroup> {
        self.log(format!("work_group {name}"));
        Ok(WorkGroup {
            name: name.to_string(),
            state: Some("ENABLED".to_string()),
            description: None,
            output_location: Some("s3://wg-results/".to_string()),
            enforce_configuration: false,
        })
    }
}

#[async_trait]
impl ObjectStore for FakeAws {
    async fn delete_prefix(&self, uri: &str) -> Result<usize> {
        self.log(format!("delete_prefix {uri}"));
        let mut state = self.state.lock().unwrap();
        let State {
            objects,
            stuck_objects,
            ..
        } = &mut *state;

        let before = objects.len();
        objects.retain(|o| !o.starts_with(uri) || stuck_objects.contains(o));
        let deleted = before - objects.len();

        let failed: Vec<String> = objects
            .iter()
            .filter(|o| o.starts_with(uri))
            .cloned()
            .collect();
        if failed.is_empty() {
            Ok(deleted)
        } else {
            Err(DbToolsError::AwsSdk(format!("could not delete {}", failed.join(", "))))
        }
    }
}

#[async_trait]
impl Catalog for FakeAws {
    async fn database_exists(&self, database: &str) -> Result<bool> {
        Ok(self.has_database(database))
    }

    async fn delete_database(&self, database: &str) -> Result<bool> {
        self.log(format!("delete_database {database}"));
        Ok(self.state.lock().unwrap().databases.remove(database))
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<TableInfo>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .iter()
            .filter(|((db, _), _)| db == database)
            .map(|(_, t)| t.clone())
            .collect())
    }

    async fn get_table(&self, database: &str, table: &str) -> Result<Option<TableInfo>> {
        Ok(self.table(database, table))
    }

    async fn delete_table(&self, database: &str, table: &str) -> Result<bool> {
        self.log(format!("delete_table {database}.{table}"));
        Ok(self
            .state
            .lock()
            .unwrap()
            .tables
            .remove(&(database.to_string(), table.to_string()))
            .is_some())
    }

    /// Understands `key = 'value'` filters only.
    async fn get_partitions(
        &self,
        database: &str,
        table: &str,
        expression: Option<&str>,
    ) -> Result<Vec<PartitionInfo>> {
        let all = self.partitions(database, table);
        let Some(expr) = expression else {
            return Ok(all);
        };
        let wanted = expr
            .split('=')
            .nth(1)
            .map(|v| v.trim().trim_matches('\'').to_string())
            .unwrap_or_default();
        Ok(all.into_iter().filter(|p| p.values.contains(&wanted)).collect())
    }

    async fn delete_partitions(&self, database: &str, table: &str, partitions: &[Vec<String>]) -> Result<()> {
        self.log(format!("delete_partitions {database}.{table} x{}", partitions.len()));
        let mut state = self.state.lock().unwrap();
        let stuck = state.stuck_partitions.clone();
        if let Some(existing) = state
            .partitions
            .get_mut(&(database.to_string(), table.to_string()))
        {
            existing.retain(|p| !partitions.contains(&p.values) || stuck.contains(&p.values));
        }

        let failed: Vec<&Vec<String>> = partitions.iter().filter(|p| stuck.contains(p)).collect();
        if failed.is_empty() {
            Ok(())
        } else {
            Err(DbToolsError::AwsSdk(format!("could not delete partitions {failed:?}")))
        }
    }
}

#[async_trait]
impl IdentityService for FakeAws {
    async fn caller_user_id(&self) -> Result<String> {
        self.state.lock().unwrap().identity_calls += 1;
        Ok(self.user_id.clone())
    }
}

pub struct FakeConnector(Arc<FakeAws>);

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, session: &SessionOptions) -> Result<Backend> {
        {
            let mut state = self.0.state.lock().unwrap();
            state.sessions.push(session.clone());
        }
        self.0.log("connect".to_string());
        Ok(self.0.backend())
    }
}

pub fn config() -> AthenaConfig {
    let mut config = AthenaConfig::with_bucket("dump-bucket");
    config.poll_interval_ms = 1;
    config
}

pub fn tools(aws: &Arc<FakeAws>) -> AthenaTools {
    AthenaTools::new(config(), aws.connector()).unwrap()
}
