//! Parameter injection for Athena operations.
//!
//! Every public operation names an [`OperationKind`]. The kind declares
//! which optional parameters the operation takes, and [`ParamInjector`]
//! fills those in from the caller's identity before anything is sent:
//! the per-user output location, the temporary database, and the
//! `__temp__`-rewritten SQL.

use std::sync::Arc;
use std::time::Duration;

use dbtools_core::s3_path_join;
use tracing::{debug, info, warn};

use crate::config::AthenaConfig;
use crate::error::Result;
use crate::execution::{check_identifier, run_to_completion};
use crate::identity::UserIdResolver;
use crate::services::{Backend, Connector, SessionOptions, StartQuery};
use crate::sql::{is_placeholder, replace_temp_database_name_reference};

/// The optional parameters an operation takes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accepts {
    pub sql: bool,
    pub database: bool,
    pub s3_output: bool,
    pub ctas_approach: bool,
    /// A caller-built [`Backend`] is used instead of a fresh one.
    pub caller_session: bool,
}

/// Operations that go through the injector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Whoami,
    StartQueryExecution,
    StartQueryExecutionAndWait,
    StopQueryExecution,
    GetQueryExecution,
    WaitQuery,
    ReadSqlQuery,
    ReadSqlTable,
    GetQueryColumnsTypes,
    GetAthenaQueryResponse,
    ShowCreateTable,
    RepairTable,
    Tables,
    DescribeTable,
    GetWorkGroup,
    CreateDatabase,
    CreateTable,
    CreateTempDatabase,
    CreateTempTable,
    DeleteTempTable,
    DeleteTableAndData,
    DeleteDatabaseAndData,
    DeletePartitionsAndData,
}

impl OperationKind {
    pub const fn accepts(self) -> Accepts {
        const NONE: Accepts = Accepts {
            sql: false,
            database: false,
            s3_output: false,
            ctas_approach: false,
            caller_session: false,
        };

        match self {
            Self::StartQueryExecution | Self::StartQueryExecutionAndWait => Accepts {
                sql: true,
                database: true,
                s3_output: true,
                ..NONE
            },
            Self::ReadSqlQuery | Self::ReadSqlTable => Accepts {
                sql: true,
                database: true,
                s3_output: true,
                ctas_approach: true,
                ..NONE
            },
            Self::GetAthenaQueryResponse => Accepts {
                sql: true,
                s3_output: true,
                ..NONE
            },
            Self::ShowCreateTable | Self::RepairTable => Accepts {
                database: true,
                s3_output: true,
                ..NONE
            },
            Self::Tables
            | Self::DescribeTable
            | Self::DeleteTableAndData
            | Self::DeleteDatabaseAndData
            | Self::DeletePartitionsAndData => Accepts {
                database: true,
                ..NONE
            },
            Self::CreateTempTable => Accepts { sql: true, ..NONE },
            Self::CreateTable => Accepts {
                sql: true,
                database: true,
                ..NONE
            },
            Self::CreateTempDatabase => Accepts {
                caller_session: true,
                ..NONE
            },
            Self::Whoami
            | Self::GetWorkGroup
            | Self::StopQueryExecution
            | Self::GetQueryExecution
            | Self::WaitQuery
            | Self::GetQueryColumnsTypes
            | Self::CreateDatabase
            | Self::DeleteTempTable => NONE,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Whoami => "whoami",
            Self::StartQueryExecution => "start_query_execution",
            Self::StartQueryExecutionAndWait => "start_query_execution_and_wait",
            Self::StopQueryExecution => "stop_query_execution",
            Self::GetQueryExecution => "get_query_execution",
            Self::WaitQuery => "wait_query",
            Self::ReadSqlQuery => "read_sql_query",
            Self::ReadSqlTable => "read_sql_table",
            Self::GetQueryColumnsTypes => "get_query_columns_types",
            Self::GetAthenaQueryResponse => "get_athena_query_response",
            Self::ShowCreateTable => "show_create_table",
            Self::RepairTable => "repair_table",
            Self::Tables => "tables",
            Self::DescribeTable => "describe_table",
            Self::GetWorkGroup => "get_work_group",
            Self::CreateDatabase => "create_database",
            Self::CreateTable => "create_table",
            Self::CreateTempDatabase => "create_temp_database",
            Self::CreateTempTable => "create_temp_table",
            Self::DeleteTempTable => "delete_temp_table",
            Self::DeleteTableAndData => "delete_table_and_data",
            Self::DeleteDatabaseAndData => "delete_database_and_data",
            Self::DeletePartitionsAndData => "delete_partitions_and_data",
        }
    }
}

/// Caller-supplied parameters. Fields the operation does not accept are
/// left untouched.
#[derive(Clone, Default)]
pub struct QueryParams {
    pub sql: Option<String>,
    pub database: Option<String>,
    pub s3_output: Option<String>,
    pub ctas_approach: Option<bool>,
    /// Credentials and region for the session the injector builds.
    pub session: SessionOptions,
    /// A session built by the caller.
    pub backend: Option<Backend>,
    /// Wait budget, overriding the configured one.
    pub timeout: Option<Duration>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.sql = Some(sql.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_s3_output(mut self, s3_output: impl Into<String>) -> Self {
        self.s3_output = Some(s3_output.into());
        self
    }

    pub fn with_ctas_approach(mut self, ctas_approach: bool) -> Self {
        self.ctas_approach = Some(ctas_approach);
        self
    }

    pub fn with_session(mut self, session: SessionOptions) -> Self {
        self.session = session;
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Who the calling principal is, and where their things live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Raw STS user id.
    pub user_id: String,
    /// Per-user output directory, `s3://{bucket}/{user_id}/`.
    pub output_dir: String,
    /// The caller's temporary database.
    pub temp_database: String,
}

/// Parameters after injection, plus the session to run them in.
#[derive(Clone)]
pub struct Prepared {
    pub kind: OperationKind,
    pub backend: Backend,
    pub sql: Option<String>,
    pub database: Option<String>,
    pub s3_output: Option<String>,
    pub ctas_approach: Option<bool>,
    pub caller: Option<Caller>,
    pub timeout: Option<Duration>,
}

impl Prepared {
    /// The request to submit for the prepared SQL.
    pub fn start_query(&self, workgroup: Option<&str>) -> StartQuery {
        StartQuery {
            sql: self.sql.clone().unwrap_or_default(),
            database: self.database.clone(),
            output_location: self.s3_output.clone(),
            workgroup: workgroup.map(String::from),
        }
    }
}

/// Fills in session, output location, database and SQL for an operation.
pub struct ParamInjector {
    config: AthenaConfig,
    connector: Arc<dyn Connector>,
    resolver: UserIdResolver,
}

impl ParamInjector {
    pub fn new(config: AthenaConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        let resolver = config.user_resolver()?;
        Ok(Self {
            config,
            connector,
            resolver,
        })
    }

    pub fn config(&self) -> &AthenaConfig {
        &self.config
    }

    pub fn resolver(&self) -> &UserIdResolver {
        &self.resolver
    }

    /// The session for `kind`: the caller's own when the operation allows
    /// it, a fresh one from `params.session` otherwise.
    pub async fn session(&self, kind: OperationKind, params: &QueryParams) -> Result<Backend> {
        match &params.backend {
            Some(backend) if kind.accepts().caller_session => Ok(backend.clone()),
            supplied => {
                if supplied.is_some() {
                    warn!(
                        operation = kind.name(),
                        "A caller session cannot be set for this operation; it is defined by \
                         force_ec2 and region (input session ignored)"
                    );
                }
                self.connector.connect(&params.session).await
            }
        }
    }

    /// Look up the calling principal.
    pub async fn caller(&self, backend: &Backend) -> Result<Caller> {
        let user_id = backend.identity.caller_user_id().await?;
        let temp_database = self.resolver.database_name(&user_id)?;
        let output_dir = s3_path_join(&self.config.bucket_uri(), &[&format!("{user_id}/")]);
        Ok(Caller {
            user_id,
            output_dir,
            temp_database,
        })
    }

    /// Create the caller's temporary database unless it already exists.
    pub async fn ensure_temp_database(&self, backend: &Backend, caller: &Caller) -> Result<()> {
        check_identifier("database", &caller.temp_database)?;
        if backend.catalog.database_exists(&caller.temp_database).await? {
            return Ok(());
        }

        let request = StartQuery {
            sql: format!("CREATE DATABASE IF NOT EXISTS {}", caller.temp_database),
            database: None,
            output_location: Some(caller.output_dir.clone()),
            workgroup: self.config.workgroup.clone(),
        };
        run_to_completion(
            backend.queries.as_ref(),
            &request,
            self.config.poll_interval(),
            self.config.timeout(),
        )
        .await?;

        info!(database = %caller.temp_database, "Created temporary database");
        Ok(())
    }

    /// Apply the injection rules for `kind` to `params`.
    pub async fn prepare(&self, kind: OperationKind, params: QueryParams) -> Result<Prepared> {
        let accepts = kind.accepts();
        let backend = self.session(kind, &params).await?;

        let database_flag = accepts.database
            && params.database.as_deref().map_or(true, is_placeholder);

        let caller = if accepts.s3_output || accepts.sql || database_flag {
            Some(self.caller(&backend).await?)
        } else {
            None
        };

        let mut s3_output = params.s3_output;
        if accepts.s3_output {
            if s3_output.is_some() {
                warn!(
                    operation = kind.name(),
                    "s3_output cannot be set; it is generated per user (input ignored)"
                );
            }
            s3_output = caller.as_ref().map(|c| c.output_dir.clone());
        }

        let mut ctas_approach = params.ctas_approach;
        if accepts.ctas_approach && ctas_approach.is_none() {
            ctas_approach = Some(false);
        }

        let mut sql = params.sql;
        if let (Some(text), Some(c)) = (sql.as_deref(), caller.as_ref()) {
            if accepts.sql {
                sql = Some(replace_temp_database_name_reference(text, &c.temp_database)?);
            }
        }

        let mut database = params.database;
        if database_flag {
            if let Some(c) = caller.as_ref() {
                if accepts.ctas_approach && ctas_approach == Some(true) {
                    self.ensure_temp_database(&backend, c).await?;
                    database = Some(c.temp_database.clone());
                } else if database.as_deref().is_some_and(is_placeholder) {
                    database = Some(c.temp_database.clone());
                } else {
                    database = None;
                }
            }
        }

        debug!(
            operation = kind.name(),
            sql = ?sql,
            database = ?database,
            s3_output = ?s3_output,
            ctas_approach = ?ctas_approach,
            user_id = ?caller.as_ref().map(|c| c.user_id.as_str()),
            "Prepared operation parameters"
        );

        Ok(Prepared {
            kind,
            backend,
            sql,
            database,
            s3_output,
            ctas_approach,
            caller,
            timeout: params.timeout.or_else(|| self.config.timeout()),
        })
    }
}
