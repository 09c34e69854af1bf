pub mod aws;
pub mod config;
pub mod error;
pub mod execution;
pub mod identity;
pub mod injector;
pub mod result;
pub mod services;
pub mod sql;
pub mod template;
pub mod tools;
pub mod types;

pub use config::AthenaConfig;
pub use error::{DbToolsError, Result};
pub use identity::{default_user_rules, UserIdResolver, UserRule};
pub use injector::{Caller, OperationKind, ParamInjector, Prepared, QueryParams};
pub use result::{Column, QueryExecution, QueryResult, QueryState};
pub use services::{Backend, Connector, SessionOptions, TableColumn, WorkGroup};
pub use sql::{check_sql, clean_query, replace_temp_database_name_reference, split_queries, FormatOptions};
pub use template::{get_sql_from_file, render_sql_template};
pub use tools::{AthenaQueryResponse, AthenaTools};
pub use types::athena_type_to_etl;
