//! dbtools: run Athena queries against a per-user temporary database.
//!
//! `__temp__` in SQL stands for the caller's temporary database, derived
//! from their AWS identity.

use std::io::Read;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::info;

use dbtools_athena::{
    check_sql, get_sql_from_file, render_sql_template, replace_temp_database_name_reference,
    AthenaConfig, AthenaTools, QueryParams, SessionOptions,
};
use dbtools_core::Config;

// ── CLI ─────────────────────────────────────────────────────────────

/// Athena convenience tooling with per-user temporary databases.
#[derive(Parser, Debug)]
#[command(name = "dbtools", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render a SQL template file.
    Render {
        path: PathBuf,
        #[command(flatten)]
        vars: TemplateVars,
    },

    /// Check that SQL is a single SELECT statement.
    Check {
        #[command(flatten)]
        input: SqlInput,
    },

    /// Replace `__temp__` references with a database name.
    Rewrite {
        /// Database to substitute.
        #[arg(long)]
        database: String,
        #[command(flatten)]
        input: SqlInput,
    },

    /// Show the caller's user id and temporary database.
    Whoami {
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Run a query and print the results.
    Query {
        /// Database context; `__temp__` for the temporary database.
        #[arg(long)]
        database: Option<String>,
        /// Stop waiting after this many seconds.
        #[arg(long)]
        timeout: Option<u64>,
        #[command(flatten)]
        input: SqlInput,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Materialise a SELECT as a table in the temporary database.
    CreateTempTable {
        /// Table name.
        #[arg(long)]
        table: String,
        #[command(flatten)]
        input: SqlInput,
        #[command(flatten)]
        session: SessionArgs,
    },

    /// Drop a table from the temporary database along with its data.
    DeleteTempTable {
        /// Table name.
        #[arg(long)]
        table: String,
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// SQL from the command line, a file, or stdin.
#[derive(Args, Debug)]
struct SqlInput {
    /// SQL text (stdin when neither this nor --file is given).
    sql: Option<String>,
    /// Read SQL from a file.
    #[arg(long, conflicts_with = "sql")]
    file: Option<PathBuf>,
    #[command(flatten)]
    vars: TemplateVars,
}

#[derive(Args, Debug)]
struct TemplateVars {
    /// Template variable as key=value (repeatable).
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,
    /// Template variables as a JSON object.
    #[arg(long = "vars-json", value_name = "JSON")]
    json: Option<String>,
}

#[derive(Args, Debug)]
struct SessionArgs {
    /// Take credentials from the EC2 instance metadata service.
    #[arg(long, env = "DBTOOLS_FORCE_EC2")]
    force_ec2: bool,
    /// Region override.
    #[arg(long)]
    region: Option<String>,
}

impl SessionArgs {
    fn params(&self) -> QueryParams {
        QueryParams::new().with_session(SessionOptions {
            force_ec2: self.force_ec2,
            region: self.region.clone(),
        })
    }
}

impl TemplateVars {
    /// Collected variables, `None` when none were given.
    fn to_value(&self) -> anyhow::Result<Option<Value>> {
        let mut map = match &self.json {
            Some(json) => match serde_json::from_str(json).context("invalid --vars-json")? {
                Value::Object(map) => map,
                _ => bail!("--vars-json must be a JSON object"),
            },
            None => Map::new(),
        };

        for pair in &self.vars {
            let Some((key, value)) = pair.split_once('=') else {
                bail!("invalid --var {pair:?}, expected KEY=VALUE");
            };
            map.insert(key.trim().to_string(), Value::String(value.to_string()));
        }

        Ok((!map.is_empty()).then_some(Value::Object(map)))
    }
}

impl SqlInput {
    fn read(&self) -> anyhow::Result<String> {
        let vars = self.vars.to_value()?;

        if let Some(path) = &self.file {
            return get_sql_from_file(path, vars.as_ref())
                .with_context(|| format!("failed to read {}", path.display()));
        }

        let sql = match &self.sql {
            Some(sql) => sql.clone(),
            None => {
                let mut buf = String::new();
                std::io::stdin()
                    .read_to_string(&mut buf)
                    .context("failed to read SQL from stdin")?;
                buf
            }
        };

        match vars {
            Some(vars) => Ok(render_sql_template(&sql, &vars)?),
            None => Ok(sql),
        }
    }
}

fn tools() -> anyhow::Result<AthenaTools> {
    let core = Config::from_env();
    core.log_summary();

    let config = AthenaConfig::from_env_profiled(&core.profile);
    info!(
        region = %config.region,
        bucket = %config.bucket,
        prefix = %config.temp_database_prefix,
        "Athena config loaded"
    );
    AthenaTools::aws(config).context("invalid configuration")
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dbtools_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Render { path, vars } => {
            let vars = vars.to_value()?;
            print!("{}", get_sql_from_file(&path, vars.as_ref())?);
        }

        Command::Check { input } => {
            check_sql(&input.read()?)?;
            println!("ok");
        }

        Command::Rewrite { database, input } => {
            println!("{}", replace_temp_database_name_reference(&input.read()?, &database)?);
        }

        Command::Whoami { session } => {
            let caller = tools()?.whoami(session.params()).await?;
            println!("user id:        {}", caller.user_id);
            println!("output dir:     {}", caller.output_dir);
            println!("temp database:  {}", caller.temp_database);
        }

        Command::Query {
            database,
            timeout,
            input,
            session,
        } => {
            let tools = tools()?;
            let mut params = session.params();
            if let Some(database) = database {
                params = params.with_database(database);
            }
            if let Some(secs) = timeout {
                params = params.with_timeout(Duration::from_secs(secs));
            }
            let result = tools.read_sql_query(&input.read()?, params).await?;
            println!("{result}");
        }

        Command::CreateTempTable {
            table,
            input,
            session,
        } => {
            let tools = tools()?;
            let name = tools
                .create_temp_table(&input.read()?, &table, session.params())
                .await?;
            println!("created {name}");
        }

        Command::DeleteTempTable { table, session } => {
            let tools = tools()?;
            if tools.delete_temp_table(&table, session.params()).await? {
                println!("deleted {table}");
            } else {
                println!("{table} does not exist");
            }
        }
    }

    Ok(())
}
