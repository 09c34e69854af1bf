use std::time::Duration;

use dbtools_core::config::{active_profile, profiled_env_opt, profiled_env_or, profiled_env_u64};
use dbtools_core::AwsConfig;
use serde::{Deserialize, Serialize};

use crate::error::{DbToolsError, Result};
use crate::identity::{default_user_rules, UserIdResolver, UserRule};

/// Bucket holding per-user query output and temp table data.
pub const DEFAULT_BUCKET: &str = "mojap-athena-query-dump";

/// Prefix for every caller's temporary database.
pub const DEFAULT_TEMP_DATABASE_PREFIX: &str = "mojap_de_temp_";

const DEFAULT_POLL_INTERVAL_MS: u64 = 250;

// ── AthenaConfig ─────────────────────────────────────────────────

/// Configuration for the Athena tooling layer.
///
/// Reads from environment variables with optional profile prefix.
/// When `DBTOOLS_PROFILE=PROD`, checks `PROD_ATHENA_BUCKET` before `ATHENA_BUCKET`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AthenaConfig {
    /// AWS settings shared with the rest of the workspace.
    pub aws: AwsConfig,
    /// AWS region for Athena, Glue and S3 calls.
    pub region: String,
    /// Bucket for query output (`s3://{bucket}/{user id}/`).
    pub bucket: String,
    /// Prefix for temporary database names.
    pub temp_database_prefix: String,
    /// Athena workgroup (service default when unset).
    pub workgroup: Option<String>,
    /// Delay between status checks while waiting on a query.
    pub poll_interval_ms: u64,
    /// Wait budget in seconds; 0 waits until the query finishes.
    pub timeout_seconds: u64,
    /// Ordered caller-identity rules.
    pub user_rules: Vec<UserRule>,
}

impl AthenaConfig {
    /// Build config from environment variables.
    ///
    /// Reads `DBTOOLS_PROFILE` to determine profile prefix.
    /// `ATHENA_REGION` falls back to the AWS region before using the default.
    pub fn from_env() -> Self {
        Self::from_env_profiled(&active_profile())
    }

    /// Build config for a specific named profile.
    pub fn from_env_profiled(profile: &str) -> Self {
        let aws = AwsConfig::from_env_profiled(profile);
        let region = profiled_env_opt(profile, "ATHENA_REGION").unwrap_or_else(|| aws.region.clone());

        Self {
            region,
            bucket: profiled_env_or(profile, "ATHENA_BUCKET", DEFAULT_BUCKET),
            temp_database_prefix: profiled_env_or(
                profile,
                "ATHENA_TEMP_DATABASE_PREFIX",
                DEFAULT_TEMP_DATABASE_PREFIX,
            ),
            workgroup: profiled_env_opt(profile, "ATHENA_WORKGROUP"),
            poll_interval_ms: profiled_env_u64(profile, "ATHENA_POLL_INTERVAL_MS", DEFAULT_POLL_INTERVAL_MS),
            timeout_seconds: profiled_env_u64(profile, "ATHENA_TIMEOUT_SECONDS", 0),
            user_rules: default_user_rules(),
            aws,
        }
    }

    /// Check the settings every operation depends on.
    pub fn validate(&self) -> Result<()> {
        if self.bucket.trim().is_empty() {
            return Err(DbToolsError::validation(
                "missing required configuration: ATHENA_BUCKET",
            ));
        }
        if self.temp_database_prefix.trim().is_empty() {
            return Err(DbToolsError::validation(
                "missing required configuration: ATHENA_TEMP_DATABASE_PREFIX",
            ));
        }
        if self.aws.uses_web_identity() && self.aws.role_arn.is_none() {
            return Err(DbToolsError::validation(
                "missing required configuration: AWS_ROLE_ARN (needed with AWS_WEB_IDENTITY_TOKEN_FILE)",
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Default wait budget, `None` meaning unbounded.
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_seconds > 0).then(|| Duration::from_secs(self.timeout_seconds))
    }

    pub fn user_resolver(&self) -> Result<UserIdResolver> {
        UserIdResolver::new(&self.user_rules, &self.temp_database_prefix)
    }

    /// Base output location: `s3://{bucket}`.
    pub fn bucket_uri(&self) -> String {
        format!("s3://{}", self.bucket.trim_matches('/'))
    }

    /// Config with fixed values, for tests and embedding.
    pub fn with_bucket(bucket: &str) -> Self {
        Self {
            aws: AwsConfig {
                region: dbtools_core::config::DEFAULT_AWS_REGION.to_string(),
                role_arn: None,
                role_session_name: None,
                web_identity_token_file: None,
                endpoint_url: None,
            },
            region: dbtools_core::config::DEFAULT_AWS_REGION.to_string(),
            bucket: bucket.to_string(),
            temp_database_prefix: DEFAULT_TEMP_DATABASE_PREFIX.to_string(),
            workgroup: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_seconds: 0,
            user_rules: default_user_rules(),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
