use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Region used when neither `AWS_REGION` nor `AWS_DEFAULT_REGION` is set.
pub const DEFAULT_AWS_REGION: &str = "eu-west-1";

/// STS rejects role session names longer than this.
const MAX_SESSION_NAME_LEN: usize = 64;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

pub fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
pub fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

pub fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

pub fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Active profile from `DBTOOLS_PROFILE`, upper-cased (empty = default).
pub fn active_profile() -> String {
    env_opt("DBTOOLS_PROFILE")
        .map(|s| s.to_uppercase())
        .unwrap_or_default()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub aws: AwsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// When `DBTOOLS_PROFILE` is set (e.g. `PROD`), every key is first looked
    /// up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        Self::for_profile(&active_profile())
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        Self {
            aws: AwsConfig::from_env_profiled(&p),
            profile: p,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  aws:         region={}, role={}",
            self.aws.region,
            self.aws.role_arn.as_deref().unwrap_or("(none)")
        );
    }
}

// ── AWS ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwsConfig {
    pub region: String,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub web_identity_token_file: Option<PathBuf>,
    pub endpoint_url: Option<String>,
}

impl AwsConfig {
    pub fn from_env_profiled(p: &str) -> Self {
        let region = profiled_env_opt(p, "AWS_REGION")
            .or_else(|| profiled_env_opt(p, "AWS_DEFAULT_REGION"))
            .unwrap_or_else(|| DEFAULT_AWS_REGION.to_string());

        Self {
            region,
            role_arn: profiled_env_opt(p, "AWS_ROLE_ARN"),
            role_session_name: profiled_env_opt(p, "AWS_ROLE_SESSION_NAME"),
            web_identity_token_file: profiled_env_opt(p, "AWS_WEB_IDENTITY_TOKEN_FILE")
                .map(PathBuf::from),
            endpoint_url: profiled_env_opt(p, "AWS_ENDPOINT_URL"),
        }
    }

    /// Session name for assumed-role credentials.
    ///
    /// An explicit `AWS_ROLE_SESSION_NAME` wins; otherwise the name is the
    /// final path segment of the role ARN (`arn:aws:iam::1:role/alpha_user_x`
    /// gives `alpha_user_x`), restricted to the characters STS accepts.
    pub fn session_name(&self) -> Option<String> {
        if let Some(name) = &self.role_session_name {
            return Some(name.clone());
        }
        let arn = self.role_arn.as_deref()?;
        let tail = arn.rsplit('/').next().unwrap_or(arn);
        let name: String = tail
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || "+=,.@_-".contains(*c))
            .take(MAX_SESSION_NAME_LEN)
            .collect();
        if name.is_empty() { None } else { Some(name) }
    }

    pub fn uses_web_identity(&self) -> bool {
        self.web_identity_token_file.is_some()
    }
}

// ── Tests ────────────────────────────────────────────────────────
