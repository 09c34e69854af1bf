//! Caller identity → temporary database name.
//!
//! STS reports the caller as `<role id>:<principal>`. The principal is
//! matched against an ordered list of [`UserRule`]s; the first match wins
//! and may strip a pattern from the name. The cleaned name is prefixed to
//! form the caller's scratch database.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DbToolsError, Result};

/// One identity rule: a principal matching `pattern` is accepted, after
/// removing the first match of `strip` (if any).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRule {
    pub pattern: String,
    #[serde(default)]
    pub strip: Option<String>,
}

impl UserRule {
    pub fn new(pattern: &str, strip: Option<&str>) -> Self {
        Self {
            pattern: pattern.to_string(),
            strip: strip.map(String::from),
        }
    }
}

/// Default rules, in evaluation order. The email rule must come before the
/// numeric rule so `12345@domain` is treated as an email.
pub fn default_user_rules() -> Vec<UserRule> {
    vec![
        UserRule::new(r"^alpha_user_", None),
        UserRule::new(r"@[a-z0-9.-]+\.[a-z]+$", Some(r"@.*$")),
        UserRule::new(r"^botocore-session-\d+$", Some(r"^botocore-session-")),
        UserRule::new(r"^\d+", None),
    ]
}

#[derive(Debug, Clone)]
struct CompiledRule {
    pattern: Regex,
    strip: Option<Regex>,
}

/// Compiled rules plus the database prefix.
#[derive(Debug, Clone)]
pub struct UserIdResolver {
    rules: Vec<CompiledRule>,
    prefix: String,
}

impl UserIdResolver {
    pub fn new(rules: &[UserRule], prefix: &str) -> Result<Self> {
        let compile = |p: &str| {
            Regex::new(p).map_err(|e| DbToolsError::validation(format!("invalid user rule {p:?}: {e}")))
        };

        let rules = rules
            .iter()
            .map(|rule| {
                Ok(CompiledRule {
                    pattern: compile(&rule.pattern)?,
                    strip: rule.strip.as_deref().map(compile).transpose()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            rules,
            prefix: prefix.to_string(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Normalised user name for a caller id, without the database prefix.
    ///
    /// Fails with a validation error when no rule matches or nothing is
    /// left after cleaning.
    pub fn user_name(&self, user_id: &str) -> Result<String> {
        let principal = user_id.rsplit(':').next().unwrap_or(user_id).to_lowercase();

        let rule = self
            .rules
            .iter()
            .find(|r| r.pattern.is_match(&principal))
            .ok_or_else(|| invalid_user(user_id))?;

        let stripped = match &rule.strip {
            Some(strip) => strip.replace(&principal, "").into_owned(),
            None => principal,
        };

        let name: String = stripped
            .replace('-', "_")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();

        if name.is_empty() {
            return Err(invalid_user(user_id));
        }
        Ok(name)
    }

    /// The caller's temporary database: prefix + normalised user name.
    pub fn database_name(&self, user_id: &str) -> Result<String> {
        Ok(format!("{}{}", self.prefix, self.user_name(user_id)?))
    }
}

fn invalid_user(user_id: &str) -> DbToolsError {
    DbToolsError::validation(format!("invalid user: {user_id:?}"))
}
