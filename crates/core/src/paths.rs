//! S3 URI helpers.
//!
//! Paths are handled as plain `s3://bucket/key` strings at the API surface;
//! [`S3Uri`] splits them into bucket and key for SDK calls.

use std::fmt;

use thiserror::Error;
use url::Url;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum S3UriError {
    #[error("invalid S3 URI {0:?}: {1}")]
    Invalid(String, String),

    #[error("unsupported scheme {scheme:?} in {uri:?} (expected s3)")]
    Scheme { uri: String, scheme: String },
}

/// Join path segments onto an S3 base, URL-path style.
///
/// Redundant slashes between segments are collapsed and empty segments are
/// skipped. A trailing slash on the last non-empty segment is kept, so
/// directory-style prefixes stay directory-style.
pub fn s3_path_join(base: &str, parts: &[&str]) -> String {
    let mut out = base.trim_end_matches('/').to_string();
    let mut trailing = base.ends_with('/') && !base.ends_with("://");

    for part in parts {
        let trimmed = part.trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        out.push('/');
        out.push_str(trimmed);
        trailing = part.ends_with('/');
    }

    if trailing {
        out.push('/');
    }
    out
}

/// A parsed `s3://bucket/key` location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    /// Object key or prefix, without a leading slash. May be empty.
    pub key: String,
}

impl S3Uri {
    pub fn parse(uri: &str) -> Result<Self, S3UriError> {
        let url = Url::parse(uri).map_err(|e| S3UriError::Invalid(uri.into(), e.to_string()))?;

        if !matches!(url.scheme(), "s3" | "s3a") {
            return Err(S3UriError::Scheme {
                uri: uri.into(),
                scheme: url.scheme().into(),
            });
        }

        let bucket = url
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| S3UriError::Invalid(uri.into(), "missing bucket".into()))?
            .to_string();

        // Take the key from the raw text: Url would percent-encode it.
        let after_scheme = &uri[url.scheme().len() + 3..];
        let key = after_scheme
            .split_once('/')
            .map(|(_, k)| k.to_string())
            .unwrap_or_default();

        Ok(Self { bucket, key })
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}
