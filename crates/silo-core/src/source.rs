//! Source identity for snapshots.
//!
//! A source names what a snapshot is a snapshot *of*: a path on a host,
//! owned by a user. Two sources are equal iff all three fields match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Identity of a snapshotted directory: `(host, user, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Host the path lives on.
    pub host: String,
    /// Owning user on that host.
    pub user_name: String,
    /// Absolute path in the host's filesystem namespace.
    pub path: String,
}

impl SourceInfo {
    /// Parses a source spec.
    ///
    /// Accepts either an absolute filesystem path (host and user are
    /// filled from the supplied defaults) or the full `user@host:path`
    /// form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for relative paths or specs with
    /// empty components.
    pub fn parse(spec: &str, default_host: &str, default_user: &str) -> Result<Self> {
        if let Some((user_name, rest)) = spec.split_once('@') {
            let (host, path) = rest.split_once(':').ok_or_else(|| {
                Error::InvalidInput(format!("source {spec:?} is missing a path component"))
            })?;
            if user_name.is_empty() || host.is_empty() {
                return Err(Error::InvalidInput(format!(
                    "source {spec:?} has an empty user or host"
                )));
            }
            return Ok(Self {
                host: host.to_string(),
                user_name: user_name.to_string(),
                path: require_absolute(spec, path)?,
            });
        }

        Ok(Self {
            host: default_host.to_string(),
            user_name: default_user.to_string(),
            path: require_absolute(spec, spec)?,
        })
    }

    /// Parent source, one directory up, or `None` at the filesystem root.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let parent = parent_path(&self.path)?;
        Some(Self {
            host: self.host.clone(),
            user_name: self.user_name.clone(),
            path: parent,
        })
    }
}

impl fmt::Display for SourceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user_name, self.host, self.path)
    }
}

fn require_absolute(spec: &str, path: &str) -> Result<String> {
    if path.starts_with('/') && !path.is_empty() {
        Ok(path.to_string())
    } else {
        Err(Error::InvalidInput(format!(
            "source {spec:?} must use an absolute path"
        )))
    }
}

/// One directory up, preserving the root. `/a/b` -> `/a`, `/a` -> `/`,
/// `/` -> no parent.
fn parent_path(path: &str) -> Option<String> {
    if path == "/" {
        return None;
    }
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => Some(trimmed[..idx].to_string()),
        None => None,
    }
}
