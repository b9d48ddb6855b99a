//! Snapshot listing driver.
//!
//! Resolves a user-supplied path to the deepest ancestor that has
//! snapshots and returns each source group, sorted ascending by start
//! time and decorated with retention reasons. Listing never deletes
//! anything; it exists so the retention engine can be exercised without
//! any deletion intent.

use silo_core::SourceInfo;

use crate::error::{Result, SnapshotError};
use crate::manifest::{group_by_source, sort_by_time, Manifest};
use crate::store::{ManifestStore, PolicyStore};

/// Display options for a listing.
#[derive(Debug, Clone)]
pub struct SnapshotListOptions {
    /// Cap on rows per source; the most recent rows win.
    pub max_results: usize,
    /// Show snapshots that were cut short.
    pub include_incomplete: bool,
}

impl Default for SnapshotListOptions {
    fn default() -> Self {
        Self {
            max_results: 1000,
            include_incomplete: false,
        }
    }
}

/// One source group of a listing.
#[derive(Debug, Clone)]
pub struct SourceSnapshots {
    /// The source whose snapshots follow.
    pub source: SourceInfo,
    /// Suffix between the listed source and the path the user asked
    /// about, when the walk went up.
    pub relative_path: String,
    /// The effective policy could not be resolved; reasons are empty.
    pub policy_missing: bool,
    /// Snapshots ascending by start time, reasons populated.
    pub snapshots: Vec<Manifest>,
}

/// Finds the deepest ancestor of `source` that has snapshots, walking up
/// one directory at a time.
///
/// Returns the manifest ids and the relative suffix from the listed
/// ancestor down to the path originally asked about (empty when the path
/// itself has snapshots). Both are empty when no ancestor has any.
///
/// # Errors
///
/// Returns storage errors from the listings.
pub async fn find_source_snapshots(
    manifests: &dyn ManifestStore,
    source: &SourceInfo,
) -> Result<(Vec<String>, String)> {
    let mut current = source.clone();
    let mut relative = String::new();

    loop {
        let ids = manifests.list(Some(&current)).await?;
        if !ids.is_empty() {
            return Ok((ids, relative));
        }

        tracing::debug!(source = %current, "no snapshots");

        let base = base_name(&current.path);
        let Some(parent) = current.parent() else {
            return Ok((Vec::new(), String::new()));
        };

        relative = if relative.is_empty() {
            base
        } else {
            format!("{base}/{relative}")
        };
        current = parent;
    }
}

/// Lists snapshots, grouped by source.
///
/// With no `path`, every manifest in the repository is listed. With a
/// path, the deepest snapshotted ancestor is resolved first. Retention
/// reasons are computed per group when the policy resolves; a lookup
/// failure logs a warning and the group is listed with empty reasons.
///
/// # Errors
///
/// Fails on an unparseable path spec or storage errors. Policy lookup
/// failures are reported per group instead.
pub async fn list_snapshots(
    policies: &dyn PolicyStore,
    manifests: &dyn ManifestStore,
    path: Option<&str>,
    default_host: &str,
    default_user: &str,
    options: &SnapshotListOptions,
) -> Result<Vec<SourceSnapshots>> {
    let (ids, relative_path) = match path {
        None | Some("") => (manifests.list(None).await?, String::new()),
        Some(spec) => {
            let source = SourceInfo::parse(spec, default_host, default_user).map_err(|e| {
                SnapshotError::ParseSource {
                    spec: spec.to_string(),
                    message: e.to_string(),
                }
            })?;
            find_source_snapshots(manifests, &source).await?
        }
    };

    let loaded = manifests.load(&ids).await?;
    let mut result = Vec::new();

    for mut group in group_by_source(loaded) {
        let source = group[0].source.clone();
        let mut policy_missing = false;

        match policies.effective_policy(&source).await {
            Ok((policy, _)) => policy.compute_retention_reasons(&mut group),
            Err(e) => {
                tracing::warn!(source = %source, error = %e, "unable to determine effective policy");
                policy_missing = true;
            }
        }

        sort_by_time(&mut group, false);
        if !options.include_incomplete {
            group.retain(|m| !m.is_incomplete());
        }
        if group.len() > options.max_results {
            group.drain(..group.len() - options.max_results);
        }

        result.push(SourceSnapshots {
            source,
            relative_path: relative_path.clone(),
            policy_missing,
            snapshots: group,
        });
    }

    Ok(result)
}

/// Last path component. `/a/b` -> `b`, `/` -> empty.
fn base_name(path: &str) -> String {
    path.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("/a/b"), "b");
        assert_eq!(base_name("/a"), "a");
        assert_eq!(base_name("/"), "");
    }
}
