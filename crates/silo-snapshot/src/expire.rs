//! Snapshot expiration driver.
//!
//! Resolves a selection to manifests, groups them by source, evaluates
//! each group against its effective retention policy, and (when asked)
//! deletes the manifests left without any retention reason. A source
//! whose policy cannot be resolved is reported but never deleted from.

use silo_core::SourceInfo;

use crate::error::{Result, SnapshotError};
use crate::manifest::{group_by_source, Manifest};
use crate::retention::deletion_candidates;
use crate::store::{ManifestStore, PolicyStore};

/// Which snapshots an expire invocation operates on.
#[derive(Debug, Clone)]
pub enum ExpireSelection {
    /// Every manifest in the repository.
    All,
    /// Manifests of the sources named by these path specs.
    Paths(Vec<String>),
}

/// Parameters of one expire invocation.
#[derive(Debug, Clone)]
pub struct ExpireRequest {
    /// What to operate on.
    pub selection: ExpireSelection,
    /// Keep only manifests from this host, when set.
    pub host: Option<String>,
    /// Keep only manifests from this user, when set.
    pub user: Option<String>,
    /// Actually delete; otherwise report a dry run.
    pub delete: bool,
    /// Host used when parsing path specs without an explicit host.
    pub default_host: String,
    /// User used when parsing path specs without an explicit user.
    pub default_user: String,
}

/// Per-source outcome of an expire run.
#[derive(Debug, Clone)]
pub struct SourceExpireSummary {
    /// The source.
    pub source: SourceInfo,
    /// Manifests examined for this source.
    pub total: usize,
    /// Ids lacking any retention reason, in manifest order.
    pub candidates: Vec<String>,
    /// How many of the candidates were actually deleted.
    pub deleted: usize,
    /// The effective policy could not be resolved; nothing was deleted.
    pub policy_missing: bool,
}

/// Outcome of an expire run.
#[derive(Debug, Clone, Default)]
pub struct ExpireSummary {
    /// Per-source outcomes, in group order.
    pub sources: Vec<SourceExpireSummary>,
    /// Non-fatal errors encountered along the way.
    pub errors: Vec<String>,
}

impl ExpireSummary {
    /// Total deletion candidates across all sources.
    #[must_use]
    pub fn candidate_total(&self) -> usize {
        self.sources.iter().map(|s| s.candidates.len()).sum()
    }

    /// Total manifests actually deleted.
    #[must_use]
    pub fn deleted_total(&self) -> usize {
        self.sources.iter().map(|s| s.deleted).sum()
    }
}

/// Runs one expire invocation.
///
/// # Errors
///
/// Fails on an empty selection, an unparseable path spec, or a storage
/// error while resolving and loading manifests. Policy lookup failures
/// and individual delete failures are reported in the summary instead.
pub async fn expire(
    policies: &dyn PolicyStore,
    manifests: &dyn ManifestStore,
    request: &ExpireRequest,
) -> Result<ExpireSummary> {
    let ids = resolve_selection(manifests, request).await?;
    let loaded = manifests.load(&ids).await?;
    let loaded = filter_host_and_user(loaded, request.host.as_deref(), request.user.as_deref());

    let mut summary = ExpireSummary::default();

    for mut group in group_by_source(loaded) {
        let source = group[0].source.clone();
        let mut entry = SourceExpireSummary {
            source: source.clone(),
            total: group.len(),
            candidates: Vec::new(),
            deleted: 0,
            policy_missing: false,
        };

        match policies.effective_policy(&source).await {
            Ok((policy, origin)) => {
                tracing::debug!(source = %source, origin = %origin, "resolved retention policy");
                policy.compute_retention_reasons(&mut group);
                entry.candidates = deletion_candidates(&group);

                for manifest in &group {
                    if manifest.retention_reasons.is_empty() {
                        tracing::info!(
                            source = %source,
                            id = %manifest.id,
                            start_time = %manifest.start_time,
                            "deleting snapshot"
                        );
                    } else {
                        tracing::info!(
                            source = %source,
                            id = %manifest.id,
                            start_time = %manifest.start_time,
                            reasons = %manifest.retention_reasons.join(","),
                            "keeping snapshot"
                        );
                    }
                }

                if request.delete {
                    for id in &entry.candidates {
                        match manifests.delete(id).await {
                            Ok(()) => entry.deleted += 1,
                            Err(e) => summary.errors.push(format!("delete {id}: {e}")),
                        }
                    }
                }
            }
            Err(e) => {
                // No policy, no deletion. The source still shows up in
                // the summary.
                tracing::warn!(source = %source, error = %e, "unable to determine effective policy");
                entry.policy_missing = true;
            }
        }

        summary.sources.push(entry);
    }

    Ok(summary)
}

async fn resolve_selection(
    manifests: &dyn ManifestStore,
    request: &ExpireRequest,
) -> Result<Vec<String>> {
    match &request.selection {
        ExpireSelection::All => {
            tracing::info!("scanning all active snapshots");
            manifests.list(None).await
        }
        ExpireSelection::Paths(paths) => {
            if paths.is_empty() {
                return Err(SnapshotError::EmptySelection);
            }

            let mut ids = Vec::new();
            for spec in paths {
                let source =
                    SourceInfo::parse(spec, &request.default_host, &request.default_user)
                        .map_err(|e| SnapshotError::ParseSource {
                            spec: spec.clone(),
                            message: e.to_string(),
                        })?;

                tracing::info!(source = %source, "looking for snapshots");
                let matches = manifests.list(Some(&source)).await?;
                tracing::info!(source = %source, count = matches.len(), "found snapshots");
                ids.extend(matches);
            }
            Ok(ids)
        }
    }
}

fn filter_host_and_user(
    manifests: Vec<Manifest>,
    host: Option<&str>,
    user: Option<&str>,
) -> Vec<Manifest> {
    if host.is_none() && user.is_none() {
        return manifests;
    }

    manifests
        .into_iter()
        .filter(|m| host.is_none_or(|h| m.source.host == h))
        .filter(|m| user.is_none_or(|u| m.source.user_name == u))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn manifest(id: &str, host: &str, user: &str) -> Manifest {
        Manifest {
            id: id.to_string(),
            source: SourceInfo {
                host: host.into(),
                user_name: user.into(),
                path: "/data".into(),
            },
            description: String::new(),
            start_time: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end_time: None,
            stats: crate::manifest::SnapshotStats::default(),
            incomplete_reason: String::new(),
            root_object_id: String::new(),
            retention_reasons: Vec::new(),
        }
    }

    #[test]
    fn test_filter_host_and_user() {
        let manifests = vec![
            manifest("1", "h1", "u1"),
            manifest("2", "h1", "u2"),
            manifest("3", "h2", "u1"),
        ];

        let all = filter_host_and_user(manifests.clone(), None, None);
        assert_eq!(all.len(), 3);

        let h1 = filter_host_and_user(manifests.clone(), Some("h1"), None);
        assert_eq!(h1.len(), 2);

        let h1u1 = filter_host_and_user(manifests, Some("h1"), Some("u1"));
        assert_eq!(h1u1.len(), 1);
        assert_eq!(h1u1[0].id, "1");
    }
}
