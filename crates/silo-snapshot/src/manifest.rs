//! Snapshot manifests.
//!
//! A manifest describes one snapshot of one source. Manifests are
//! immutable on disk; `retention_reasons` is a computed, in-memory
//! annotation that is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use silo_core::SourceInfo;

/// Aggregate statistics captured when the snapshot was taken.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    /// Total size of all files in the snapshot, in bytes.
    #[serde(default)]
    pub total_file_size: i64,
    /// Number of files.
    #[serde(default)]
    pub file_count: u64,
    /// Number of directories.
    #[serde(default)]
    pub dir_count: u64,
}

/// One snapshot of one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Manifest id (opaque string, unique within the repository).
    pub id: String,
    /// What this is a snapshot of.
    pub source: SourceInfo,
    /// Free-form description.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// When the snapshot started.
    pub start_time: DateTime<Utc>,
    /// When the snapshot finished, if it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// Aggregate statistics.
    #[serde(default)]
    pub stats: SnapshotStats,
    /// Why the snapshot is incomplete; empty when complete.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub incomplete_reason: String,
    /// Root of the snapshotted tree (opaque pointer).
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub root_object_id: String,
    /// Why this snapshot is being kept; empty means deletion candidate.
    ///
    /// Computed by the retention engine, never persisted.
    #[serde(skip)]
    pub retention_reasons: Vec<String>,
}

impl Manifest {
    /// Whether the snapshot was cut short.
    #[must_use]
    pub fn is_incomplete(&self) -> bool {
        !self.incomplete_reason.is_empty()
    }
}

/// Groups manifests by source, preserving first-appearance order of the
/// sources and the relative order of manifests within each group.
#[must_use]
pub fn group_by_source(manifests: Vec<Manifest>) -> Vec<Vec<Manifest>> {
    let mut groups: Vec<Vec<Manifest>> = Vec::new();

    for manifest in manifests {
        match groups
            .iter_mut()
            .find(|g| g[0].source == manifest.source)
        {
            Some(group) => group.push(manifest),
            None => groups.push(vec![manifest]),
        }
    }

    groups
}

/// Sorts manifests by start time (descending when `reverse` is set),
/// breaking ties by id so the order is deterministic.
pub fn sort_by_time(manifests: &mut [Manifest], reverse: bool) {
    if reverse {
        manifests.sort_by(|a, b| {
            b.start_time
                .cmp(&a.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
    } else {
        manifests.sort_by(|a, b| {
            a.start_time
                .cmp(&b.start_time)
                .then_with(|| a.id.cmp(&b.id))
        });
    }
}
