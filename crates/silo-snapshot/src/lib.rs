//! # silo-snapshot
//!
//! Snapshot manifests and the retention engine.
//!
//! The heart of this crate is [`RetentionPolicy::compute_retention_reasons`]:
//! given every manifest of a single source and that source's effective
//! policy, it annotates each manifest with zero or more human-readable
//! retention reasons (`latest-1`, `daily-3`, ...). A manifest left
//! without any reason is a deletion candidate. Whether candidates are
//! actually deleted is the business of the [`expire()`] driver; the
//! engine itself never destroys anything.
//!
//! Manifests are produced externally and are immutable; the engine's
//! `retention_reasons` annotation is in-memory only.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod expire;
pub mod list;
pub mod manifest;
pub mod policy;
pub mod retention;
pub mod store;

pub use error::{Result, SnapshotError};
pub use expire::{expire, ExpireRequest, ExpireSelection, ExpireSummary, SourceExpireSummary};
pub use list::{find_source_snapshots, list_snapshots, SnapshotListOptions, SourceSnapshots};
pub use manifest::{group_by_source, sort_by_time, Manifest, SnapshotStats};
pub use policy::RetentionPolicy;
pub use retention::deletion_candidates;
pub use store::{
    ManifestStore, PolicyOrigin, PolicyStore, StorageManifestStore, StoragePolicyStore,
};
