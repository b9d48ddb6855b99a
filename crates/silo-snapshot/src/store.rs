//! Manifest and policy stores.
//!
//! The drivers consume these as capability sets; tests substitute
//! map-backed storages. The storage-backed implementations persist JSON
//! documents in any [`Storage`], keyed under flat `manifest-` /
//! `policy-` prefixes.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use silo_core::storage::{Storage, LENGTH_TO_END};
use silo_core::SourceInfo;

use crate::error::{Result, SnapshotError};
use crate::manifest::Manifest;
use crate::policy::RetentionPolicy;

/// Prefix for persisted manifest documents.
const MANIFEST_PREFIX: &str = "manifest-";

/// Block id of the repository-wide fallback policy.
const GLOBAL_POLICY_ID: &str = "policy-global";

/// Where an effective policy came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyOrigin {
    /// A policy document defined for the exact source.
    Source,
    /// The repository-wide fallback document.
    Global,
    /// The built-in policy; no document exists.
    Default,
}

impl fmt::Display for PolicyOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => f.write_str("source"),
            Self::Global => f.write_str("global"),
            Self::Default => f.write_str("default"),
        }
    }
}

/// Store of snapshot manifests.
#[async_trait]
pub trait ManifestStore: Send + Sync {
    /// Lists manifest ids, optionally restricted to an exact source.
    async fn list(&self, source: Option<&SourceInfo>) -> Result<Vec<String>>;

    /// Loads manifests in the order the ids are given.
    async fn load(&self, ids: &[String]) -> Result<Vec<Manifest>>;

    /// Deletes a manifest.
    async fn delete(&self, id: &str) -> Result<()>;
}

/// Resolver of effective retention policies.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    /// The policy in effect for a source, and where it came from.
    async fn effective_policy(&self, source: &SourceInfo)
        -> Result<(RetentionPolicy, PolicyOrigin)>;
}

/// [`ManifestStore`] over a [`Storage`], one JSON document per manifest.
pub struct StorageManifestStore {
    storage: Arc<dyn Storage>,
}

impl StorageManifestStore {
    /// Creates a store over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Persists a manifest. Manifest ids must be path-safe when the
    /// backing storage requires it.
    ///
    /// # Errors
    ///
    /// Returns a storage or serialization error.
    pub async fn put(&self, manifest: &Manifest) -> Result<()> {
        let data = serde_json::to_vec(manifest).map_err(|e| SnapshotError::Serialization {
            message: format!("unable to encode manifest {}: {e}", manifest.id),
        })?;
        self.storage
            .put_block(&manifest_block_id(&manifest.id), Bytes::from(data))
            .await?;
        Ok(())
    }

    async fn load_one(&self, id: &str) -> Result<Manifest> {
        let data = match self
            .storage
            .get_block(&manifest_block_id(id), 0, LENGTH_TO_END)
            .await
        {
            Ok(data) => data,
            Err(e) if e.is_not_found() => {
                return Err(SnapshotError::ManifestNotFound { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&data).map_err(|e| SnapshotError::Serialization {
            message: format!("unable to parse manifest {id}: {e}"),
        })
    }
}

fn manifest_block_id(id: &str) -> String {
    format!("{MANIFEST_PREFIX}{id}")
}

#[async_trait]
impl ManifestStore for StorageManifestStore {
    async fn list(&self, source: Option<&SourceInfo>) -> Result<Vec<String>> {
        let metas = self.storage.list_blocks(MANIFEST_PREFIX).await?;

        let mut ids = Vec::with_capacity(metas.len());
        for meta in metas {
            let Some(id) = meta.id.strip_prefix(MANIFEST_PREFIX) else {
                continue;
            };

            match source {
                None => ids.push(id.to_string()),
                Some(want) => {
                    // Source filtering needs the document; listings carry
                    // no source metadata.
                    let manifest = self.load_one(id).await?;
                    if manifest.source == *want {
                        ids.push(id.to_string());
                    }
                }
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn load(&self, ids: &[String]) -> Result<Vec<Manifest>> {
        let mut manifests = Vec::with_capacity(ids.len());
        for id in ids {
            manifests.push(self.load_one(id).await?);
        }
        Ok(manifests)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.storage.delete_block(&manifest_block_id(id)).await?;
        Ok(())
    }
}

/// [`PolicyStore`] over a [`Storage`].
///
/// Resolution order: a document for the exact source, then the global
/// document, then [`RetentionPolicy::standard`].
pub struct StoragePolicyStore {
    storage: Arc<dyn Storage>,
}

impl StoragePolicyStore {
    /// Creates a store over the given storage.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Writes the policy document for a source, or the global fallback
    /// when `source` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Serialization`] for invalid policies and
    /// storage errors from the write.
    pub async fn set_policy(
        &self,
        source: Option<&SourceInfo>,
        policy: &RetentionPolicy,
    ) -> Result<()> {
        if let Some(message) = policy.validate() {
            return Err(SnapshotError::Serialization {
                message: format!("invalid policy: {message}"),
            });
        }

        let id = source.map_or_else(|| GLOBAL_POLICY_ID.to_string(), policy_block_id);
        let data = serde_json::to_vec(policy).map_err(|e| SnapshotError::Serialization {
            message: format!("unable to encode policy: {e}"),
        })?;
        self.storage.put_block(&id, Bytes::from(data)).await?;
        Ok(())
    }

    async fn read_policy(&self, id: &str) -> Result<Option<RetentionPolicy>> {
        match self.storage.get_block(id, 0, LENGTH_TO_END).await {
            Ok(data) => {
                let policy =
                    serde_json::from_slice(&data).map_err(|e| SnapshotError::Serialization {
                        message: format!("unable to parse policy {id}: {e}"),
                    })?;
                Ok(Some(policy))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

/// Policy documents are keyed by the hex of the source identity so the
/// id stays safe for path-based storages.
fn policy_block_id(source: &SourceInfo) -> String {
    let rendered = source.to_string();
    let mut id = String::with_capacity(7 + rendered.len() * 2);
    id.push_str("policy-");
    for byte in rendered.bytes() {
        let _ = write!(id, "{byte:02x}");
    }
    id
}

#[async_trait]
impl PolicyStore for StoragePolicyStore {
    async fn effective_policy(
        &self,
        source: &SourceInfo,
    ) -> Result<(RetentionPolicy, PolicyOrigin)> {
        if let Some(policy) = self.read_policy(&policy_block_id(source)).await? {
            return Ok((policy, PolicyOrigin::Source));
        }
        if let Some(policy) = self.read_policy(GLOBAL_POLICY_ID).await? {
            return Ok((policy, PolicyOrigin::Global));
        }
        Ok((RetentionPolicy::standard(), PolicyOrigin::Default))
    }
}
