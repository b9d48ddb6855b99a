//! CLI command implementations.

pub mod expire;
pub mod list;

use std::sync::Arc;

use silo_core::{FilesystemStorage, Storage};
use silo_snapshot::{StorageManifestStore, StoragePolicyStore};

use crate::Config;

/// Opens the repository's manifest and policy stores.
pub(crate) fn open_stores(
    config: &Config,
) -> anyhow::Result<(StoragePolicyStore, StorageManifestStore)> {
    let storage: Arc<dyn Storage> = Arc::new(FilesystemStorage::new(&config.repository)?);
    Ok((
        StoragePolicyStore::new(storage.clone()),
        StorageManifestStore::new(storage),
    ))
}
