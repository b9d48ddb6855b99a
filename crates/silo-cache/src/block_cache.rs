//! The block cache.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use silo_core::error::{Error, Result};
use silo_core::fs_storage::FilesystemStorage;
use silo_core::storage::{block_range, Storage, LENGTH_TO_END};

use crate::sweep::{run_sweeper, SweepParams};

/// Marker appended to cache keys when written to cache storage.
///
/// The rewritten key namespaces cache-written blocks away from any other
/// tenant of the cache storage and serves as the listing filter during
/// sweeps. The marker is constant, so any cache storage written by an
/// older version stays readable.
pub const CACHE_ID_SUFFIX: char = 'x';

/// Entries younger than this are never evicted unless overridden.
const DEFAULT_MIN_SWEEP_AGE: Duration = Duration::from_secs(10 * 60);

/// Pause between sweep passes unless overridden.
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

pub(crate) fn cache_block_id(cache_key: &str) -> String {
    format!("{cache_key}{CACHE_ID_SUFFIX}")
}

/// Tuning options for the block cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachingOptions {
    /// Soft ceiling for the total size of cached blocks, in bytes.
    ///
    /// The sweeper evicts oldest-first down to this ceiling, but never
    /// removes entries younger than the minimum sweep age, so the cache
    /// may temporarily exceed it.
    pub max_cache_size_bytes: u64,

    /// Directory backing the disk variant ([`BlockCache::open`]).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_directory: Option<PathBuf>,
}

/// A range-read cache over an underlying block storage.
///
/// `get_block` is safe to call from many tasks concurrently; no lock is
/// held across storage I/O. Concurrent misses on the same cache key may
/// each fetch and each write; the payloads are byte-identical and the
/// last write wins.
pub struct BlockCache {
    underlying: Arc<dyn Storage>,
    cache_storage: Arc<dyn Storage>,
    shutdown: watch::Sender<bool>,
    sweeper: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for BlockCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockCache").finish_non_exhaustive()
    }
}

impl BlockCache {
    /// Opens a disk-backed cache at `options.cache_directory`.
    ///
    /// Uses the default sweep cadence (10 minute minimum age, 1 minute
    /// interval) and otherwise behaves exactly like
    /// [`with_cache_storage`](Self::with_cache_storage).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] when no cache directory is
    /// configured, or a storage error if it cannot be created.
    pub fn open(underlying: Arc<dyn Storage>, options: CachingOptions) -> Result<Self> {
        let dir = options.cache_directory.clone().ok_or_else(|| {
            Error::InvalidInput("caching options do not specify a cache directory".into())
        })?;
        let cache_storage = Arc::new(FilesystemStorage::new(dir)?);

        Ok(Self::with_cache_storage(
            underlying,
            cache_storage,
            options,
            DEFAULT_MIN_SWEEP_AGE,
            DEFAULT_SWEEP_INTERVAL,
        ))
    }

    /// Creates a cache over an explicit cache storage and spawns the
    /// background sweeper.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn with_cache_storage(
        underlying: Arc<dyn Storage>,
        cache_storage: Arc<dyn Storage>,
        options: CachingOptions,
        min_sweep_age: Duration,
        sweep_interval: Duration,
    ) -> Self {
        let (shutdown, shutdown_rx) = watch::channel(false);
        let sweeper = tokio::spawn(run_sweeper(
            cache_storage.clone(),
            SweepParams {
                max_cache_size_bytes: options.max_cache_size_bytes,
                min_sweep_age,
                sweep_interval,
            },
            shutdown_rx,
        ));

        Self {
            underlying,
            cache_storage,
            shutdown,
            sweeper: Some(sweeper),
        }
    }

    /// Reads a range of a content-addressed block through the cache.
    ///
    /// `cache_key` is the caller-chosen cache identity;
    /// `physical_block_id` addresses the block in the underlying storage.
    /// A `length` of [`LENGTH_TO_END`] reads to the end of the block.
    ///
    /// On a miss the full block is fetched, written to cache storage
    /// under the rewritten key (best-effort: a cache write failure is
    /// logged and the read still succeeds), and the requested range is
    /// returned. [`Error::NotFound`] from the underlying storage is
    /// surfaced verbatim and nothing is cached.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidOffset`] for out-of-bounds ranges,
    /// [`Error::NotFound`] when the underlying storage lacks the block,
    /// and [`Error::Storage`] for underlying read failures.
    pub async fn get_block(
        &self,
        cache_key: &str,
        physical_block_id: &str,
        offset: i64,
        length: i64,
    ) -> Result<Bytes> {
        if offset < 0 || length < LENGTH_TO_END {
            return Err(Error::InvalidOffset(format!(
                "offset {offset} length {length}"
            )));
        }

        let cache_id = cache_block_id(cache_key);

        match self
            .cache_storage
            .get_block(&cache_id, 0, LENGTH_TO_END)
            .await
        {
            Ok(payload) => {
                tracing::debug!(cache_key, block_id = physical_block_id, "cache hit");
                return block_range(&payload, offset, length);
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                tracing::warn!(
                    cache_key,
                    error = %e,
                    "cache read failed, falling back to underlying storage"
                );
            }
        }

        let payload = self
            .underlying
            .get_block(physical_block_id, 0, LENGTH_TO_END)
            .await?;
        let requested = block_range(&payload, offset, length)?;

        if let Err(e) = self.cache_storage.put_block(&cache_id, payload).await {
            tracing::warn!(
                cache_key,
                block_id = physical_block_id,
                error = %e,
                "unable to write cached block"
            );
        }

        Ok(requested)
    }

    /// Stops the background sweeper and releases resources.
    ///
    /// Waits for the sweeper to finish; no sweep survives the cache.
    pub async fn close(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(sweeper) = self.sweeper.take() {
            let _ = sweeper.await;
        }
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        // close() is the orderly path; dropping without it still must not
        // leak the sweeper task.
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_block_id_appends_marker() {
        assert_eq!(cache_block_id("f0f0f1"), "f0f0f1x");
        assert_eq!(cache_block_id(""), "x");
    }

    #[test]
    fn test_caching_options_serde() {
        let options = CachingOptions {
            max_cache_size_bytes: 10_000,
            cache_directory: None,
        };
        let json = serde_json::to_string(&options).expect("serialize");
        assert_eq!(json, r#"{"maxCacheSizeBytes":10000}"#);
        let parsed: CachingOptions = serde_json::from_str(&json).expect("parse");
        assert_eq!(parsed, options);
    }
}
