//! Background sweep enforcing the cache size ceiling.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::watch;

use silo_core::error::Result;
use silo_core::storage::{BlockMeta, Storage};

use crate::block_cache::CACHE_ID_SUFFIX;

/// Tuning for the sweeper task.
#[derive(Debug, Clone)]
pub(crate) struct SweepParams {
    pub max_cache_size_bytes: u64,
    pub min_sweep_age: Duration,
    pub sweep_interval: Duration,
}

/// Outcome of a single sweep pass.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    /// Cache entries examined.
    pub entries: usize,
    /// Entries evicted this pass.
    pub deleted: usize,
    /// Bytes reclaimed this pass.
    pub bytes_freed: u64,
    /// Total cached bytes remaining after the pass.
    pub total_bytes: u64,
}

/// Long-lived sweeper loop; exits when the shutdown channel fires or its
/// sender is dropped.
pub(crate) async fn run_sweeper(
    cache_storage: Arc<dyn Storage>,
    params: SweepParams,
    mut shutdown: watch::Receiver<bool>,
) {
    let min_age = TimeDelta::from_std(params.min_sweep_age).unwrap_or(TimeDelta::MAX);

    loop {
        tokio::select! {
            _ = shutdown.changed() => return,
            () = tokio::time::sleep(params.sweep_interval) => {}
        }

        match sweep_pass(cache_storage.as_ref(), params.max_cache_size_bytes, min_age).await {
            Ok(stats) if stats.deleted > 0 => {
                tracing::info!(
                    entries = stats.entries,
                    deleted = stats.deleted,
                    bytes_freed = stats.bytes_freed,
                    total_bytes = stats.total_bytes,
                    "cache sweep completed"
                );
            }
            Ok(stats) => {
                tracing::debug!(
                    entries = stats.entries,
                    total_bytes = stats.total_bytes,
                    "cache sweep completed"
                );
            }
            Err(e) => {
                tracing::warn!(error = %e, "cache sweep failed");
            }
        }
    }
}

/// One sweep pass over the cache storage.
///
/// Lists marker-suffixed entries, oldest first, and deletes while the
/// total size exceeds the ceiling and the oldest entry is at least
/// `min_age` old. Individual delete failures are logged and the pass
/// continues. The ceiling is soft: entries younger than `min_age` are
/// never evicted.
pub(crate) async fn sweep_pass(
    cache_storage: &dyn Storage,
    max_cache_size_bytes: u64,
    min_age: TimeDelta,
) -> Result<SweepStats> {
    let mut entries: Vec<BlockMeta> = cache_storage
        .list_blocks("")
        .await?
        .into_iter()
        .filter(|m| m.id.ends_with(CACHE_ID_SUFFIX))
        .collect();
    entries.sort_by(|a, b| {
        a.last_modified
            .cmp(&b.last_modified)
            .then_with(|| a.id.cmp(&b.id))
    });

    let mut total: u64 = entries.iter().map(|m| m.length).sum();
    let mut stats = SweepStats {
        entries: entries.len(),
        total_bytes: total,
        ..SweepStats::default()
    };

    let now = Utc::now();
    for entry in &entries {
        if total <= max_cache_size_bytes {
            break;
        }
        if now.signed_duration_since(entry.last_modified) < min_age {
            break;
        }

        match cache_storage.delete_block(&entry.id).await {
            Ok(()) => {
                total -= entry.length;
                stats.deleted += 1;
                stats.bytes_freed += entry.length;
            }
            Err(e) => {
                tracing::warn!(id = %entry.id, error = %e, "unable to evict cache entry");
            }
        }
    }

    stats.total_bytes = total;
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use silo_core::storage::MemoryStorage;

    async fn put_sized(storage: &MemoryStorage, id: &str, size: usize) {
        storage
            .put_block(id, Bytes::from(vec![0u8; size]))
            .await
            .expect("put");
        // Distinct mod times so eviction order is deterministic.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    #[tokio::test]
    async fn test_sweep_evicts_oldest_first() {
        let storage = MemoryStorage::new();
        put_sized(&storage, "ax", 4000).await;
        put_sized(&storage, "bx", 4000).await;
        put_sized(&storage, "cx", 4000).await;
        put_sized(&storage, "dx", 4000).await;

        let stats = sweep_pass(&storage, 10_000, TimeDelta::zero())
            .await
            .expect("sweep");

        assert_eq!(stats.entries, 4);
        assert_eq!(stats.deleted, 2);
        assert_eq!(stats.bytes_freed, 8000);
        assert_eq!(stats.total_bytes, 8000);

        let mut remaining: Vec<String> = storage
            .list_blocks("")
            .await
            .expect("list")
            .into_iter()
            .map(|m| m.id)
            .collect();
        remaining.sort();
        assert_eq!(remaining, vec!["cx", "dx"]);
    }

    #[tokio::test]
    async fn test_sweep_ignores_unmarked_blocks() {
        let storage = MemoryStorage::new();
        put_sized(&storage, "foreign-tenant", 50_000).await;
        put_sized(&storage, "ax", 4000).await;

        let stats = sweep_pass(&storage, 10_000, TimeDelta::zero())
            .await
            .expect("sweep");

        // The foreign block neither counts toward the total nor gets
        // evicted.
        assert_eq!(stats.entries, 1);
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.total_bytes, 4000);
        assert_eq!(storage.list_blocks("").await.expect("list").len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_never_evicts_young_entries() {
        let storage = MemoryStorage::new();
        put_sized(&storage, "ax", 4000).await;
        put_sized(&storage, "bx", 4000).await;
        put_sized(&storage, "cx", 4000).await;

        let stats = sweep_pass(&storage, 10_000, TimeDelta::hours(1))
            .await
            .expect("sweep");

        // Over the ceiling, but everything is younger than min age.
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.total_bytes, 12_000);
    }

    #[tokio::test]
    async fn test_sweep_under_ceiling_is_a_noop() {
        let storage = MemoryStorage::new();
        put_sized(&storage, "ax", 100).await;

        let stats = sweep_pass(&storage, 10_000, TimeDelta::zero())
            .await
            .expect("sweep");
        assert_eq!(stats.deleted, 0);
        assert_eq!(stats.total_bytes, 100);
    }
}
