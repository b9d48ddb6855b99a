//! Storage contract for immutable, content-addressed blocks.
//!
//! This module defines the storage interface consumed by the block cache
//! and the repository drivers. The contract is designed for object-storage
//! semantics:
//!
//! - Blocks are immutable byte sequences addressed by an opaque string id
//! - Partial reads use an `(offset, length)` pair where `length == -1`
//!   means "to the end of the block"
//! - Listings report the metadata the cache sweeper needs: id, length,
//!   and the storage-reported modification time
//!
//! Backends interpret ids according to their own layout; the contract
//! deliberately avoids leaking any backend-specific assumptions into the
//! cache and snapshot layers.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

/// Sentinel length meaning "read to the end of the block".
pub const LENGTH_TO_END: i64 = -1;

/// Metadata about a stored block.
#[derive(Debug, Clone)]
pub struct BlockMeta {
    /// Block id (opaque string).
    pub id: String,
    /// Block length in bytes.
    pub length: u64,
    /// Storage-reported modification time.
    pub last_modified: DateTime<Utc>,
}

/// Storage backend trait for immutable blocks.
///
/// All storage backends (object stores, local filesystems, memory)
/// implement this trait. Every method may block on external I/O; callers
/// must not hold locks across invocations.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Reads `length` bytes of a block starting at `offset`.
    ///
    /// A `length` of [`LENGTH_TO_END`] reads to the end of the block.
    ///
    /// Returns [`Error::NotFound`] if the block does not exist and
    /// [`Error::InvalidOffset`] if the requested range is out of bounds.
    async fn get_block(&self, id: &str, offset: i64, length: i64) -> Result<Bytes>;

    /// Writes a full block under the given id, replacing any previous
    /// content.
    async fn put_block(&self, id: &str, data: Bytes) -> Result<()>;

    /// Deletes a block. Succeeds even if the block does not exist
    /// (idempotent).
    async fn delete_block(&self, id: &str) -> Result<()>;

    /// Lists blocks whose id starts with the given prefix.
    ///
    /// Returns an empty vec if no blocks match.
    ///
    /// **Ordering**: results are returned in arbitrary order that may vary
    /// between backends and invocations. Callers requiring deterministic
    /// order should sort the results (e.g., by `id` or `last_modified`).
    async fn list_blocks(&self, prefix: &str) -> Result<Vec<BlockMeta>>;
}

/// Extracts `[offset, offset+length)` from a full block payload.
///
/// A `length` of [`LENGTH_TO_END`] takes everything from `offset` to the
/// end. An `offset` equal to the payload length yields an empty result.
///
/// # Errors
///
/// Returns [`Error::InvalidOffset`] when `offset < 0`, `length < -1`,
/// `offset` points past the end of the payload, or a non-negative
/// `length` overruns it.
pub fn block_range(data: &Bytes, offset: i64, length: i64) -> Result<Bytes> {
    if offset < 0 || length < LENGTH_TO_END {
        return Err(Error::InvalidOffset(format!(
            "offset {offset} length {length}"
        )));
    }

    let len = data.len() as i64;
    if offset > len {
        return Err(Error::InvalidOffset(format!(
            "offset {offset} exceeds block length {len}"
        )));
    }

    let start = usize::try_from(offset).map_err(|_| {
        Error::InvalidOffset(format!("offset {offset} does not fit in memory"))
    })?;

    if length == LENGTH_TO_END {
        return Ok(data.slice(start..));
    }

    if offset.checked_add(length).is_none_or(|end| end > len) {
        return Err(Error::InvalidOffset(format!(
            "range [{offset}, {offset}+{length}) exceeds block length {len}"
        )));
    }

    let count = usize::try_from(length).map_err(|_| {
        Error::InvalidOffset(format!("length {length} does not fit in memory"))
    })?;
    Ok(data.slice(start..start + count))
}

/// In-memory storage backend.
///
/// Thread-safe via `RwLock`. Suitable for tests and as a cache tier in
/// short-lived processes; not durable.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    blocks: Arc<RwLock<HashMap<String, StoredBlock>>>,
}

#[derive(Debug, Clone)]
struct StoredBlock {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl MemoryStorage {
    /// Creates a new empty memory storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get_block(&self, id: &str, offset: i64, length: i64) -> Result<Bytes> {
        let blocks = self.blocks.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        let block = blocks
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("block not found: {id}")))?;

        block_range(&block.data, offset, length)
    }

    async fn put_block(&self, id: &str, data: Bytes) -> Result<()> {
        self.blocks
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .insert(
                id.to_string(),
                StoredBlock {
                    data,
                    last_modified: Utc::now(),
                },
            );
        Ok(())
    }

    async fn delete_block(&self, id: &str) -> Result<()> {
        self.blocks
            .write()
            .map_err(|_| Error::Internal {
                message: "lock poisoned".into(),
            })?
            .remove(id);
        Ok(())
    }

    async fn list_blocks(&self, prefix: &str) -> Result<Vec<BlockMeta>> {
        let blocks = self.blocks.read().map_err(|_| Error::Internal {
            message: "lock poisoned".into(),
        })?;

        Ok(blocks
            .iter()
            .filter(|(id, _)| id.starts_with(prefix))
            .map(|(id, block)| BlockMeta {
                id: id.clone(),
                length: block.data.len() as u64,
                last_modified: block.last_modified,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_storage_roundtrip() {
        let storage = MemoryStorage::new();
        let data = Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);

        storage
            .put_block("block-1", data.clone())
            .await
            .expect("put should succeed");

        let retrieved = storage
            .get_block("block-1", 0, LENGTH_TO_END)
            .await
            .expect("get should succeed");
        assert_eq!(retrieved, data);
    }

    #[tokio::test]
    async fn test_get_block_not_found() {
        let storage = MemoryStorage::new();
        let err = storage
            .get_block("no-such-block", 0, LENGTH_TO_END)
            .await
            .expect_err("should not find block");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_get_block_partial_range() {
        let storage = MemoryStorage::new();
        storage
            .put_block("block-1", Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]))
            .await
            .expect("put should succeed");

        let slice = storage
            .get_block("block-1", 1, 5)
            .await
            .expect("range read should succeed");
        assert_eq!(slice, Bytes::from_static(&[2, 3, 4, 5, 6]));

        let tail = storage
            .get_block("block-1", 7, LENGTH_TO_END)
            .await
            .expect("tail read should succeed");
        assert_eq!(tail, Bytes::from_static(&[8, 9, 10]));
    }

    #[tokio::test]
    async fn test_get_block_offset_at_end_is_empty() {
        let storage = MemoryStorage::new();
        storage
            .put_block("block-1", Bytes::from_static(b"hello"))
            .await
            .expect("put should succeed");

        let empty = storage
            .get_block("block-1", 5, LENGTH_TO_END)
            .await
            .expect("read at end should succeed");
        assert!(empty.is_empty());
    }

    #[tokio::test]
    async fn test_get_block_invalid_ranges() {
        let storage = MemoryStorage::new();
        storage
            .put_block("block-1", Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]))
            .await
            .expect("put should succeed");

        for (offset, length) in [(11, 10), (-1, 5), (0, -2), (6, 5)] {
            let err = storage
                .get_block("block-1", offset, length)
                .await
                .expect_err("out-of-bounds range must fail");
            assert!(
                matches!(err, Error::InvalidOffset(_)),
                "expected InvalidOffset for ({offset}, {length}), got {err}"
            );
        }
    }

    #[tokio::test]
    async fn test_list_blocks_with_prefix() {
        let storage = MemoryStorage::new();
        storage
            .put_block("a-1", Bytes::from_static(b"a1"))
            .await
            .unwrap();
        storage
            .put_block("a-2", Bytes::from_static(b"a2"))
            .await
            .unwrap();
        storage
            .put_block("b-1", Bytes::from_static(b"b1"))
            .await
            .unwrap();

        let list_a = storage.list_blocks("a-").await.expect("list should succeed");
        assert_eq!(list_a.len(), 2);
        assert!(list_a.iter().all(|m| m.length == 2));

        let all = storage.list_blocks("").await.expect("list should succeed");
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_delete_block_is_idempotent() {
        let storage = MemoryStorage::new();
        storage
            .put_block("del", Bytes::from_static(b"data"))
            .await
            .unwrap();

        storage.delete_block("del").await.expect("delete should succeed");
        storage
            .delete_block("del")
            .await
            .expect("second delete should also succeed");

        let err = storage
            .get_block("del", 0, LENGTH_TO_END)
            .await
            .expect_err("deleted block must be gone");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_put_block_updates_last_modified() {
        let storage = MemoryStorage::new();
        storage
            .put_block("m", Bytes::from_static(b"v1"))
            .await
            .unwrap();
        let before = storage.list_blocks("m").await.unwrap()[0].last_modified;

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        storage
            .put_block("m", Bytes::from_static(b"v2"))
            .await
            .unwrap();
        let after = storage.list_blocks("m").await.unwrap()[0].last_modified;

        assert!(after > before, "rewrite must refresh last_modified");
    }
}
