//! # silo-test-utils
//!
//! Test storage implementations with operation tracing.
//!
//! Provides an in-memory [`Storage`] that records all operations for test
//! assertions, with per-prefix failure injection and optional simulated
//! latency.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use silo_core::error::{Error, Result};
use silo_core::storage::{block_range, BlockMeta, Storage};

/// Record of a storage operation for test assertions.
#[derive(Debug, Clone)]
pub enum StorageOp {
    /// Block read (full or range).
    Get {
        /// Block that was read.
        id: String,
        /// Start byte offset.
        offset: i64,
        /// Requested length (`-1` means to end).
        length: i64,
    },
    /// Block write.
    Put {
        /// Block that was written.
        id: String,
        /// Size of data written.
        size: usize,
    },
    /// Block deletion.
    Delete {
        /// Block that was deleted.
        id: String,
    },
    /// Prefix listing.
    List {
        /// Prefix that was listed.
        prefix: String,
    },
}

/// In-memory storage with operation tracing.
///
/// Records all operations for later assertion in tests.
#[derive(Debug, Clone, Default)]
pub struct TracingStorage {
    blocks: Arc<Mutex<HashMap<String, StoredBlock>>>,
    operations: Arc<Mutex<Vec<StorageOp>>>,
    fail_prefixes: Arc<Mutex<Vec<String>>>,
    latency: Option<Duration>,
}

#[derive(Debug, Clone)]
struct StoredBlock {
    data: Bytes,
    last_modified: DateTime<Utc>,
}

impl TracingStorage {
    /// Creates a new empty tracing storage.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates storage with simulated latency.
    #[must_use]
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    /// Returns all recorded operations.
    #[must_use]
    pub fn operations(&self) -> Vec<StorageOp> {
        self.operations.lock().expect("lock").clone()
    }

    /// Clears recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().expect("lock").clear();
    }

    /// Injects a failure for the given block id prefix.
    pub fn inject_failure(&self, prefix: impl Into<String>) {
        self.fail_prefixes.lock().expect("lock").push(prefix.into());
    }

    /// Clears all injected failures.
    pub fn clear_failures(&self) {
        self.fail_prefixes.lock().expect("lock").clear();
    }

    /// Returns all stored block ids, sorted (for assertions).
    #[must_use]
    pub fn block_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.blocks.lock().expect("lock").keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Number of `Get` operations recorded for the given block id.
    #[must_use]
    pub fn get_count(&self, id: &str) -> usize {
        self.operations
            .lock()
            .expect("lock")
            .iter()
            .filter(|op| matches!(op, StorageOp::Get { id: got, .. } if got == id))
            .count()
    }

    /// Overwrites a stored payload in place without refreshing its
    /// modification time (for corruption tests).
    ///
    /// # Panics
    ///
    /// Panics if the block does not exist.
    pub fn corrupt_block(&self, id: &str, mutate: impl FnOnce(&mut Vec<u8>)) {
        let mut blocks = self.blocks.lock().expect("lock");
        let block = blocks.get_mut(id).expect("block to corrupt must exist");
        let mut data = block.data.to_vec();
        mutate(&mut data);
        block.data = Bytes::from(data);
    }

    fn record(&self, op: StorageOp) {
        self.operations.lock().expect("lock").push(op);
    }

    fn check_failure(&self, id: &str) -> Result<()> {
        let fail_prefixes = self.fail_prefixes.lock().expect("lock");
        if fail_prefixes.iter().any(|p| id.starts_with(p.as_str())) {
            return Err(Error::storage(format!("injected failure for block: {id}")));
        }
        Ok(())
    }

    async fn maybe_delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl Storage for TracingStorage {
    async fn get_block(&self, id: &str, offset: i64, length: i64) -> Result<Bytes> {
        self.maybe_delay().await;
        self.check_failure(id)?;
        self.record(StorageOp::Get {
            id: id.to_string(),
            offset,
            length,
        });

        let blocks = self.blocks.lock().expect("lock");
        let block = blocks
            .get(id)
            .ok_or_else(|| Error::NotFound(format!("block not found: {id}")))?;
        block_range(&block.data, offset, length)
    }

    async fn put_block(&self, id: &str, data: Bytes) -> Result<()> {
        self.maybe_delay().await;
        self.check_failure(id)?;
        self.record(StorageOp::Put {
            id: id.to_string(),
            size: data.len(),
        });

        self.blocks.lock().expect("lock").insert(
            id.to_string(),
            StoredBlock {
                data,
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete_block(&self, id: &str) -> Result<()> {
        self.maybe_delay().await;
        self.check_failure(id)?;
        self.record(StorageOp::Delete { id: id.to_string() });

        self.blocks.lock().expect("lock").remove(id);
        Ok(())
    }

    async fn list_blocks(&self, prefix: &str) -> Result<Vec<BlockMeta>> {
        self.maybe_delay().await;
        self.check_failure(prefix)?;
        self.record(StorageOp::List {
            prefix: prefix.to_string(),
        });

        let blocks = self.blocks.lock().expect("lock");
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
