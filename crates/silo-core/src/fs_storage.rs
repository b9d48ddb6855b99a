//! Directory-backed storage for local block caches.
//!
//! Stores one file per block id under a root directory. Writes go through
//! a temp file followed by a rename, so a concurrent reader sees either
//! the previous payload or the full new one. Modification times come from
//! file metadata; there is no sidecar index.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

use crate::error::{Error, Result};
use crate::storage::{block_range, BlockMeta, Storage};

/// Prefix for in-flight temp files; never a valid block id.
const TEMP_PREFIX: &str = ".tmp-";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Filesystem-backed [`Storage`] rooted at a directory.
#[derive(Debug)]
pub struct FilesystemStorage {
    root: PathBuf,
}

impl FilesystemStorage {
    /// Opens (creating if needed) a storage directory.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory cannot be created.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| {
            Error::storage_with_source(
                format!("unable to create storage directory {}", root.display()),
                e,
            )
        })?;
        Ok(Self { root })
    }

    /// The root directory of this storage.
    #[must_use]
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn block_path(&self, id: &str) -> Result<PathBuf> {
        validate_block_id(id)?;
        Ok(self.root.join(id))
    }
}

/// Block ids must be safe to use as file names on any platform.
fn validate_block_id(id: &str) -> Result<()> {
    if id.is_empty() || id.starts_with('.') {
        return Err(Error::InvalidInput(format!("invalid block id: {id:?}")));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(Error::InvalidInput(format!(
            "block id contains unsupported characters: {id:?}"
        )));
    }
    Ok(())
}

#[async_trait]
impl Storage for FilesystemStorage {
    async fn get_block(&self, id: &str, offset: i64, length: i64) -> Result<Bytes> {
        let path = self.block_path(id)?;

        let data = match tokio::fs::read(&path).await {
            Ok(data) => Bytes::from(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!("block not found: {id}")));
            }
            Err(e) => {
                return Err(Error::storage_with_source(
                    format!("unable to read {}", path.display()),
                    e,
                ));
            }
        };

        block_range(&data, offset, length)
    }

    async fn put_block(&self, id: &str, data: Bytes) -> Result<()> {
        let path = self.block_path(id)?;
        let temp = self.root.join(format!(
            "{TEMP_PREFIX}{}-{id}",
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));

        tokio::fs::write(&temp, &data).await.map_err(|e| {
            Error::storage_with_source(format!("unable to write {}", temp.display()), e)
        })?;

        if let Err(e) = tokio::fs::rename(&temp, &path).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(Error::storage_with_source(
                format!("unable to finalize {}", path.display()),
                e,
            ));
        }

        Ok(())
    }

    async fn delete_block(&self, id: &str) -> Result<()> {
        let path = self.block_path(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::storage_with_source(
                format!("unable to delete {}", path.display()),
                e,
            )),
        }
    }

    async fn list_blocks(&self, prefix: &str) -> Result<Vec<BlockMeta>> {
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(|e| {
            Error::storage_with_source(format!("unable to list {}", self.root.display()), e)
        })?;

        let mut result = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            Error::storage_with_source(format!("unable to list {}", self.root.display()), e)
        })? {
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            if name.starts_with(TEMP_PREFIX) || !name.starts_with(prefix) {
                continue;
            }

            let Ok(metadata) = entry.metadata().await else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }

            let last_modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());

            result.push(BlockMeta {
                id: name,
                length: metadata.len(),
                last_modified,
            });
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::LENGTH_TO_END;

    #[tokio::test]
    async fn test_filesystem_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(dir.path()).expect("open");

        let data = Bytes::from_static(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
        storage.put_block("block-1", data.clone()).await.expect("put");

        assert_eq!(
            storage
                .get_block("block-1", 0, LENGTH_TO_END)
                .await
                .expect("get"),
            data
        );
        assert_eq!(
            storage.get_block("block-1", 1, 5).await.expect("range"),
            Bytes::from_static(&[2, 3, 4, 5, 6])
        );
    }

    #[tokio::test]
    async fn test_filesystem_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(dir.path()).expect("open");

        let err = storage
            .get_block("missing", 0, LENGTH_TO_END)
            .await
            .expect_err("missing block");
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_filesystem_rejects_unsafe_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(dir.path()).expect("open");

        for id in ["", "../escape", "a/b", ".hidden"] {
            let err = storage
                .put_block(id, Bytes::from_static(b"x"))
                .await
                .expect_err("unsafe id must be rejected");
            assert!(matches!(err, Error::InvalidInput(_)), "id {id:?}: {err}");
        }
    }

    #[tokio::test]
    async fn test_filesystem_list_reports_metadata() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(dir.path()).expect("open");

        storage
            .put_block("k1x", Bytes::from_static(&[0u8; 100]))
            .await
            .expect("put");
        storage
            .put_block("other", Bytes::from_static(&[0u8; 7]))
            .await
            .expect("put");

        let mut listed = storage.list_blocks("k").await.expect("list");
        assert_eq!(listed.len(), 1);
        let meta = listed.pop().expect("entry");
        assert_eq!(meta.id, "k1x");
        assert_eq!(meta.length, 100);
    }

    #[tokio::test]
    async fn test_filesystem_delete_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let storage = FilesystemStorage::new(dir.path()).expect("open");

        storage
            .put_block("gone", Bytes::from_static(b"d"))
            .await
            .expect("put");
        storage.delete_block("gone").await.expect("delete");
        storage.delete_block("gone").await.expect("repeat delete");
    }
}
