//! End-to-end tests for the block cache over in-memory and disk storage.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use silo_cache::{BlockCache, CachingOptions};
use silo_core::error::Error;
use silo_core::storage::{Storage, LENGTH_TO_END};
use silo_test_utils::TracingStorage;

const BLOCK_1: &[u8] = &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10];

async fn new_underlying() -> Arc<TracingStorage> {
    let storage = TracingStorage::new();
    storage
        .put_block("block-1", Bytes::from_static(BLOCK_1))
        .await
        .expect("seed block-1");
    storage
        .put_block(
            "block-4k",
            Bytes::from([1u8, 2, 3, 4].repeat(1000)), // 4000 bytes
        )
        .await
        .expect("seed block-4k");
    storage.clear_operations();
    Arc::new(storage)
}

fn options(max_cache_size_bytes: u64) -> CachingOptions {
    CachingOptions {
        max_cache_size_bytes,
        cache_directory: None,
    }
}

async fn verify_block_cache(cache: &BlockCache) {
    struct Case {
        cache_key: &'static str,
        physical_block_id: &'static str,
        offset: i64,
        length: i64,
        expected: std::result::Result<&'static [u8], &'static str>,
    }

    let cases = [
        Case {
            cache_key: "f0f0f1",
            physical_block_id: "block-1",
            offset: 1,
            length: 5,
            expected: Ok(&[2, 3, 4, 5, 6]),
        },
        Case {
            cache_key: "f0f0f2",
            physical_block_id: "block-1",
            offset: 0,
            length: -1,
            expected: Ok(BLOCK_1),
        },
        // Same arguments again: served from cache, same bytes.
        Case {
            cache_key: "f0f0f1",
            physical_block_id: "block-1",
            offset: 1,
            length: 5,
            expected: Ok(&[2, 3, 4, 5, 6]),
        },
        Case {
            cache_key: "f0f0f2",
            physical_block_id: "block-1",
            offset: 0,
            length: -1,
            expected: Ok(BLOCK_1),
        },
        Case {
            cache_key: "f0f0f3",
            physical_block_id: "no-such-block",
            offset: 0,
            length: -1,
            expected: Err("not-found"),
        },
        // Same key again: the miss was not cached.
        Case {
            cache_key: "f0f0f3",
            physical_block_id: "no-such-block",
            offset: 10,
            length: 5,
            expected: Err("not-found"),
        },
        Case {
            cache_key: "f0f0f5",
            physical_block_id: "block-1",
            offset: 7,
            length: 3,
            expected: Ok(&[8, 9, 10]),
        },
        Case {
            cache_key: "f0f0f6",
            physical_block_id: "block-1",
            offset: 11,
            length: 10,
            expected: Err("invalid-offset"),
        },
        Case {
            cache_key: "f0f0f6",
            physical_block_id: "block-1",
            offset: -1,
            length: 5,
            expected: Err("invalid-offset"),
        },
    ];

    for case in &cases {
        let got = cache
            .get_block(
                case.cache_key,
                case.physical_block_id,
                case.offset,
                case.length,
            )
            .await;

        match (got, case.expected) {
            (Ok(bytes), Ok(want)) => {
                assert_eq!(
                    bytes.as_ref(),
                    want,
                    "unexpected data for {} ({}, {})",
                    case.cache_key,
                    case.offset,
                    case.length
                );
            }
            (Err(Error::NotFound(_)), Err("not-found"))
            | (Err(Error::InvalidOffset(_)), Err("invalid-offset")) => {}
            (other, expected) => panic!(
                "unexpected result for {} ({}, {}): {other:?}, wanted {expected:?}",
                case.cache_key, case.offset, case.length
            ),
        }
    }
}

#[tokio::test]
async fn test_get_block_semantics() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = BlockCache::with_cache_storage(
        underlying.clone(),
        cache_storage.clone(),
        options(10_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    );

    verify_block_cache(&cache).await;

    // Only successful fetches got persisted, under rewritten keys. The
    // invalid-offset fetch of f0f0f6 never reached the cache.
    assert_eq!(
        cache_storage.block_ids(),
        vec!["f0f0f1x", "f0f0f2x", "f0f0f5x"]
    );

    // The cached entries survive removal of the underlying block.
    underlying.delete_block("block-1").await.expect("delete");
    let cached = cache
        .get_block("f0f0f1", "block-1", 1, 5)
        .await
        .expect("cached read");
    assert_eq!(cached, Bytes::from_static(&[2, 3, 4, 5, 6]));

    cache.close().await;
}

#[tokio::test]
async fn test_repeated_reads_fetch_underlying_once() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = BlockCache::with_cache_storage(
        underlying.clone(),
        cache_storage,
        options(10_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    );

    for _ in 0..3 {
        let bytes = cache
            .get_block("k1", "block-1", 0, LENGTH_TO_END)
            .await
            .expect("read");
        assert_eq!(bytes.as_ref(), BLOCK_1);
    }

    assert_eq!(underlying.get_count("block-1"), 1);
    cache.close().await;
}

#[tokio::test]
async fn test_invalid_arguments_touch_no_storage() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = BlockCache::with_cache_storage(
        underlying.clone(),
        cache_storage.clone(),
        options(10_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    );

    let err = cache
        .get_block("k1", "block-1", -1, 5)
        .await
        .expect_err("negative offset");
    assert!(matches!(err, Error::InvalidOffset(_)));

    let err = cache
        .get_block("k1", "block-1", 0, -2)
        .await
        .expect_err("negative length");
    assert!(matches!(err, Error::InvalidOffset(_)));

    assert!(underlying.operations().is_empty());
    assert!(cache_storage.operations().is_empty());

    cache.close().await;
}

#[tokio::test]
async fn test_corrupted_cache_entry_outside_range_is_invisible() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = BlockCache::with_cache_storage(
        underlying,
        cache_storage.clone(),
        options(10_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    );

    let bytes = cache.get_block("f0f0f1", "block-1", 1, 5).await.expect("read");
    assert_eq!(bytes, Bytes::from_static(&[2, 3, 4, 5, 6]));

    // Flip a byte of the cached payload outside the requested range. The
    // cache trusts its own storage, so the re-read must still return the
    // correct bytes for [1, 6).
    cache_storage.corrupt_block("f0f0f1x", |data| data[0] ^= 1);

    let bytes = cache.get_block("f0f0f1", "block-1", 1, 5).await.expect("read");
    assert_eq!(bytes, Bytes::from_static(&[2, 3, 4, 5, 6]));

    cache.close().await;
}

#[tokio::test]
async fn test_cache_write_failure_is_suppressed() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());
    cache_storage.inject_failure("");

    let cache = BlockCache::with_cache_storage(
        underlying.clone(),
        cache_storage.clone(),
        options(10_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    );

    // Every cache tier operation fails, yet reads keep working.
    for _ in 0..2 {
        let bytes = cache
            .get_block("k1", "block-1", 1, 5)
            .await
            .expect("read must survive a broken cache tier");
        assert_eq!(bytes, Bytes::from_static(&[2, 3, 4, 5, 6]));
    }

    assert!(cache_storage.block_ids().is_empty());
    // Without a working cache tier, every read re-fetches.
    assert_eq!(underlying.get_count("block-1"), 2);

    cache.close().await;
}

#[tokio::test]
async fn test_cache_expiration() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = BlockCache::with_cache_storage(
        underlying.clone(),
        cache_storage.clone(),
        options(10_000),
        Duration::ZERO,
        Duration::from_millis(250),
    );

    for key in ["00000a", "00000b", "00000c", "00000d"] {
        cache
            .get_block(key, "block-4k", 0, LENGTH_TO_END)
            .await
            .expect("fill cache");
        // Distinct mod times so the sweep order is deterministic.
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Wait for at least one sweep: 16000 cached bytes against a 10000
    // ceiling evicts the two oldest entries.
    tokio::time::sleep(Duration::from_secs(1)).await;

    // Remove the underlying block; evicted keys must now fail while the
    // surviving ones are still served from cache.
    underlying.delete_block("block-4k").await.expect("delete");

    for (key, expect_hit) in [
        ("00000a", false),
        ("00000b", false),
        ("00000c", true),
        ("00000d", true),
    ] {
        let result = cache.get_block(key, "block-4k", 0, LENGTH_TO_END).await;
        match (result, expect_hit) {
            (Ok(bytes), true) => assert_eq!(bytes.len(), 4000, "wrong payload for {key}"),
            (Err(Error::NotFound(_)), false) => {}
            (result, _) => panic!("unexpected result for {key}: {result:?}"),
        }
    }

    cache.close().await;
}

#[tokio::test]
async fn test_disk_block_cache() {
    let underlying = new_underlying().await;
    let cache_dir = tempfile::tempdir().expect("tempdir");

    let cache = BlockCache::open(
        underlying,
        CachingOptions {
            max_cache_size_bytes: 10_000,
            cache_directory: Some(cache_dir.path().to_path_buf()),
        },
    )
    .expect("open");

    verify_block_cache(&cache).await;
    cache.close().await;
}

#[tokio::test]
async fn test_open_requires_cache_directory() {
    let underlying = new_underlying().await;
    let err = BlockCache::open(underlying, options(10_000)).expect_err("no directory");
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_concurrent_misses_converge() {
    let underlying = new_underlying().await;
    let cache_storage = Arc::new(TracingStorage::new());

    let cache = Arc::new(BlockCache::with_cache_storage(
        underlying,
        cache_storage.clone(),
        options(100_000),
        Duration::from_secs(600),
        Duration::from_secs(60),
    ));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let cache = cache.clone();
        tasks.push(tokio::spawn(async move {
            cache.get_block("shared", "block-4k", 100, 50).await
        }));
    }

    for task in tasks {
        let bytes = task.await.expect("join").expect("read");
        assert_eq!(bytes.len(), 50);
    }

    // All writers raced on the same rewritten key; exactly one entry
    // remains and it holds the full block.
    assert_eq!(cache_storage.block_ids(), vec!["sharedx"]);
    let listed = cache_storage.list_blocks("shared").await.expect("list");
    assert_eq!(listed[0].length, 4000);
}
