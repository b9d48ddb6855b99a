//! # silo-cache
//!
//! A caching tier between block consumers and an underlying object
//! storage.
//!
//! The cache services partial-range reads of immutable, content-addressed
//! blocks. On a miss it fetches the full block from the underlying
//! storage, persists it to a secondary cache storage (typically a local
//! disk), and serves the requested range. A background sweeper bounds the
//! cache footprint: entries are evicted oldest-first once the total size
//! exceeds a soft ceiling, but never before they reach a minimum age.
//!
//! The cache persists no index of its own; the cache storage *is* the
//! index. Cache-written blocks are distinguished from any other tenant of
//! that storage by a marker character appended to the caller's cache key.
//!
//! ## Example
//!
//! ```rust,ignore
//! let cache = BlockCache::open(underlying, CachingOptions {
//!     max_cache_size_bytes: 512 << 20,
//!     cache_directory: Some("/var/cache/silo".into()),
//! })?;
//!
//! let bytes = cache.get_block("k1", "block-1", 0, LENGTH_TO_END).await?;
//! cache.close().await;
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

mod block_cache;
mod sweep;

pub use block_cache::{BlockCache, CachingOptions, CACHE_ID_SUFFIX};
pub use sweep::SweepStats;
