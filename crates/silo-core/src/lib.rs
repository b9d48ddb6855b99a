//! # silo-core
//!
//! Core abstractions for the silo snapshot-oriented backup system.
//!
//! This crate provides the foundational types and traits used across all
//! silo components:
//!
//! - **Storage Contract**: the block-level storage interface the cache
//!   and repository drivers consume, with in-memory and filesystem
//!   backends
//! - **Shared Model**: source identity for snapshots
//! - **Error Types**: shared error definitions and result types
//! - **Observability**: logging initialization and span helpers
//!
//! ## Crate Boundary
//!
//! `silo-core` is the **only** crate allowed to define shared primitives.
//! The cache and snapshot layers interact exclusively through the
//! contracts defined here.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod fs_storage;
pub mod observability;
pub mod source;
pub mod storage;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use silo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::fs_storage::FilesystemStorage;
    pub use crate::observability::{init_logging, LogFormat};
    pub use crate::source::SourceInfo;
    pub use crate::storage::{block_range, BlockMeta, MemoryStorage, Storage, LENGTH_TO_END};
}

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use fs_storage::FilesystemStorage;
pub use observability::{init_logging, LogFormat};
pub use source::SourceInfo;
pub use storage::{block_range, BlockMeta, MemoryStorage, Storage, LENGTH_TO_END};
