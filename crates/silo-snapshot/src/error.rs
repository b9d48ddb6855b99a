//! Error types for the snapshot layer.

/// The result type used throughout the snapshot layer.
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Errors from manifest stores, policy resolution, and the drivers.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// A storage-tier operation failed.
    #[error(transparent)]
    Storage(#[from] silo_core::Error),

    /// A manifest or policy document could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the serialization failure.
        message: String,
    },

    /// The effective retention policy for a source could not be
    /// determined. The drivers never delete on this error.
    #[error("unable to determine effective policy for {source_spec}: {message}")]
    PolicyLookup {
        /// The source whose policy lookup failed.
        source_spec: String,
        /// Description of the failure.
        message: String,
    },

    /// A user-supplied source spec could not be parsed. Fatal for the
    /// invocation that supplied it.
    #[error("unable to parse source {spec:?}: {message}")]
    ParseSource {
        /// The spec as supplied.
        spec: String,
        /// Description of the failure.
        message: String,
    },

    /// A manifest id resolved to nothing.
    #[error("manifest not found: {id}")]
    ManifestNotFound {
        /// The missing manifest id.
        id: String,
    },

    /// An expire invocation selected neither paths nor all snapshots.
    #[error("must specify paths to expire or select all snapshots")]
    EmptySelection,
}
