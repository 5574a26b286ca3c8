//! Error types for the diff crate.

use univ_types::ContentHash;

/// Errors that can occur while walking two merkle trees.
#[derive(Debug, thiserror::Error)]
pub enum DiffError {
    /// A hash reachable from a root is neither a stored node nor a stored
    /// chunk.
    #[error("dangling reference: {0} is neither a tree node nor a chunk")]
    DanglingReference(ContentHash),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] univ_store::StoreError),
}

/// Convenience alias for diff results.
pub type DiffResult<T> = Result<T, DiffError>;
