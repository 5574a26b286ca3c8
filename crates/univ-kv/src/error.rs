/// Errors from the underlying transactional engine.
///
/// Each variant wraps the engine's own error for the phase that failed, so a
/// caller can tell an open failure from a commit failure.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// Opening or creating the database file failed (including the file
    /// already being held open by another handle).
    #[error("database error: {0}")]
    Database(#[from] redb::DatabaseError),

    /// Beginning a transaction failed.
    #[error("transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    /// Opening or creating a bucket failed.
    #[error("bucket error: {0}")]
    Bucket(#[from] redb::TableError),

    /// A read or write inside a transaction failed.
    #[error("storage error: {0}")]
    Storage(#[from] redb::StorageError),

    /// Committing a write transaction failed; none of its writes are visible.
    #[error("commit error: {0}")]
    Commit(#[from] redb::CommitError),

    /// Preparing the directory that holds the database file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for engine operations.
pub type KvResult<T> = Result<T, KvError>;
