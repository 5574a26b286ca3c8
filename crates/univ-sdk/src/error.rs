use thiserror::Error;

/// Boxed error returned by an [`crate::EmbeddingProvider`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum UniverseError {
    #[error("universe is closed")]
    Closed,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("engine error: {0}")]
    Kv(#[from] univ_kv::KvError),

    #[error("store error: {0}")]
    Store(#[from] univ_store::StoreError),

    #[error("diff error: {0}")]
    Diff(#[from] univ_diff::DiffError),

    #[error("embedding provider failed: {0}")]
    Provider(#[source] BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type UniverseResult<T> = Result<T, UniverseError>;
