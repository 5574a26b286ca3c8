use univ_kv::KvError;
use univ_types::ContentHash;

/// Errors from object store operations.
///
/// A missing object is never an error; lookups return `Ok(None)`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying engine failed. Propagated unchanged.
    #[error("engine error: {0}")]
    Kv(#[from] KvError),

    /// The object's framing is malformed: bad header, wrong type tag, or a
    /// declared length that does not match the payload.
    #[error("corrupt object: {reason}")]
    CorruptObject { reason: String },

    /// The compression transform failed.
    #[error("codec error: {0}")]
    Codec(#[source] std::io::Error),

    /// Decoded content does not hash to the key it was stored under.
    #[error("hash mismatch: stored under {expected}, content hashes to {computed}")]
    HashMismatch {
        expected: ContentHash,
        computed: ContentHash,
    },

    /// A stored value could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The configured bucket names are unusable.
    #[error("invalid bucket names: {0}")]
    InvalidBuckets(String),
}

impl StoreError {
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptObject {
            reason: reason.into(),
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
