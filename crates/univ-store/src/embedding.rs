use tracing::debug;
use univ_kv::{KvRead, WriteTx};
use univ_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// Cache of embedding vectors keyed by chunk content hash.
///
/// Referential integrity with the chunk bucket is not enforced: a vector may
/// be cached for a hash that was never stored as a chunk.
#[derive(Clone, Debug)]
pub struct EmbeddingCache {
    bucket: String,
}

impl EmbeddingCache {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn put(&self, tx: &WriteTx, hash: &ContentHash, vector: &[f64]) -> StoreResult<()> {
        let bytes =
            bincode::serialize(vector).map_err(|e| StoreError::Serialization(e.to_string()))?;
        tx.put(&self.bucket, &hash.to_hex(), &bytes)?;
        debug!(hash = %hash.short_hex(), dims = vector.len(), "embedding cached");
        Ok(())
    }

    /// A miss is `Ok(None)`; an empty vector is a hit.
    pub fn get(&self, tx: &impl KvRead, hash: &ContentHash) -> StoreResult<Option<Vec<f64>>> {
        match tx.get(&self.bucket, &hash.to_hex())? {
            Some(bytes) => {
                let vector = bincode::deserialize(&bytes)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(vector))
            }
            None => Ok(None),
        }
    }

    pub fn contains(&self, tx: &impl KvRead, hash: &ContentHash) -> StoreResult<bool> {
        Ok(tx.contains(&self.bucket, &hash.to_hex())?)
    }

    /// Returns `true` if a vector was cached.
    pub fn remove(&self, tx: &WriteTx, hash: &ContentHash) -> StoreResult<bool> {
        Ok(tx.delete(&self.bucket, &hash.to_hex())?)
    }
}
