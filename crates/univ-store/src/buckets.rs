use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Bucket holding compressed chunk objects, keyed by content hash.
pub const CHUNK_BUCKET: &str = "chunk";
/// Bucket holding embedding vectors, keyed by chunk content hash.
pub const EMBEDDING_BUCKET: &str = "embedding";
/// Bucket mapping document paths to merkle root hashes.
pub const ROOT_BUCKET: &str = "root";
/// Bucket mapping merkle node hashes to their ordered children.
pub const TREE_BUCKET: &str = "tree";

/// Names of the four buckets a universe owns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BucketNames {
    pub chunk: String,
    pub embedding: String,
    pub root: String,
    pub tree: String,
}

impl Default for BucketNames {
    fn default() -> Self {
        Self {
            chunk: CHUNK_BUCKET.to_string(),
            embedding: EMBEDDING_BUCKET.to_string(),
            root: ROOT_BUCKET.to_string(),
            tree: TREE_BUCKET.to_string(),
        }
    }
}

impl BucketNames {
    /// All four names, in creation order.
    pub fn all(&self) -> [&str; 4] {
        [&self.chunk, &self.embedding, &self.root, &self.tree]
    }

    /// Reject empty or repeated names.
    pub fn validate(&self) -> StoreResult<()> {
        let names = self.all();
        for (i, name) in names.iter().enumerate() {
            if name.is_empty() {
                return Err(StoreError::InvalidBuckets("bucket name is empty".into()));
            }
            if names[..i].contains(name) {
                return Err(StoreError::InvalidBuckets(format!(
                    "bucket {name:?} is used twice"
                )));
            }
        }
        Ok(())
    }
}
