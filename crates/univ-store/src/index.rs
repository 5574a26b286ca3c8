use std::convert::Infallible;

use tracing::debug;
use univ_crypto::TreeLayout;
use univ_kv::{Keys, KvRead, WriteTx};
use univ_types::{ContentHash, HASH_LEN};

use crate::error::{StoreError, StoreResult};
use crate::object::{ObjectCodec, ObjectKind};

/// Document roots and the merkle nodes beneath them.
///
/// A root entry maps a document path to the hex hash of its current merkle
/// root; it is the only mutable pointer in the store. Nodes are keyed by the
/// hash of a `tree` frame over their children's raw digests, so identical
/// child sequences collapse to one node and reordering children yields a
/// different node.
#[derive(Clone, Debug)]
pub struct DocumentIndex {
    root_bucket: String,
    tree_bucket: String,
    codec: ObjectCodec,
}

impl DocumentIndex {
    pub fn new(
        root_bucket: impl Into<String>,
        tree_bucket: impl Into<String>,
        codec: ObjectCodec,
    ) -> Self {
        Self {
            root_bucket: root_bucket.into(),
            tree_bucket: tree_bucket.into(),
            codec,
        }
    }

    pub fn root_bucket(&self) -> &str {
        &self.root_bucket
    }

    pub fn tree_bucket(&self) -> &str {
        &self.tree_bucket
    }

    // -----------------------------------------------------------------------
    // Roots
    // -----------------------------------------------------------------------

    pub fn get_root(&self, tx: &impl KvRead, path: &str) -> StoreResult<Option<ContentHash>> {
        let Some(bytes) = tx.get(&self.root_bucket, path)? else {
            return Ok(None);
        };
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| StoreError::corrupt(format!("root of {path:?} is not text")))?;
        let hash = ContentHash::from_hex(text)
            .map_err(|e| StoreError::corrupt(format!("root of {path:?}: {e}")))?;
        Ok(Some(hash))
    }

    /// Point `path` at `root`, replacing any previous root.
    pub fn set_root(&self, tx: &WriteTx, path: &str, root: &ContentHash) -> StoreResult<()> {
        tx.put(&self.root_bucket, path, root.to_hex().as_bytes())?;
        debug!(path, root = %root.short_hex(), "document root set");
        Ok(())
    }

    pub fn remove_root(&self, tx: &WriteTx, path: &str) -> StoreResult<bool> {
        Ok(tx.delete(&self.root_bucket, path)?)
    }

    /// Paths of every indexed document, in key order.
    pub fn documents<'tx, T: KvRead>(&self, tx: &'tx T) -> Keys<'tx, T> {
        tx.keys(&self.root_bucket)
    }

    // -----------------------------------------------------------------------
    // Nodes
    // -----------------------------------------------------------------------

    /// Hash a node would be stored under, without storing it.
    pub fn node_hash(&self, children: &[ContentHash]) -> ContentHash {
        self.codec.hash(ObjectKind::Tree, &concat(children))
    }

    pub fn put_node(&self, tx: &WriteTx, children: &[ContentHash]) -> StoreResult<ContentHash> {
        let value = concat(children);
        let hash = self.codec.hash(ObjectKind::Tree, &value);
        tx.put(&self.tree_bucket, &hash.to_hex(), &value)?;
        debug!(node = %hash.short_hex(), children = children.len(), "tree node stored");
        Ok(hash)
    }

    /// Ordered children of a node. An unknown hash is `Ok(None)`.
    pub fn get_node(
        &self,
        tx: &impl KvRead,
        hash: &ContentHash,
    ) -> StoreResult<Option<Vec<ContentHash>>> {
        let Some(value) = tx.get(&self.tree_bucket, &hash.to_hex())? else {
            return Ok(None);
        };
        if value.len() % HASH_LEN != 0 {
            return Err(StoreError::corrupt(format!(
                "node {} is {} bytes, not a multiple of {HASH_LEN}",
                hash.short_hex(),
                value.len()
            )));
        }
        let children = value
            .chunks_exact(HASH_LEN)
            .map(|digest| {
                ContentHash::from_slice(digest).map_err(|e| StoreError::corrupt(e.to_string()))
            })
            .collect::<StoreResult<_>>()?;
        Ok(Some(children))
    }

    pub fn is_node(&self, tx: &impl KvRead, hash: &ContentHash) -> StoreResult<bool> {
        Ok(tx.contains(&self.tree_bucket, &hash.to_hex())?)
    }

    /// Store every node of the tree over `leaves` and return its root.
    pub fn build_tree(
        &self,
        tx: &WriteTx,
        leaves: &[ContentHash],
        layout: &TreeLayout,
    ) -> StoreResult<ContentHash> {
        layout.fold(leaves, |children| self.put_node(tx, children))
    }

    /// The root [`DocumentIndex::build_tree`] would return, computed without
    /// writing anything.
    pub fn compute_root(&self, leaves: &[ContentHash], layout: &TreeLayout) -> ContentHash {
        match layout.fold(leaves, |children| {
            Ok::<_, Infallible>(self.node_hash(children))
        }) {
            Ok(root) => root,
            Err(never) => match never {},
        }
    }
}

fn concat(children: &[ContentHash]) -> Vec<u8> {
    let mut value = Vec::with_capacity(children.len() * HASH_LEN);
    for child in children {
        value.extend_from_slice(child.as_bytes());
    }
    value
}
