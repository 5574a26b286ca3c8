use tracing::{debug, warn};
use univ_kv::{Keys, KvRead, WriteTx};
use univ_types::ContentHash;

use crate::error::{StoreError, StoreResult};
use crate::object::{Chunk, ObjectCodec, ObjectKind};

/// Deduplicating store of encoded chunk objects.
///
/// Keys are the lowercase hex content hash; values are the compressed frame.
/// Storing the same content twice rewrites identical bytes under the same key.
#[derive(Clone, Debug)]
pub struct ChunkStore {
    bucket: String,
    codec: ObjectCodec,
    verify_on_read: bool,
}

impl ChunkStore {
    pub fn new(bucket: impl Into<String>, codec: ObjectCodec) -> Self {
        Self {
            bucket: bucket.into(),
            codec,
            verify_on_read: false,
        }
    }

    /// Re-hash decoded content on every read and reject mismatches.
    pub fn with_verify_on_read(mut self, verify: bool) -> Self {
        self.verify_on_read = verify;
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn codec(&self) -> &ObjectCodec {
        &self.codec
    }

    /// Encode and store `content`, returning its hash.
    pub fn put(&self, tx: &WriteTx, content: &[u8]) -> StoreResult<ContentHash> {
        let encoded = self.codec.encode(ObjectKind::Chunk, content)?;
        tx.put(&self.bucket, &encoded.hash.to_hex(), &encoded.bytes)?;
        debug!(
            hash = %encoded.hash.short_hex(),
            size = content.len(),
            stored = encoded.bytes.len(),
            "chunk stored"
        );
        Ok(encoded.hash)
    }

    pub fn put_chunk(&self, tx: &WriteTx, chunk: &Chunk) -> StoreResult<ContentHash> {
        self.put(tx, chunk.content())
    }

    /// Load and decode a chunk. A hash never stored is `Ok(None)`.
    pub fn get(&self, tx: &impl KvRead, hash: &ContentHash) -> StoreResult<Option<Vec<u8>>> {
        let Some(bytes) = tx.get(&self.bucket, &hash.to_hex())? else {
            return Ok(None);
        };
        let content = self.codec.decode(ObjectKind::Chunk, &bytes)?;

        if self.verify_on_read {
            let computed = self.codec.hash(ObjectKind::Chunk, &content);
            if computed != *hash {
                warn!(
                    expected = %hash.short_hex(),
                    computed = %computed.short_hex(),
                    "chunk content does not match its key"
                );
                return Err(StoreError::HashMismatch {
                    expected: *hash,
                    computed,
                });
            }
        }
        Ok(Some(content))
    }

    pub fn contains(&self, tx: &impl KvRead, hash: &ContentHash) -> StoreResult<bool> {
        Ok(tx.contains(&self.bucket, &hash.to_hex())?)
    }

    /// Hex hashes of every stored chunk, in key order.
    pub fn hashes<'tx, T: KvRead>(&self, tx: &'tx T) -> Keys<'tx, T> {
        tx.keys(&self.bucket)
    }
}

#[cfg(test)]
mod tests {
    use univ_crypto::ContentHasher;
    use univ_kv::{KvDb, KvOptions, KvResult};

    use super::*;
    use crate::object::Compression;

    fn open(dir: &tempfile::TempDir) -> KvDb {
        KvDb::open(dir.path().join("store.redb"), KvOptions::default()).unwrap()
    }

    #[test]
    fn put_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());

        let tx = db.begin_write().unwrap();
        let hash = store.put(&tx, b"Hello, world!").unwrap();
        tx.commit().unwrap();

        let tx = db.begin_read().unwrap();
        assert_eq!(store.get(&tx, &hash).unwrap(), Some(b"Hello, world!".to_vec()));
        assert!(store.contains(&tx, &hash).unwrap());
    }

    #[test]
    fn unknown_hash_and_missing_bucket_are_none() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());
        let unknown = ContentHash::from_digest([0x5a; 32]);

        let tx = db.begin_read().unwrap();
        assert_eq!(store.get(&tx, &unknown).unwrap(), None);

        let tx = db.begin_write().unwrap();
        store.put(&tx, b"something").unwrap();
        assert_eq!(store.get(&tx, &unknown).unwrap(), None);
        assert!(!store.contains(&tx, &unknown).unwrap());
    }

    #[test]
    fn put_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());

        let tx = db.begin_write().unwrap();
        let first = store.put(&tx, b"same").unwrap();
        let stored = tx.get("chunk", &first.to_hex()).unwrap();
        let second = store.put(&tx, b"same").unwrap();
        assert_eq!(first, second);
        assert_eq!(tx.get("chunk", &first.to_hex()).unwrap(), stored);
        tx.commit().unwrap();

        let tx = db.begin_read().unwrap();
        assert_eq!(store.hashes(&tx).count(), 1);
    }

    #[test]
    fn empty_content_is_a_present_chunk() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());

        let tx = db.begin_write().unwrap();
        let hash = store.put_chunk(&tx, &Chunk::new(Vec::new())).unwrap();
        assert_eq!(store.get(&tx, &hash).unwrap(), Some(Vec::new()));
    }

    #[test]
    fn rolled_back_put_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());

        let tx = db.begin_write().unwrap();
        let hash = store.put(&tx, b"ephemeral").unwrap();
        tx.rollback().unwrap();

        let tx = db.begin_read().unwrap();
        assert_eq!(store.get(&tx, &hash).unwrap(), None);
    }

    #[test]
    fn verify_on_read_catches_misfiled_content() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let codec = ObjectCodec::new(ContentHasher::BLAKE3, Compression::Identity);
        let store = ChunkStore::new("chunk", codec).with_verify_on_read(true);
        let wrong_key = ContentHash::from_digest([1; 32]);

        let tx = db.begin_write().unwrap();
        tx.put("chunk", &wrong_key.to_hex(), &codec.frame(ObjectKind::Chunk, b"abc"))
            .unwrap();
        let err = store.get(&tx, &wrong_key).unwrap_err();
        assert!(matches!(err, StoreError::HashMismatch { expected, .. } if expected == wrong_key));

        let lenient = ChunkStore::new("chunk", codec);
        assert_eq!(lenient.get(&tx, &wrong_key).unwrap(), Some(b"abc".to_vec()));
    }

    #[test]
    fn corrupt_value_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let codec = ObjectCodec::new(ContentHasher::BLAKE3, Compression::Identity);
        let store = ChunkStore::new("chunk", codec);
        let key = ContentHash::from_digest([2; 32]);

        let tx = db.begin_write().unwrap();
        tx.put("chunk", &key.to_hex(), b"chunk 99\0short").unwrap();
        assert!(matches!(
            store.get(&tx, &key),
            Err(StoreError::CorruptObject { .. })
        ));
    }

    #[test]
    fn hashes_lists_hex_keys() {
        let dir = tempfile::tempdir().unwrap();
        let db = open(&dir);
        let store = ChunkStore::new("chunk", ObjectCodec::default());

        let tx = db.begin_write().unwrap();
        let mut expected: Vec<String> = [&b"a"[..], &b"b"[..], &b"c"[..]]
            .iter()
            .map(|c| store.put(&tx, c).unwrap().to_hex())
            .collect();
        tx.commit().unwrap();
        expected.sort();

        let tx = db.begin_read().unwrap();
        let listed: Vec<String> = store.hashes(&tx).collect::<KvResult<_>>().unwrap();
        assert_eq!(listed, expected);
    }
}
