use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use univ_crypto::TreeLayout;
use univ_diff::{collect_leaves, diff_roots, ChunkDiff};
use univ_kv::{KvDb, KvRead, ReadTx, WriteTx};
use univ_store::{Chunk, ChunkStore, DocumentIndex, EmbeddingCache, ObjectCodec};
use univ_types::ContentHash;

use crate::chunker::Chunker;
use crate::config::UniverseConfig;
use crate::error::{UniverseError, UniverseResult};
use crate::provider::EmbeddingProvider;

/// What one ingestion of a document did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IngestReport {
    pub path: String,
    pub root: ContentHash,
    /// Root the path pointed at before, as stored. The diff ignores it when
    /// it names nothing in the store.
    pub previous_root: Option<ContentHash>,
    /// Chunk hashes of the new version, in document order.
    pub chunks: Vec<ContentHash>,
    pub diff: ChunkDiff,
    /// Added chunks that have no cached embedding yet.
    pub needs_embedding: Vec<ContentHash>,
}

/// Key counts per bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UniverseStats {
    pub chunks: usize,
    pub embeddings: usize,
    pub documents: usize,
    pub nodes: usize,
}

struct Components {
    chunks: ChunkStore,
    embeddings: EmbeddingCache,
    index: DocumentIndex,
    layout: TreeLayout,
    chunker: Chunker,
}

/// One transaction's view of a universe.
///
/// Reads are available on both [`Snapshot`] and [`Batch`]; writes only on
/// [`Batch`]. A scope borrows its transaction, so it cannot escape the
/// [`Universe::view`] or [`Universe::update`] call that created it.
pub struct Scope<'a, T> {
    tx: &'a T,
    parts: &'a Components,
}

/// Read-only scope over a consistent snapshot.
pub type Snapshot<'a> = Scope<'a, ReadTx>;
/// Read-write scope; its writes commit or roll back together.
pub type Batch<'a> = Scope<'a, WriteTx>;

impl<T: KvRead> Scope<'_, T> {
    pub fn get_chunk(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<u8>>> {
        Ok(self.parts.chunks.get(self.tx, hash)?)
    }

    pub fn has_chunk(&self, hash: &ContentHash) -> UniverseResult<bool> {
        Ok(self.parts.chunks.contains(self.tx, hash)?)
    }

    /// A stored chunk together with its cached embedding, if any.
    pub fn load_chunk(&self, hash: &ContentHash) -> UniverseResult<Option<Chunk>> {
        let Some(content) = self.get_chunk(hash)? else {
            return Ok(None);
        };
        let mut chunk = Chunk::new(content);
        if let Some(vector) = self.get_embedding(hash)? {
            chunk.set_embedding(vector);
        }
        Ok(Some(chunk))
    }

    pub fn get_embedding(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<f64>>> {
        Ok(self.parts.embeddings.get(self.tx, hash)?)
    }

    pub fn get_root(&self, path: &str) -> UniverseResult<Option<ContentHash>> {
        Ok(self.parts.index.get_root(self.tx, path)?)
    }

    pub fn get_node(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<ContentHash>>> {
        Ok(self.parts.index.get_node(self.tx, hash)?)
    }

    /// Paths of every indexed document, in key order.
    pub fn documents(&self) -> UniverseResult<Vec<String>> {
        let paths = self
            .parts
            .index
            .documents(self.tx)
            .collect::<Result<_, _>>()?;
        Ok(paths)
    }

    /// Chunk hashes of the indexed version of `path`, in document order.
    pub fn document_chunks(&self, path: &str) -> UniverseResult<Option<Vec<ContentHash>>> {
        match self.get_root(path)? {
            Some(root) => Ok(Some(self.leaves(&root)?)),
            None => Ok(None),
        }
    }

    /// Content of the `index`th chunk of `path`. `None` if the document is
    /// unknown or shorter than that.
    pub fn chunk_at(&self, path: &str, index: usize) -> UniverseResult<Option<Vec<u8>>> {
        let Some(leaves) = self.document_chunks(path)? else {
            return Ok(None);
        };
        match leaves.get(index) {
            Some(hash) => self.get_chunk(hash),
            None => Ok(None),
        }
    }

    fn leaves(&self, root: &ContentHash) -> UniverseResult<Vec<ContentHash>> {
        Ok(collect_leaves(
            &self.parts.index,
            &self.parts.chunks,
            self.tx,
            root,
        )?)
    }

    /// The stored root of `path`, or `None` when it points at something
    /// that was never stored. A later ingest replaces such a root.
    fn walkable_root(&self, path: &str) -> UniverseResult<Option<ContentHash>> {
        let Some(root) = self.get_root(path)? else {
            return Ok(None);
        };
        if self.parts.index.is_node(self.tx, &root)? || self.has_chunk(&root)? {
            return Ok(Some(root));
        }
        warn!(path, root = %root.short_hex(), "document root is not stored, ignoring it");
        Ok(None)
    }

    /// Distinct chunks of `path` with no cached embedding, in document order.
    /// An unknown document has none.
    pub fn missing_embeddings(&self, path: &str) -> UniverseResult<Vec<ContentHash>> {
        let Some(leaves) = self.document_chunks(path)? else {
            return Ok(Vec::new());
        };
        let mut seen = HashSet::new();
        let mut missing = Vec::new();
        for hash in leaves {
            if seen.insert(hash) && !self.parts.embeddings.contains(self.tx, &hash)? {
                missing.push(hash);
            }
        }
        Ok(missing)
    }

    /// Diff two stored roots.
    pub fn diff(&self, old: Option<&ContentHash>, new: &ContentHash) -> UniverseResult<ChunkDiff> {
        Ok(diff_roots(
            &self.parts.index,
            &self.parts.chunks,
            self.tx,
            old,
            new,
        )?)
    }

    /// What ingesting `content` at `path` would change, without writing.
    pub fn detect_changes(&self, path: &str, content: &[u8]) -> UniverseResult<ChunkDiff> {
        let codec: &ObjectCodec = self.parts.chunks.codec();
        let leaves: Vec<ContentHash> = self
            .parts
            .chunker
            .split(content)
            .iter()
            .map(|chunk| chunk.hash(codec))
            .collect();
        let new_root = self.parts.index.compute_root(&leaves, &self.parts.layout);

        let old_root = self.walkable_root(path)?;
        if old_root == Some(new_root) {
            return Ok(ChunkDiff::identical(new_root));
        }
        let old_leaves = match old_root {
            Some(root) => self.leaves(&root)?,
            None => Vec::new(),
        };
        Ok(ChunkDiff::from_leaves(
            old_root, new_root, &old_leaves, &leaves,
        ))
    }

    pub fn stats(&self) -> UniverseResult<UniverseStats> {
        let count = |bucket: &str| -> UniverseResult<usize> {
            let mut n = 0;
            for key in self.tx.keys(bucket) {
                key?;
                n += 1;
            }
            Ok(n)
        };
        Ok(UniverseStats {
            chunks: count(self.parts.chunks.bucket())?,
            embeddings: count(self.parts.embeddings.bucket())?,
            documents: count(self.parts.index.root_bucket())?,
            nodes: count(self.parts.index.tree_bucket())?,
        })
    }
}

impl Scope<'_, WriteTx> {
    pub fn put_chunk(&self, content: &[u8]) -> UniverseResult<ContentHash> {
        Ok(self.parts.chunks.put(self.tx, content)?)
    }

    pub fn put_embedding(&self, hash: &ContentHash, vector: &[f64]) -> UniverseResult<()> {
        Ok(self.parts.embeddings.put(self.tx, hash, vector)?)
    }

    pub fn set_root(&self, path: &str, root: &ContentHash) -> UniverseResult<()> {
        Ok(self.parts.index.set_root(self.tx, path, root)?)
    }

    pub fn remove_root(&self, path: &str) -> UniverseResult<bool> {
        Ok(self.parts.index.remove_root(self.tx, path)?)
    }

    pub fn put_node(&self, children: &[ContentHash]) -> UniverseResult<ContentHash> {
        Ok(self.parts.index.put_node(self.tx, children)?)
    }

    /// Chunk `content`, store its chunks and tree, and point `path` at the
    /// new root.
    pub fn ingest(&self, path: &str, content: &[u8]) -> UniverseResult<IngestReport> {
        let pieces = self.parts.chunker.split(content);
        let mut chunks = Vec::with_capacity(pieces.len());
        for piece in &pieces {
            chunks.push(self.parts.chunks.put_chunk(self.tx, piece)?);
        }
        let root = self
            .parts
            .index
            .build_tree(self.tx, &chunks, &self.parts.layout)?;

        let previous_root = self.get_root(path)?;
        let diff = self.diff(self.walkable_root(path)?.as_ref(), &root)?;
        if previous_root != Some(root) {
            self.set_root(path, &root)?;
        }

        let mut needs_embedding = Vec::new();
        for hash in &diff.added {
            if !self.parts.embeddings.contains(self.tx, hash)? {
                needs_embedding.push(*hash);
            }
        }

        info!(
            path,
            root = %root.short_hex(),
            chunks = chunks.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            "document ingested"
        );
        Ok(IngestReport {
            path: path.to_string(),
            root,
            previous_root,
            chunks,
            diff,
            needs_embedding,
        })
    }

    /// Drop `path` from the index. Its chunks and nodes stay stored, since
    /// other documents may share them.
    pub fn forget_document(&self, path: &str) -> UniverseResult<bool> {
        let removed = self.remove_root(path)?;
        if removed {
            debug!(path, "document forgotten");
        }
        Ok(removed)
    }
}

// ---------------------------------------------------------------------------
// Universe
// ---------------------------------------------------------------------------

/// A content-addressed chunk store with per-document change detection.
///
/// Owns one engine handle and the four buckets inside it. Each convenience
/// method runs in its own transaction; use [`Universe::update`] or
/// [`Universe::view`] to group several operations atomically.
pub struct Universe {
    db: Option<KvDb>,
    path: PathBuf,
    config: UniverseConfig,
    parts: Components,
}

impl Universe {
    /// Open (or create) a universe with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> UniverseResult<Self> {
        Self::open_with_config(path, UniverseConfig::default())
    }

    /// Open (or create) a universe, ensuring all four buckets exist.
    pub fn open_with_config(path: impl AsRef<Path>, config: UniverseConfig) -> UniverseResult<Self> {
        config.validate()?;
        let layout = config.layout()?;
        let path = path.as_ref().to_path_buf();

        let db = KvDb::open(&path, config.kv_options())?;
        let tx = db.begin_write()?;
        for bucket in config.buckets.all() {
            tx.make_bucket(bucket)?;
        }
        tx.commit()?;

        let codec = config.codec();
        let parts = Components {
            chunks: ChunkStore::new(&config.buckets.chunk, codec)
                .with_verify_on_read(config.verify_on_read),
            embeddings: EmbeddingCache::new(&config.buckets.embedding),
            index: DocumentIndex::new(&config.buckets.root, &config.buckets.tree, codec),
            layout,
            chunker: config.chunker(),
        };

        info!(
            path = %path.display(),
            hash = %config.hash,
            fanout = config.tree_fanout,
            "universe opened"
        );
        Ok(Self {
            db: Some(db),
            path,
            config,
            parts,
        })
    }

    /// Release the engine. Calling it again does nothing.
    pub fn close(&mut self) -> UniverseResult<()> {
        if let Some(db) = self.db.take() {
            db.close();
            info!(path = %self.path.display(), "universe closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.db.is_none()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &UniverseConfig {
        &self.config
    }

    fn db(&self) -> UniverseResult<&KvDb> {
        self.db.as_ref().ok_or(UniverseError::Closed)
    }

    /// Run `f` in a read-only transaction.
    pub fn view<R, F>(&self, f: F) -> UniverseResult<R>
    where
        F: FnOnce(&Snapshot<'_>) -> UniverseResult<R>,
    {
        let tx = self.db()?.begin_read()?;
        f(&Scope {
            tx: &tx,
            parts: &self.parts,
        })
    }

    /// Run `f` in a read-write transaction, committing if it returns `Ok`
    /// and rolling back if it returns `Err`.
    pub fn update<R, F>(&self, f: F) -> UniverseResult<R>
    where
        F: FnOnce(&Batch<'_>) -> UniverseResult<R>,
    {
        let tx = self.db()?.begin_write()?;
        let result = f(&Scope {
            tx: &tx,
            parts: &self.parts,
        });
        match result {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(e)
            }
        }
    }

    // ---- Single-operation conveniences ----

    pub fn put_chunk(&self, content: &[u8]) -> UniverseResult<ContentHash> {
        self.update(|batch| batch.put_chunk(content))
    }

    pub fn get_chunk(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<u8>>> {
        self.view(|snapshot| snapshot.get_chunk(hash))
    }

    pub fn load_chunk(&self, hash: &ContentHash) -> UniverseResult<Option<Chunk>> {
        self.view(|snapshot| snapshot.load_chunk(hash))
    }

    pub fn put_embedding(&self, hash: &ContentHash, vector: &[f64]) -> UniverseResult<()> {
        self.update(|batch| batch.put_embedding(hash, vector))
    }

    pub fn get_embedding(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<f64>>> {
        self.view(|snapshot| snapshot.get_embedding(hash))
    }

    pub fn get_root(&self, path: &str) -> UniverseResult<Option<ContentHash>> {
        self.view(|snapshot| snapshot.get_root(path))
    }

    pub fn set_root(&self, path: &str, root: &ContentHash) -> UniverseResult<()> {
        self.update(|batch| batch.set_root(path, root))
    }

    pub fn remove_root(&self, path: &str) -> UniverseResult<bool> {
        self.update(|batch| batch.remove_root(path))
    }

    pub fn get_node(&self, hash: &ContentHash) -> UniverseResult<Option<Vec<ContentHash>>> {
        self.view(|snapshot| snapshot.get_node(hash))
    }

    pub fn put_node(&self, children: &[ContentHash]) -> UniverseResult<ContentHash> {
        self.update(|batch| batch.put_node(children))
    }

    // ---- Documents ----

    pub fn ingest(&self, path: &str, content: &[u8]) -> UniverseResult<IngestReport> {
        self.update(|batch| batch.ingest(path, content))
    }

    pub fn detect_changes(&self, path: &str, content: &[u8]) -> UniverseResult<ChunkDiff> {
        self.view(|snapshot| snapshot.detect_changes(path, content))
    }

    pub fn document_chunks(&self, path: &str) -> UniverseResult<Option<Vec<ContentHash>>> {
        self.view(|snapshot| snapshot.document_chunks(path))
    }

    pub fn chunk_at(&self, path: &str, index: usize) -> UniverseResult<Option<Vec<u8>>> {
        self.view(|snapshot| snapshot.chunk_at(path, index))
    }

    pub fn missing_embeddings(&self, path: &str) -> UniverseResult<Vec<ContentHash>> {
        self.view(|snapshot| snapshot.missing_embeddings(path))
    }

    pub fn documents(&self) -> UniverseResult<Vec<String>> {
        self.view(|snapshot| snapshot.documents())
    }

    pub fn forget_document(&self, path: &str) -> UniverseResult<bool> {
        self.update(|batch| batch.forget_document(path))
    }

    pub fn stats(&self) -> UniverseResult<UniverseStats> {
        self.view(|snapshot| snapshot.stats())
    }

    /// Compute and cache embeddings for every chunk of `path` that lacks
    /// one. Returns how many were cached.
    ///
    /// The provider is called outside any transaction; the results are
    /// written together, so a provider failure caches nothing.
    pub fn embed_missing(
        &self,
        path: &str,
        provider: &dyn EmbeddingProvider,
    ) -> UniverseResult<usize> {
        let pending: Vec<(ContentHash, Vec<u8>)> = self.view(|snapshot| {
            let mut pending = Vec::new();
            for hash in snapshot.missing_embeddings(path)? {
                match snapshot.get_chunk(&hash)? {
                    Some(content) => pending.push((hash, content)),
                    None => warn!(hash = %hash.short_hex(), "indexed chunk is not stored"),
                }
            }
            Ok(pending)
        })?;
        if pending.is_empty() {
            return Ok(0);
        }

        let inputs: Vec<&[u8]> = pending.iter().map(|(_, content)| content.as_slice()).collect();
        let vectors = provider
            .embed_batch(&inputs)
            .map_err(UniverseError::Provider)?;
        if vectors.len() != pending.len() {
            return Err(UniverseError::Provider(
                format!(
                    "asked for {} embeddings, got {}",
                    pending.len(),
                    vectors.len()
                )
                .into(),
            ));
        }

        self.update(|batch| {
            for ((hash, _), vector) in pending.iter().zip(&vectors) {
                batch.put_embedding(hash, vector)?;
            }
            Ok(())
        })?;
        debug!(path, count = pending.len(), "embeddings cached");
        Ok(pending.len())
    }
}

impl std::fmt::Debug for Universe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Universe")
            .field("path", &self.path)
            .field("closed", &self.is_closed())
            .finish()
    }
}
