//! Content-addressed object storage for the universe store.
//!
//! Every chunk of document content is framed git-style
//! (`"chunk <len>\0" + bytes`), hashed before compression, and written under
//! the lowercase hex of that hash. Embeddings are cached under the same
//! hash, and documents are indexed as merkle trees of chunk hashes.
//!
//! # Components
//!
//! - [`ObjectCodec`] -- framing, hashing and [`Compression`]
//! - [`ChunkStore`] -- the `chunk` bucket
//! - [`EmbeddingCache`] -- the `embedding` bucket
//! - [`DocumentIndex`] -- the `root` and `tree` buckets
//!
//! Components hold no transactions of their own; every operation takes the
//! caller's [`univ_kv::ReadTx`] or [`univ_kv::WriteTx`], so several of them can
//! share one atomic scope.
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written; only document roots are replaced.
//! 2. A missing key or bucket is `Ok(None)`, never an error.
//! 3. Decoding checks structure (tag, length) before returning content.
//! 4. Engine errors are propagated unchanged.

pub mod buckets;
pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod object;

pub use buckets::{BucketNames, CHUNK_BUCKET, EMBEDDING_BUCKET, ROOT_BUCKET, TREE_BUCKET};
pub use chunk::ChunkStore;
pub use embedding::EmbeddingCache;
pub use error::{StoreError, StoreResult};
pub use index::DocumentIndex;
pub use object::{
    Chunk, Compression, EncodedObject, ObjectCodec, ObjectKind, MAX_ZLIB_LEVEL,
};
