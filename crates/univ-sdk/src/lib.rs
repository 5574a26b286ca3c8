//! High-level API for the universe store.
//!
//! A [`Universe`] owns one embedded key-value file holding four buckets:
//! chunk content, cached embeddings, document roots and merkle tree nodes.
//! Documents are split into chunks, every chunk is stored once under its
//! content hash, and each document version is indexed as a merkle tree, so
//! re-ingesting a document reports exactly which chunks changed.
//!
//! ```no_run
//! use univ_sdk::Universe;
//!
//! # fn main() -> univ_sdk::UniverseResult<()> {
//! let universe = Universe::open("notes.redb")?;
//! let report = universe.ingest("guide.md", b"First paragraph.\n\nSecond.")?;
//! println!("{} chunks need embedding", report.needs_embedding.len());
//! # Ok(())
//! # }
//! ```

pub mod chunker;
pub mod config;
pub mod error;
pub mod provider;
pub mod universe;

pub use chunker::Chunker;
pub use config::{ChunkingConfig, UniverseConfig};
pub use error::{BoxError, UniverseError, UniverseResult};
pub use provider::EmbeddingProvider;
pub use universe::{Batch, IngestReport, Scope, Snapshot, Universe, UniverseStats};

// Re-export key types
pub use univ_crypto::HashAlgorithm;
pub use univ_diff::ChunkDiff;
pub use univ_store::{BucketNames, Chunk, Compression};
pub use univ_types::ContentHash;
