//! Change detection between two versions of a document.
//!
//! Documents are merkle trees of chunk hashes. Comparing an old and a new
//! root tells a caller exactly which chunks a re-ingestion introduced, so
//! only those need an embedding computed.
//!
//! # Key Types
//!
//! - [`ChunkDiff`] -- leaves added and removed between two roots
//! - [`diff_roots`] -- lock-step level walk pruning shared subtrees
//! - [`collect_leaves`] -- a document's chunk sequence

pub mod error;
pub mod merkle_diff;

pub use error::{DiffError, DiffResult};
pub use merkle_diff::{collect_leaves, diff_roots, ChunkDiff};
