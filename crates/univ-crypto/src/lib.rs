//! Cryptographic primitives for the universe store.
//!
//! Provides the pluggable fixed-output digest behind every content hash and
//! the level-folding shape used to build a document's merkle tree.
//!
//! All crypto operations wrap established libraries -- no custom cryptography.

pub mod hasher;
pub mod merkle;

pub use hasher::{ContentHasher, HashAlgorithm};
pub use merkle::{TreeLayout, DEFAULT_FANOUT};
