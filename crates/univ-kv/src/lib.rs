//! Transactional key-value engine for the universe store.
//!
//! A thin adapter over [`redb`] exposing the only model the upper layers
//! rely on: named buckets holding string-keyed byte values, read and write
//! transactions with atomic commit/rollback, and bucket creation on demand.
//!
//! # Design Rules
//!
//! 1. A missing bucket reads exactly like a missing key: `Ok(None)`.
//! 2. Every mutation happens inside a [`WriteTx`]; dropping one without
//!    committing discards its writes.
//! 3. Key listing is a pull-based [`Keys`] iterator that borrows its
//!    transaction, so it can never outlive it.
//! 4. Engine errors are propagated unchanged, never retried here.

pub mod db;
pub mod error;
pub mod keys;
pub mod tx;

pub use db::{KvDb, KvOptions, DEFAULT_PAGE_SIZE};
pub use error::{KvError, KvResult};
pub use keys::Keys;
pub use tx::{KvRead, ReadTx, WriteTx};
