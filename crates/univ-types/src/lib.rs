//! Foundation types for the universe store.
//!
//! Every chunk, merkle node and document root in the store is addressed by a
//! [`ContentHash`]: a 32-byte digest rendered as 64 lowercase hex characters
//! when used as a bucket key.

pub mod error;
pub mod hash;

pub use error::TypeError;
pub use hash::{ContentHash, HASH_LEN};
