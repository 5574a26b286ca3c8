use serde::{Deserialize, Serialize};
use sha2::Digest as _;
use univ_types::ContentHash;

/// The fixed-output digest function behind every content hash.
///
/// Both algorithms produce 32 bytes. A store must keep using the algorithm it
/// was created with: changing it re-keys every object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Blake3,
    Sha256,
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Blake3 => write!(f, "blake3"),
            Self::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Content hasher over a chosen [`HashAlgorithm`].
///
/// Hashing is never domain-prefixed here: callers frame their bytes (the
/// object codec prepends a typed header) so the digest equals a plain digest
/// of the framed buffer and can be recomputed by any tool that knows the
/// framing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ContentHasher {
    algorithm: HashAlgorithm,
}

impl ContentHasher {
    pub const BLAKE3: Self = Self::new(HashAlgorithm::Blake3);
    pub const SHA256: Self = Self::new(HashAlgorithm::Sha256);

    pub const fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// Hash raw bytes.
    pub fn hash(&self, data: &[u8]) -> ContentHash {
        self.hash_parts(&[data])
    }

    /// Hash the concatenation of `parts` without materializing it.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> ContentHash {
        match self.algorithm {
            HashAlgorithm::Blake3 => {
                let mut hasher = blake3::Hasher::new();
                for part in parts {
                    hasher.update(*part);
                }
                ContentHash::from_digest(*hasher.finalize().as_bytes())
            }
            HashAlgorithm::Sha256 => {
                let mut hasher = sha2::Sha256::new();
                for part in parts {
                    hasher.update(*part);
                }
                let mut digest = [0u8; 32];
                digest.copy_from_slice(&hasher.finalize());
                ContentHash::from_digest(digest)
            }
        }
    }

    /// Verify that data produces the expected hash.
    pub fn verify(&self, data: &[u8], expected: &ContentHash) -> bool {
        self.hash(data) == *expected
    }

    /// The algorithm this hasher runs.
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let data = b"hello world";
        assert_eq!(ContentHasher::BLAKE3.hash(data), ContentHasher::BLAKE3.hash(data));
        assert_eq!(ContentHasher::SHA256.hash(data), ContentHasher::SHA256.hash(data));
    }

    #[test]
    fn sha256_known_answer() {
        let hash = ContentHasher::SHA256.hash(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn blake3_known_answer() {
        let hash = ContentHasher::BLAKE3.hash(b"");
        assert_eq!(
            hash.to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }

    #[test]
    fn algorithms_disagree() {
        let data = b"same content";
        assert_ne!(ContentHasher::BLAKE3.hash(data), ContentHasher::SHA256.hash(data));
    }

    #[test]
    fn parts_equal_concatenation() {
        for hasher in [ContentHasher::BLAKE3, ContentHasher::SHA256] {
            let whole = hasher.hash(b"chunk 5\0hello");
            let parts = hasher.hash_parts(&[&b"chunk 5\0"[..], &b"hel"[..], &b"lo"[..]]);
            assert_eq!(whole, parts);
        }
    }

    #[test]
    fn verify_detects_tampering() {
        let id = ContentHasher::BLAKE3.hash(b"original");
        assert!(ContentHasher::BLAKE3.verify(b"original", &id));
        assert!(!ContentHasher::BLAKE3.verify(b"tampered", &id));
    }

    #[test]
    fn default_is_blake3() {
        assert_eq!(ContentHasher::default().algorithm(), HashAlgorithm::Blake3);
        assert_eq!(HashAlgorithm::Sha256.to_string(), "sha256");
    }

    #[test]
    fn digest_bytes_match_hex() {
        let hash = ContentHasher::SHA256.hash(b"abc");
        assert_eq!(hex::encode(hash.as_bytes()), hash.to_hex());
    }
}
