//! Universe configuration, loadable from TOML.
//!
//! Every field has a default, so a file only needs the settings it changes:
//!
//! ```toml
//! hash = "sha256"
//! tree_fanout = 8
//!
//! [compression]
//! codec = "zlib"
//! level = 6
//!
//! [chunking]
//! max_chunk_bytes = 2048
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use univ_crypto::{ContentHasher, HashAlgorithm, TreeLayout, DEFAULT_FANOUT};
use univ_kv::{KvOptions, DEFAULT_PAGE_SIZE};
use univ_store::{BucketNames, Compression, ObjectCodec, MAX_ZLIB_LEVEL};

use crate::chunker::Chunker;
use crate::error::{UniverseError, UniverseResult};

/// Delimiter chunks are split after by default: a blank line.
pub const DEFAULT_DELIMITER: &str = "\n\n";
/// Largest chunk produced by default.
pub const DEFAULT_MAX_CHUNK_BYTES: usize = 4096;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Boundary a chunk ends after. Empty disables delimiter splitting.
    pub delimiter: String,
    /// Pieces longer than this are cut into near-equal parts.
    pub max_chunk_bytes: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            max_chunk_bytes: DEFAULT_MAX_CHUNK_BYTES,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UniverseConfig {
    pub hash: HashAlgorithm,
    pub tree_fanout: usize,
    /// Re-hash every chunk read and fail on mismatch.
    pub verify_on_read: bool,
    /// Engine page cache size; unset keeps the engine default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_size_bytes: Option<usize>,
    /// Keys fetched per page when listing a bucket.
    pub list_page_size: usize,
    pub buckets: BucketNames,
    pub compression: Compression,
    pub chunking: ChunkingConfig,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        Self {
            hash: HashAlgorithm::default(),
            tree_fanout: DEFAULT_FANOUT,
            verify_on_read: false,
            cache_size_bytes: None,
            list_page_size: DEFAULT_PAGE_SIZE,
            buckets: BucketNames::default(),
            compression: Compression::default(),
            chunking: ChunkingConfig::default(),
        }
    }
}

impl UniverseConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> UniverseResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| UniverseError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> UniverseResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> UniverseResult<String> {
        toml::to_string(self).map_err(|e| UniverseError::Config(e.to_string()))
    }

    pub fn validate(&self) -> UniverseResult<()> {
        if self.tree_fanout < 2 {
            return Err(UniverseError::Config(format!(
                "tree_fanout must be at least 2, got {}",
                self.tree_fanout
            )));
        }
        if self.chunking.max_chunk_bytes == 0 {
            return Err(UniverseError::Config(
                "chunking.max_chunk_bytes must be positive".into(),
            ));
        }
        if let Compression::Zlib { level } = self.compression {
            if level > MAX_ZLIB_LEVEL {
                return Err(UniverseError::Config(format!(
                    "zlib level must be at most {MAX_ZLIB_LEVEL}, got {level}"
                )));
            }
        }
        if self.list_page_size == 0 {
            return Err(UniverseError::Config(
                "list_page_size must be positive".into(),
            ));
        }
        self.buckets
            .validate()
            .map_err(|e| UniverseError::Config(e.to_string()))
    }

    pub fn codec(&self) -> ObjectCodec {
        ObjectCodec::new(ContentHasher::new(self.hash), self.compression)
    }

    pub fn layout(&self) -> UniverseResult<TreeLayout> {
        TreeLayout::new(self.tree_fanout).ok_or_else(|| {
            UniverseError::Config(format!("tree_fanout {} is too small", self.tree_fanout))
        })
    }

    pub fn chunker(&self) -> Chunker {
        Chunker::new(&self.chunking.delimiter, self.chunking.max_chunk_bytes)
    }

    pub fn kv_options(&self) -> KvOptions {
        KvOptions {
            cache_size_bytes: self.cache_size_bytes,
            page_size: self.list_page_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let c = UniverseConfig::default();
        assert_eq!(c.buckets, BucketNames::default());
        assert_eq!(c.hash, HashAlgorithm::Blake3);
        assert_eq!(c.compression, Compression::Zstd { level: 3 });
        assert_eq!(c.chunking.delimiter, "\n\n");
        assert_eq!(c.tree_fanout, 16);
        assert!(!c.verify_on_read);
        assert!(c.cache_size_bytes.is_none());
        c.validate().unwrap();
    }

    #[test]
    fn empty_toml_is_the_default() {
        assert_eq!(
            UniverseConfig::from_toml_str("").unwrap(),
            UniverseConfig::default()
        );
    }

    #[test]
    fn partial_toml_overrides_named_fields() {
        let c = UniverseConfig::from_toml_str(
            r#"
            hash = "sha256"
            tree_fanout = 4
            verify_on_read = true
            cache_size_bytes = 1048576

            [compression]
            codec = "zlib"
            level = 9

            [chunking]
            max_chunk_bytes = 100

            [buckets]
            chunk = "blobs"
            "#,
        )
        .unwrap();
        assert_eq!(c.hash, HashAlgorithm::Sha256);
        assert_eq!(c.tree_fanout, 4);
        assert!(c.verify_on_read);
        assert_eq!(c.cache_size_bytes, Some(1 << 20));
        assert_eq!(c.compression, Compression::Zlib { level: 9 });
        assert_eq!(c.chunking.max_chunk_bytes, 100);
        assert_eq!(c.chunking.delimiter, "\n\n");
        assert_eq!(c.buckets.chunk, "blobs");
        assert_eq!(c.buckets.tree, "tree");
        assert_eq!(c.codec().hasher().algorithm(), HashAlgorithm::Sha256);
        assert_eq!(c.kv_options().cache_size_bytes, Some(1 << 20));
    }

    #[test]
    fn toml_text_form_parses_back() {
        let mut c = UniverseConfig::default();
        c.compression = Compression::Identity;
        c.chunking.delimiter = "\n---\n".into();
        let text = c.to_toml_string().unwrap();
        assert_eq!(UniverseConfig::from_toml_str(&text).unwrap(), c);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for text in [
            "tree_fanout = 1",
            "list_page_size = 0",
            "[chunking]\nmax_chunk_bytes = 0",
            "[buckets]\nroot = \"tree\"",
            "[compression]\ncodec = \"zlib\"\nlevel = 50",
            "hash = \"md5\"",
            "tree_fanout = \"many\"",
        ] {
            let err = UniverseConfig::from_toml_str(text).unwrap_err();
            assert!(matches!(err, UniverseError::Config(_)), "{text}: {err}");
        }
    }

    #[test]
    fn load_reads_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("universe.toml");
        std::fs::write(&path, "tree_fanout = 3\n").unwrap();
        assert_eq!(UniverseConfig::load(&path).unwrap().tree_fanout, 3);

        let missing = UniverseConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(missing, UniverseError::Io(_)));
    }
}
