use std::io::{Read, Write};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use univ_crypto::{ContentHasher, HashAlgorithm};
use univ_types::ContentHash;

use crate::error::{StoreError, StoreResult};

/// The kind of object being framed. The tag is the first word of the header.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A slice of document content.
    Chunk,
    /// A merkle node: the ordered digests of its children.
    Tree,
}

impl ObjectKind {
    /// ASCII tag written into the object header.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Chunk => "chunk",
            Self::Tree => "tree",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

// ---------------------------------------------------------------------------
// Compression
// ---------------------------------------------------------------------------

/// Highest zlib level; larger values are treated as this one.
pub const MAX_ZLIB_LEVEL: u32 = 9;

/// Reversible byte transform applied to a framed object before storage.
///
/// The content hash is always taken before this step, so switching
/// compression never changes a key, but a store can only read back what it
/// wrote with the same setting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "snake_case")]
pub enum Compression {
    Zstd { level: i32 },
    Zlib { level: u32 },
    Identity,
}

impl Default for Compression {
    fn default() -> Self {
        Self::Zstd { level: 3 }
    }
}

impl Compression {
    pub fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match *self {
            Self::Zstd { level } => zstd::encode_all(data, level),
            Self::Zlib { level } => {
                let level = flate2::Compression::new(level.min(MAX_ZLIB_LEVEL));
                let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), level);
                encoder.write_all(data)?;
                encoder.finish()
            }
            Self::Identity => Ok(data.to_vec()),
        }
    }

    pub fn decompress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        match *self {
            Self::Zstd { .. } => zstd::decode_all(data),
            Self::Zlib { .. } => {
                let mut out = Vec::new();
                flate2::read::ZlibDecoder::new(data).read_to_end(&mut out)?;
                Ok(out)
            }
            Self::Identity => Ok(data.to_vec()),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectCodec
// ---------------------------------------------------------------------------

/// An encoded object ready to be written under its hash.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedObject {
    pub hash: ContentHash,
    pub bytes: Vec<u8>,
}

/// Git-style object framing: `"<tag> <len>\0"` followed by the raw content.
///
/// The hash covers the uncompressed frame, so it can be recomputed from the
/// content alone by anything that knows the framing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ObjectCodec {
    hasher: ContentHasher,
    compression: Compression,
}

impl ObjectCodec {
    pub fn new(hasher: ContentHasher, compression: Compression) -> Self {
        Self {
            hasher,
            compression,
        }
    }

    pub fn hasher(&self) -> &ContentHasher {
        &self.hasher
    }

    pub fn compression(&self) -> Compression {
        self.compression
    }

    fn header(kind: ObjectKind, len: usize) -> String {
        format!("{} {}\0", kind.tag(), len)
    }

    /// The uncompressed frame: header then content.
    pub fn frame(&self, kind: ObjectKind, content: &[u8]) -> Vec<u8> {
        let header = Self::header(kind, content.len());
        let mut frame = Vec::with_capacity(header.len() + content.len());
        frame.extend_from_slice(header.as_bytes());
        frame.extend_from_slice(content);
        frame
    }

    /// Content hash of an object, without building or compressing the frame.
    pub fn hash(&self, kind: ObjectKind, content: &[u8]) -> ContentHash {
        let header = Self::header(kind, content.len());
        self.hasher.hash_parts(&[header.as_bytes(), content])
    }

    pub fn encode(&self, kind: ObjectKind, content: &[u8]) -> StoreResult<EncodedObject> {
        let frame = self.frame(kind, content);
        let hash = self.hasher.hash(&frame);
        let bytes = self
            .compression
            .compress(&frame)
            .map_err(StoreError::Codec)?;
        Ok(EncodedObject { hash, bytes })
    }

    /// Decompress and unframe, returning the raw content.
    pub fn decode(&self, kind: ObjectKind, bytes: &[u8]) -> StoreResult<Vec<u8>> {
        let frame = self
            .compression
            .decompress(bytes)
            .map_err(StoreError::Codec)?;
        let start = parse_header(kind, &frame)?;
        Ok(frame[start..].to_vec())
    }
}

/// Validate the header of `frame` and return the offset of the payload.
fn parse_header(kind: ObjectKind, frame: &[u8]) -> StoreResult<usize> {
    let nul = frame
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| StoreError::corrupt("missing header terminator"))?;
    let header = std::str::from_utf8(&frame[..nul])
        .map_err(|_| StoreError::corrupt("header is not ASCII"))?;
    let (tag, len) = header
        .split_once(' ')
        .ok_or_else(|| StoreError::corrupt(format!("header {header:?} has no length")))?;

    if tag != kind.tag() {
        return Err(StoreError::corrupt(format!(
            "expected {kind} object, found tag {tag:?}"
        )));
    }
    if len.is_empty() || !len.bytes().all(|b| b.is_ascii_digit()) {
        return Err(StoreError::corrupt(format!("length {len:?} is not decimal")));
    }
    let declared: usize = len
        .parse()
        .map_err(|_| StoreError::corrupt(format!("length {len} overflows")))?;

    let payload = frame.len() - nul - 1;
    if payload != declared {
        return Err(StoreError::corrupt(format!(
            "declared length {declared}, payload is {payload} bytes"
        )));
    }
    Ok(nul + 1)
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A contiguous slice of document content plus its embedding, once known.
///
/// The hash covers only the content, never the embedding. It is computed on
/// first request and cached for the algorithm that produced it.
#[derive(Clone, Debug)]
pub struct Chunk {
    content: Vec<u8>,
    embedding: Option<Vec<f64>>,
    hash: OnceLock<(HashAlgorithm, ContentHash)>,
}

impl Chunk {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            content: content.into(),
            embedding: None,
            hash: OnceLock::new(),
        }
    }

    pub fn with_embedding(mut self, embedding: Vec<f64>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    pub fn into_content(self) -> Vec<u8> {
        self.content
    }

    pub fn embedding(&self) -> Option<&[f64]> {
        self.embedding.as_deref()
    }

    pub fn set_embedding(&mut self, embedding: Vec<f64>) {
        self.embedding = Some(embedding);
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Content hash under `codec`'s algorithm.
    pub fn hash(&self, codec: &ObjectCodec) -> ContentHash {
        let algorithm = codec.hasher().algorithm();
        if let Some((cached_for, hash)) = self.hash.get() {
            if *cached_for == algorithm {
                return *hash;
            }
        }
        let hash = codec.hash(ObjectKind::Chunk, &self.content);
        // Only the first algorithm is cached; others are recomputed.
        let _ = self.hash.set((algorithm, hash));
        hash
    }
}

impl PartialEq for Chunk {
    fn eq(&self, other: &Self) -> bool {
        self.content == other.content && self.embedding == other.embedding
    }
}
