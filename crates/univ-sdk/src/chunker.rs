use univ_store::Chunk;

/// Splits document content into chunks.
///
/// Content is first cut after every occurrence of the delimiter (the
/// delimiter stays with the chunk it ends). Any piece longer than
/// `max_chunk_bytes` is then cut into the fewest near-equal parts that fit.
/// Chunk boundaries therefore move only near an edit, which keeps most
/// chunk hashes stable across re-ingestion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunker {
    delimiter: Vec<u8>,
    max_chunk_bytes: usize,
}

impl Chunker {
    /// A `max_chunk_bytes` of zero is treated as one.
    pub fn new(delimiter: &str, max_chunk_bytes: usize) -> Self {
        Self {
            delimiter: delimiter.as_bytes().to_vec(),
            max_chunk_bytes: max_chunk_bytes.max(1),
        }
    }

    pub fn split(&self, content: &[u8]) -> Vec<Chunk> {
        self.pieces(content).into_iter().map(Chunk::new).collect()
    }

    /// Chunk boundaries as slices of `content`. Empty content has none.
    pub fn pieces<'a>(&self, content: &'a [u8]) -> Vec<&'a [u8]> {
        let mut pieces = Vec::new();
        for piece in split_after(content, &self.delimiter) {
            if piece.len() <= self.max_chunk_bytes {
                pieces.push(piece);
                continue;
            }
            let parts = piece.len().div_ceil(self.max_chunk_bytes);
            pieces.extend(piece.chunks(piece.len().div_ceil(parts)));
        }
        pieces
    }
}

fn split_after<'a>(content: &'a [u8], delimiter: &[u8]) -> Vec<&'a [u8]> {
    let mut out = Vec::new();
    let mut start = 0;
    if !delimiter.is_empty() {
        let mut i = 0;
        while i + delimiter.len() <= content.len() {
            if &content[i..i + delimiter.len()] == delimiter {
                let end = i + delimiter.len();
                out.push(&content[start..end]);
                start = end;
                i = end;
            } else {
                i += 1;
            }
        }
    }
    if start < content.len() {
        out.push(&content[start..]);
    }
    out
}
