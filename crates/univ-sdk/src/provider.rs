use crate::error::BoxError;

/// Source of embedding vectors for chunk content.
///
/// Implementations usually call a remote model. The universe only asks for
/// vectors it has not cached, and never while holding a write transaction.
pub trait EmbeddingProvider {
    fn embed(&self, content: &[u8]) -> Result<Vec<f64>, BoxError>;

    /// Embed several chunks at once, one vector per input in order.
    ///
    /// The default calls [`EmbeddingProvider::embed`] for each input.
    fn embed_batch(&self, contents: &[&[u8]]) -> Result<Vec<Vec<f64>>, BoxError> {
        contents.iter().map(|content| self.embed(content)).collect()
    }
}
