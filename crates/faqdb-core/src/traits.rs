use crate::error::{Error, Result};
use crate::types::SourceItem;

/// Text → fixed-length vector. Implementations return L2-normalized vectors of
/// length [`Embedder::dim`] and reject empty or whitespace-only input with
/// [`Error::InvalidInput`].
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }
}

/// Full scan over all indexable content, used to rebuild the index.
pub trait ContentSource: Send + Sync {
    fn items(&self) -> Result<Box<dyn Iterator<Item = SourceItem> + '_>>;
}

/// Guard shared by embedder implementations.
pub fn ensure_embeddable(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(Error::InvalidInput("text cannot be empty".to_string()));
    }
    Ok(())
}
