use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;

use faqdb_core::math::{dot, normalize_in_place};
use faqdb_core::types::{DocumentMeta, Position, RawHit, Usage};
use faqdb_core::{Error, Result};

/// Exact inner-product index over unit vectors.
///
/// Vectors are stored row-major in one contiguous buffer; `metas[i]` belongs
/// to row `i`. Rows are only ever appended. The buffer is shared between
/// clones, so a metadata-only write never copies it.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dim: usize,
    vectors: Arc<Vec<f32>>,
    metas: Vec<DocumentMeta>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub total_vectors: usize,
    pub dimension: usize,
    pub metadata_count: usize,
    pub categories: BTreeMap<String, usize>,
}

impl FlatIndex {
    pub fn new(dim: usize) -> Self {
        Self { dim, vectors: Arc::new(Vec::new()), metas: Vec::new() }
    }

    /// Reassemble an index from persisted rows. Rows are trusted to be unit-norm.
    pub fn from_parts(dim: usize, vectors: Vec<f32>, metas: Vec<DocumentMeta>) -> Result<Self> {
        if dim == 0 || vectors.len() != dim * metas.len() {
            return Err(Error::IndexUnavailable(format!(
                "{} floats do not form {} rows of dimension {}",
                vectors.len(),
                metas.len(),
                dim
            )));
        }
        Ok(Self { dim, vectors: Arc::new(vectors), metas })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.metas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metas.is_empty()
    }

    /// Append `vector` (normalized on the way in) with its metadata.
    pub fn add(&mut self, mut vector: Vec<f32>, meta: DocumentMeta) -> Result<Position> {
        if vector.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() });
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::InvalidVector(format!("non-finite component in vector for {}", meta.doc_id)));
        }
        if !normalize_in_place(&mut vector) {
            return Err(Error::InvalidVector(format!("zero vector for {}", meta.doc_id)));
        }
        let position = self.metas.len();
        Arc::make_mut(&mut self.vectors).extend_from_slice(&vector);
        self.metas.push(meta);
        Ok(position)
    }

    /// Top `k` rows by inner product with `query`, best first, ties by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, Position)>> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch { expected: self.dim, actual: query.len() });
        }
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(f32, Position)> = self
            .vectors
            .chunks_exact(self.dim)
            .enumerate()
            .map(|(pos, row)| (dot(row, query), pos))
            .collect();
        scored.sort_by(|a, b| match b.0.total_cmp(&a.0) {
            Ordering::Equal => a.1.cmp(&b.1),
            other => other,
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// [`FlatIndex::search`] with metadata and stored vectors resolved.
    pub fn hits(&self, query: &[f32], k: usize) -> Result<Vec<RawHit>> {
        Ok(self
            .search(query, k)?
            .into_iter()
            .filter_map(|(score, position)| {
                let meta = self.metas.get(position)?.clone();
                let vector = self.vector(position)?.to_vec();
                Some(RawHit { position, score, meta, vector })
            })
            .collect())
    }

    pub fn vector(&self, position: Position) -> Option<&[f32]> {
        let start = position.checked_mul(self.dim)?;
        self.vectors.get(start..start + self.dim)
    }

    pub fn meta(&self, position: Position) -> Option<&DocumentMeta> {
        self.metas.get(position)
    }

    pub fn metas(&self) -> &[DocumentMeta] {
        &self.metas
    }

    pub(crate) fn metas_mut(&mut self) -> &mut [DocumentMeta] {
        &mut self.metas
    }

    pub(crate) fn raw_vectors(&self) -> &[f32] {
        &self.vectors
    }

    /// Copy usage records from `previous` onto rows with the same `doc_id`.
    /// Returns how many rows received a record.
    pub(crate) fn carry_usage_from(&mut self, previous: &FlatIndex) -> usize {
        let mut by_doc: HashMap<&str, &Usage> = HashMap::new();
        for meta in &previous.metas {
            by_doc.entry(meta.doc_id.as_str()).or_insert(&meta.usage);
        }
        let mut carried = 0;
        for meta in &mut self.metas {
            if let Some(usage) = by_doc.get(meta.doc_id.as_str()) {
                meta.usage = (*usage).clone();
                carried += 1;
            }
        }
        carried
    }

    pub fn stats(&self) -> IndexStats {
        let mut categories = BTreeMap::new();
        for meta in &self.metas {
            *categories.entry(meta.category.clone()).or_insert(0) += 1;
        }
        IndexStats {
            total_vectors: self.vectors.len() / self.dim.max(1),
            dimension: self.dim,
            metadata_count: self.metas.len(),
            categories,
        }
    }
}
