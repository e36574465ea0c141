use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::RwLock;
use tracing::{info, warn};

use faqdb_core::chunker::TextChunker;
use faqdb_core::traits::{ContentSource, Embedder};
use faqdb_core::types::{DocumentMeta, Position, RawHit, Usage};
use faqdb_core::Result;

use crate::index::{FlatIndex, IndexStats};
use crate::persist::{self, IndexPaths};

/// Process-wide handle to the current index snapshot.
///
/// Searches clone the `Arc` under a short read lock and run without holding it.
/// `add` and usage updates copy-on-write under the write lock; usage updates
/// leave the shared vector buffer alone. `rebuild` and `load` build a new
/// index off-lock and swap it in.
pub struct VectorStore {
    current: RwLock<Arc<FlatIndex>>,
    show_progress: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebuildReport {
    pub items: usize,
    pub chunks: usize,
    pub indexed: usize,
    pub skipped: usize,
}

impl VectorStore {
    pub fn new(dim: usize) -> Self {
        Self { current: RwLock::new(Arc::new(FlatIndex::new(dim))), show_progress: false }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn snapshot(&self) -> Arc<FlatIndex> {
        Arc::clone(&*self.current.read())
    }

    pub fn dim(&self) -> usize {
        self.current.read().dim()
    }

    pub fn len(&self) -> usize {
        self.current.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.read().is_empty()
    }

    pub fn add(&self, vector: Vec<f32>, meta: DocumentMeta) -> Result<Position> {
        let mut guard = self.current.write();
        Arc::make_mut(&mut *guard).add(vector, meta)
    }

    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(f32, Position)>> {
        self.snapshot().search(query, k)
    }

    pub fn search_hits(&self, query: &[f32], k: usize) -> Result<Vec<RawHit>> {
        self.snapshot().hits(query, k)
    }

    pub fn get(&self, position: Position) -> Option<DocumentMeta> {
        self.current.read().meta(position).cloned()
    }

    pub fn stats(&self) -> IndexStats {
        self.current.read().stats()
    }

    /// Apply `update` to the usage record of every chunk of `doc_id`.
    /// Returns how many entries were touched.
    pub fn update_usage<F>(&self, doc_id: &str, mut update: F) -> usize
    where
        F: FnMut(&mut Usage),
    {
        let mut guard = self.current.write();
        if !guard.metas().iter().any(|m| m.doc_id == doc_id) {
            return 0;
        }
        let index = Arc::make_mut(&mut *guard);
        let mut touched = 0;
        for meta in index.metas_mut().iter_mut().filter(|m| m.doc_id == doc_id) {
            update(&mut meta.usage);
            touched += 1;
        }
        touched
    }

    /// Replace the contents with an empty index of the same dimension.
    pub fn clear(&self) {
        let dim = self.dim();
        *self.current.write() = Arc::new(FlatIndex::new(dim));
        info!("index cleared");
    }

    /// Re-chunk and re-embed everything in `source`, then swap the result in.
    /// Items that fail to embed or index are logged and skipped. Usage records
    /// of documents still present are copied over at swap time, including any
    /// recorded while the rebuild ran.
    pub fn rebuild(&self, source: &dyn ContentSource, embedder: &dyn Embedder, chunker: &TextChunker) -> Result<RebuildReport> {
        let started = Instant::now();
        let mut fresh = FlatIndex::new(embedder.dim());
        let mut report = RebuildReport::default();

        let pb = if self.show_progress { ProgressBar::new_spinner() } else { ProgressBar::hidden() };
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {pos} chunks {msg}") {
            pb.set_style(style);
        }
        if self.show_progress {
            pb.enable_steady_tick(Duration::from_millis(120));
        }

        for item in source.items()? {
            report.items += 1;
            for chunk in chunker.chunk_item(&item) {
                report.chunks += 1;
                let added = embedder
                    .embed(&chunk.text)
                    .and_then(|vector| fresh.add(vector, DocumentMeta::from_chunk(&chunk, item.priority)));
                match added {
                    Ok(_) => report.indexed += 1,
                    Err(e) => {
                        report.skipped += 1;
                        warn!(doc_id = %chunk.source_ref, chunk = chunk.chunk_index, error = %e, "skipping chunk");
                    }
                }
                pb.inc(1);
            }
            pb.set_message(item.doc_id.clone());
        }
        pb.finish_and_clear();

        let mut guard = self.current.write();
        let carried = fresh.carry_usage_from(&guard);
        *guard = Arc::new(fresh);
        drop(guard);
        info!(
            items = report.items,
            indexed = report.indexed,
            carried,
            skipped = report.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "index rebuilt"
        );
        Ok(report)
    }

    pub fn save(&self, paths: &IndexPaths) -> Result<()> {
        let snapshot = self.snapshot();
        persist::save(&snapshot, paths)
    }

    /// Load persisted artifacts and swap them in. On error the current index is kept.
    pub fn load(&self, paths: &IndexPaths, expected_dim: usize) -> Result<usize> {
        let loaded = persist::load(paths, expected_dim)?;
        let count = loaded.len();
        *self.current.write() = Arc::new(loaded);
        info!(count, dim = expected_dim, "index loaded");
        Ok(count)
    }
}
