#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Post-processing of raw nearest-neighbour hits: category filter, business
//! priority ordering, near-duplicate removal and truncation.

pub mod dedup;
pub mod mmr;

use std::cmp::Ordering;

use tracing::debug;

use faqdb_core::config::SearchConfig;
use faqdb_core::types::{RawHit, SearchResult};

pub use dedup::{dedup_jaccard, jaccard};
pub use mmr::mmr_rerank;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DedupMode {
    /// Word-set overlap at or above `threshold` marks a duplicate.
    Jaccard { threshold: f32 },
    Mmr { lambda: f32 },
}

/// How many raw hits to request from the index for a final list of `limit`.
pub fn fetch_k(limit: usize, has_filter: bool, overfetch_factor: usize) -> usize {
    if has_filter {
        limit.saturating_mul(overfetch_factor.max(1))
    } else {
        limit
    }
}

fn priority_cmp(a: &RawHit, b: &RawHit) -> Ordering {
    let pa = &a.meta.priority;
    let pb = &b.meta.priority;
    pb.featured
        .cmp(&pa.featured)
        .then_with(|| pb.priority.cmp(&pa.priority))
        .then_with(|| b.score.total_cmp(&a.score))
        .then_with(|| b.meta.usage.count.cmp(&a.meta.usage.count))
}

/// Stable sort: featured first, then priority, score and usage count, all descending.
pub fn priority_sort(hits: &mut [RawHit]) {
    hits.sort_by(priority_cmp);
}

#[derive(Debug, Clone)]
pub struct Ranker {
    config: SearchConfig,
}

impl Ranker {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn fetch_k(&self, limit: usize, category: Option<&str>) -> usize {
        fetch_k(limit, category.is_some(), self.config.overfetch_factor)
    }

    pub fn dedup_mode(&self) -> DedupMode {
        if self.config.use_mmr {
            DedupMode::Mmr { lambda: self.config.mmr_lambda }
        } else {
            DedupMode::Jaccard { threshold: self.config.similarity_threshold }
        }
    }

    /// Filter, order, deduplicate and cut `hits` (best-first from the index)
    /// down to at most `limit` results.
    pub fn rank(&self, hits: Vec<RawHit>, category: Option<&str>, limit: usize, query: Option<&[f32]>) -> Vec<SearchResult> {
        if limit == 0 {
            return Vec::new();
        }
        let raw = hits.len();
        let mut pool: Vec<RawHit> = hits
            .into_iter()
            .filter(|h| category.map_or(true, |c| h.meta.category == c))
            .take(limit.saturating_mul(2))
            .collect();
        let filtered = pool.len();

        priority_sort(&mut pool);

        let deduped = if pool.len() <= 1 {
            pool
        } else {
            match self.dedup_mode() {
                DedupMode::Jaccard { threshold } => dedup_jaccard(pool, threshold),
                DedupMode::Mmr { lambda } => mmr_rerank(pool, query, lambda),
            }
        };

        let results: Vec<SearchResult> = deduped.into_iter().take(limit).map(SearchResult::from).collect();
        debug!(raw, filtered, returned = results.len(), category = ?category, "ranked");
        results
    }
}
