//! Maximal Marginal Relevance over stored vectors.
//!
//! `mmr = λ · relevance + (1 − λ) · (1 − max cos(candidate, selected))`
//!
//! λ = 1 keeps relevance order, λ = 0 picks for diversity only. The first
//! pick is always the top candidate of the incoming order.

use tracing::{debug, warn};

use faqdb_core::math::{cosine_similarity, l2_norm};
use faqdb_core::types::RawHit;

fn usable(vector: &[f32], query: Option<&[f32]>) -> bool {
    !vector.is_empty()
        && vector.iter().all(|x| x.is_finite())
        && l2_norm(vector) > f32::EPSILON
        && query.map_or(true, |q| q.len() == vector.len())
}

/// Reorder `hits` for diversity. Relevance is the cosine between `query` and
/// the stored vector, or the search score when no query vector is given.
/// Hits without a usable stored vector are dropped.
pub fn mmr_rerank(hits: Vec<RawHit>, query: Option<&[f32]>, lambda: f32) -> Vec<RawHit> {
    let lambda = lambda.clamp(0.0, 1.0);
    let query = query.filter(|q| usable(q, None));

    let mut remaining: Vec<(RawHit, f32)> = Vec::with_capacity(hits.len());
    for hit in hits {
        if !usable(&hit.vector, query) {
            warn!(doc_id = %hit.meta.doc_id, position = hit.position, "dropping hit without usable vector");
            continue;
        }
        let relevance = match query {
            Some(q) => cosine_similarity(q, &hit.vector),
            None => hit.score.clamp(0.0, 1.0),
        };
        remaining.push((hit, relevance));
    }
    if remaining.len() <= 1 {
        return remaining.into_iter().map(|(h, _)| h).collect();
    }

    let total = remaining.len();
    let mut selected: Vec<RawHit> = Vec::with_capacity(total);
    selected.push(remaining.remove(0).0);

    while !remaining.is_empty() {
        let mut best_idx = 0;
        let mut best_score = f32::NEG_INFINITY;
        for (idx, (candidate, relevance)) in remaining.iter().enumerate() {
            let max_sim = selected
                .iter()
                .map(|s| cosine_similarity(&candidate.vector, &s.vector))
                .fold(0.0f32, f32::max);
            let score = lambda * relevance + (1.0 - lambda) * (1.0 - max_sim);
            if score > best_score {
                best_score = score;
                best_idx = idx;
            }
        }
        selected.push(remaining.remove(best_idx).0);
    }
    debug!(candidates = total, "mmr reordered");
    selected
}
