use std::collections::HashSet;

use tracing::debug;

use faqdb_core::types::RawHit;

fn word_set(text: &str) -> HashSet<String> {
    text.trim().to_lowercase().split_whitespace().map(str::to_string).collect()
}

/// Jaccard overlap of the lowercase word sets of `a` and `b`; 0 when either is empty.
pub fn jaccard(a: &str, b: &str) -> f32 {
    let wa = word_set(a);
    let wb = word_set(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let inter = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    inter as f32 / union as f32
}

/// Greedy near-duplicate removal in input order.
///
/// A hit whose text overlaps a kept hit by at least `threshold` is dropped,
/// unless it scores higher than every kept hit it overlaps. It then takes the
/// place of the first of them and the others are removed, so no two kept hits
/// ever overlap by `threshold` or more. Hits with empty text are dropped.
pub fn dedup_jaccard(hits: Vec<RawHit>, threshold: f32) -> Vec<RawHit> {
    let before = hits.len();
    let mut kept: Vec<RawHit> = Vec::with_capacity(hits.len());
    for hit in hits {
        if hit.meta.text_excerpt.trim().is_empty() {
            continue;
        }
        let duplicates: Vec<usize> = kept
            .iter()
            .enumerate()
            .filter(|(_, k)| jaccard(&hit.meta.text_excerpt, &k.meta.text_excerpt) >= threshold)
            .map(|(i, _)| i)
            .collect();
        let Some(&first) = duplicates.first() else {
            kept.push(hit);
            continue;
        };
        if duplicates.iter().any(|&i| kept[i].score >= hit.score) {
            continue;
        }
        kept[first] = hit;
        for &i in duplicates[1..].iter().rev() {
            kept.remove(i);
        }
    }
    debug!(before, after = kept.len(), "jaccard dedup");
    kept
}
