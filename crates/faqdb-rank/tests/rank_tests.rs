use faqdb_core::config::SearchConfig;
use faqdb_core::math::normalize_in_place;
use faqdb_core::types::{ChunkType, DocumentMeta, PriorityFlags, RawHit, Usage};
use faqdb_rank::{dedup_jaccard, jaccard, mmr_rerank, priority_sort, Ranker};

fn hit(id: &str, score: f32, vector: Vec<f32>) -> RawHit {
    hit_in(id, "A", score, vector)
}

fn hit_in(id: &str, category: &str, score: f32, mut vector: Vec<f32>) -> RawHit {
    normalize_in_place(&mut vector);
    RawHit {
        position: 0,
        score,
        meta: DocumentMeta {
            doc_id: id.to_string(),
            text_excerpt: format!("texto {id}"),
            category: category.to_string(),
            chunk_type: ChunkType::Text,
            chunk_index: 0,
            priority: PriorityFlags::default(),
            usage: Usage::default(),
        },
        vector,
    }
}

fn ids<T>(items: &[T], f: impl Fn(&T) -> &str) -> Vec<String> {
    items.iter().map(|i| f(i).to_string()).collect()
}

fn config(use_mmr: bool) -> SearchConfig {
    SearchConfig { use_mmr, ..SearchConfig::default() }
}

#[test]
fn featured_and_priority_outrank_score() {
    let mut hits = vec![
        hit("plain-high", 0.95, vec![1.0, 0.0]),
        hit("prio-low", 0.40, vec![0.0, 1.0]),
        hit("featured-low", 0.30, vec![1.0, 1.0]),
    ];
    hits[1].meta.priority.priority = 5;
    hits[2].meta.priority.featured = true;

    priority_sort(&mut hits);
    assert_eq!(ids(&hits, |h| h.meta.doc_id.as_str()), vec!["featured-low", "prio-low", "plain-high"]);
}

#[test]
fn usage_breaks_score_ties() {
    let mut hits = vec![hit("rare", 0.5, vec![1.0, 0.0]), hit("popular", 0.5, vec![0.0, 1.0])];
    hits[1].meta.usage.count = 12;
    priority_sort(&mut hits);
    assert_eq!(hits[0].meta.doc_id, "popular");
}

#[test]
fn mmr_lambda_one_keeps_relevance_order() {
    let query = vec![1.0, 0.0, 0.0];
    let hits = vec![
        hit("a", 0.99, vec![1.0, 0.05, 0.0]),
        hit("b", 0.98, vec![1.0, 0.1, 0.0]),
        hit("c", 0.70, vec![0.7, 0.7, 0.0]),
        hit("d", 0.10, vec![0.1, 0.0, 1.0]),
    ];
    let out = mmr_rerank(hits, Some(query.as_slice()), 1.0);
    assert_eq!(ids(&out, |h| h.meta.doc_id.as_str()), vec!["a", "b", "c", "d"]);
}

#[test]
fn mmr_lambda_zero_picks_most_dissimilar_second() {
    let query = vec![1.0, 0.0, 0.0];
    let hits = vec![
        hit("top", 0.99, vec![1.0, 0.0, 0.0]),
        hit("near-dup", 0.98, vec![0.99, 0.01, 0.0]),
        hit("orthogonal", 0.10, vec![0.0, 0.0, 1.0]),
    ];
    let out = mmr_rerank(hits, Some(query.as_slice()), 0.0);
    assert_eq!(out[0].meta.doc_id, "top");
    assert_eq!(out[1].meta.doc_id, "orthogonal");
}

#[test]
fn mmr_drops_hits_without_usable_vector() {
    let query = vec![1.0, 0.0];
    let mut broken = hit("broken", 0.9, vec![1.0, 0.0]);
    broken.vector = vec![f32::NAN, 0.0];
    let mut short = hit("short", 0.8, vec![1.0, 0.0]);
    short.vector = vec![1.0];
    let out = mmr_rerank(vec![hit("ok", 0.95, vec![1.0, 0.0]), broken, short, hit("ok2", 0.5, vec![0.0, 1.0])], Some(query.as_slice()), 0.7);
    assert_eq!(ids(&out, |h| h.meta.doc_id.as_str()), vec!["ok", "ok2"]);
}

#[test]
fn jaccard_collapses_near_duplicates_keeping_higher_score() {
    let mut a = hit("a", 0.60, vec![1.0, 0.0]);
    a.meta.text_excerpt = "El curso empieza el lunes en la sede central".to_string();
    let mut b = hit("b", 0.90, vec![1.0, 0.0]);
    b.meta.text_excerpt = "el curso empieza el LUNES en la sede central".to_string();
    let mut c = hit("c", 0.50, vec![0.0, 1.0]);
    c.meta.text_excerpt = "Los pagos se realizan en efectivo".to_string();
    let mut empty = hit("empty", 0.99, vec![0.0, 1.0]);
    empty.meta.text_excerpt = "   ".to_string();

    assert!((jaccard(&a.meta.text_excerpt, &b.meta.text_excerpt) - 1.0).abs() < 1e-6);
    let out = dedup_jaccard(vec![a, c, b, empty], 0.85);
    assert_eq!(ids(&out, |h| h.meta.doc_id.as_str()), vec!["b", "c"]);
}

fn with_text(id: &str, score: f32, text: &str) -> RawHit {
    let mut h = hit(id, score, vec![1.0, 0.0]);
    h.meta.text_excerpt = text.to_string();
    h
}

#[test]
fn replacement_absorbs_every_duplicate_it_overlaps() {
    let base = "inscripciones abiertas hasta el viernes para cursos de verano en";
    let x = with_text("x", 0.50, &format!("{base} presencial"));
    let z = with_text("z", 0.60, &format!("{base} virtual"));
    let y = with_text("y", 0.90, base);
    assert!(jaccard(&x.meta.text_excerpt, &z.meta.text_excerpt) < 0.85);
    assert!(jaccard(&y.meta.text_excerpt, &x.meta.text_excerpt) >= 0.85);
    assert!(jaccard(&y.meta.text_excerpt, &z.meta.text_excerpt) >= 0.85);

    let out = dedup_jaccard(vec![x.clone(), z.clone(), y], 0.85);
    assert_eq!(ids(&out, |h| h.meta.doc_id.as_str()), vec!["y"]);

    // Beating only one of the overlapped hits is not enough.
    let weaker = with_text("y", 0.55, base);
    let out = dedup_jaccard(vec![x, z, weaker], 0.85);
    assert_eq!(ids(&out, |h| h.meta.doc_id.as_str()), vec!["x", "z"]);
}

#[test]
fn jaccard_edge_values() {
    assert_eq!(jaccard("", "algo"), 0.0);
    assert!((jaccard("a b c d", "a b c e") - 0.6).abs() < 1e-6);
}

#[test]
fn category_filter_returns_best_two_of_b() {
    let query = vec![1.0, 0.0, 0.0];
    let hits = vec![
        hit_in("a1", "A", 0.97, vec![1.0, 0.1, 0.0]),
        hit_in("b1", "B", 0.95, vec![1.0, 0.2, 0.0]),
        hit_in("a2", "A", 0.90, vec![1.0, 0.4, 0.0]),
        hit_in("b2", "B", 0.80, vec![0.8, 0.0, 0.6]),
        hit_in("b3", "B", 0.30, vec![0.3, 0.95, 0.0]),
    ];
    for use_mmr in [true, false] {
        let ranker = Ranker::new(config(use_mmr));
        let results = ranker.rank(hits.clone(), Some("B"), 2, Some(query.as_slice()));
        assert_eq!(ids(&results, |r| r.doc_id.as_str()), vec!["b1", "b2"], "use_mmr={use_mmr}");
        assert!(results.iter().all(|r| r.category == "B"));
    }
}

#[test]
fn rank_truncates_and_handles_empty() {
    let ranker = Ranker::new(config(false));
    assert!(ranker.rank(Vec::new(), None, 3, None).is_empty());
    let hits: Vec<RawHit> = (0..10).map(|i| hit(&format!("d{i}"), 1.0 - i as f32 * 0.05, vec![1.0, i as f32])).collect();
    let results = ranker.rank(hits.clone(), None, 3, None);
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].doc_id, "d0");
    assert!(ranker.rank(hits, None, 0, None).is_empty());
}
