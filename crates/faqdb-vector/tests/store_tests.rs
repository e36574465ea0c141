use std::fs;
use std::sync::Arc;

use tempfile::TempDir;

use faqdb_core::chunker::TextChunker;
use faqdb_core::traits::Embedder;
use faqdb_core::types::{ChunkType, DocumentMeta, PriorityFlags, SourceItem, Usage};
use faqdb_core::source::VecSource;
use faqdb_core::Error;
use faqdb_embed::HashEmbedder;
use faqdb_vector::{IndexPaths, VectorStore};

fn meta(id: &str, category: &str) -> DocumentMeta {
    DocumentMeta {
        doc_id: id.to_string(),
        text_excerpt: format!("text of {id}"),
        category: category.to_string(),
        chunk_type: ChunkType::Text,
        chunk_index: 0,
        priority: PriorityFlags::default(),
        usage: Usage::default(),
    }
}

fn axis(dim: usize, i: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[i] = 1.0;
    v
}

fn populated(dim: usize) -> VectorStore {
    let store = VectorStore::new(dim);
    for i in 0..dim {
        let mut v = axis(dim, i);
        v[0] += 0.1 * i as f32;
        store.add(v, meta(&format!("doc-{i}"), if i % 2 == 0 { "A" } else { "B" })).expect("add");
    }
    store
}

#[test]
fn search_orders_by_score_and_caps_k() {
    let store = populated(4);
    let hits = store.search(&axis(4, 2), 2).expect("search");
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].1, 2);
    assert!(hits[0].0 >= hits[1].0);

    let all = store.search(&axis(4, 0), 100).expect("search");
    assert_eq!(all.len(), 4);
    assert!(all.windows(2).all(|w| w[0].0 >= w[1].0));
    assert!(matches!(store.search(&[1.0, 0.0], 1), Err(Error::DimensionMismatch { expected: 4, actual: 2 })));
}

#[test]
fn save_load_round_trip_preserves_results() {
    let tmp = TempDir::new().expect("tmp");
    let paths = IndexPaths::in_dir(&tmp.path().join("idx"));
    let store = populated(6);
    store.update_usage("doc-3", |u| u.count = 7);
    store.save(&paths).expect("save");
    assert!(paths.exist());

    let restored = VectorStore::new(6);
    assert_eq!(restored.load(&paths, 6).expect("load"), 6);
    for probe in 0..6 {
        let q = axis(6, probe);
        assert_eq!(store.search(&q, 6).expect("search"), restored.search(&q, 6).expect("search"));
    }
    let stats = restored.stats();
    assert_eq!(stats.total_vectors, 6);
    assert_eq!(stats.metadata_count, 6);
    assert_eq!(stats.categories.get("A"), Some(&3));
    assert_eq!(restored.get(3).expect("meta").usage.count, 7);
}

#[test]
fn load_failures_are_index_unavailable() {
    let tmp = TempDir::new().expect("tmp");
    let paths = IndexPaths::in_dir(tmp.path());
    let store = VectorStore::new(4);

    assert!(matches!(store.load(&paths, 4), Err(Error::IndexUnavailable(_))));

    populated(4).save(&paths).expect("save");
    assert!(matches!(store.load(&paths, 8), Err(Error::IndexUnavailable(_))));

    let mut blob = fs::read(&paths.vectors).expect("read");
    let last = blob.len() - 1;
    blob[last] ^= 0xFF;
    fs::write(&paths.vectors, &blob).expect("write");
    assert!(matches!(store.load(&paths, 4), Err(Error::IndexUnavailable(_))));

    fs::write(&paths.metadata, "{}").expect("write");
    assert!(matches!(store.load(&paths, 4), Err(Error::IndexUnavailable(_))));
    assert!(store.is_empty(), "failed loads leave the current index in place");
}

#[test]
fn snapshots_are_unaffected_by_later_writes() {
    let store = populated(4);
    let before = store.snapshot();
    store.add(axis(4, 1), meta("late", "A")).expect("add");
    store.update_usage("doc-0", |u| u.count += 1);

    assert_eq!(before.len(), 4);
    assert_eq!(before.meta(0).expect("meta").usage.count, 0);
    assert_eq!(store.len(), 5);
    assert_eq!(store.get(0).expect("meta").usage.count, 1);
    assert_eq!(store.update_usage("missing", |u| u.count += 1), 0);
}

#[test]
fn concurrent_searches_and_appends() {
    let store = Arc::new(populated(8));
    std::thread::scope(|s| {
        for t in 0..4 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                for _ in 0..50 {
                    let hits = store.search(&axis(8, t), 3).expect("search");
                    assert_eq!(hits.len(), 3);
                }
            });
        }
        let writer = Arc::clone(&store);
        s.spawn(move || {
            for i in 0..20 {
                writer.add(axis(8, i % 8), meta(&format!("w-{i}"), "A")).expect("add");
            }
        });
    });
    assert_eq!(store.len(), 28);
}

#[test]
fn rebuild_indexes_every_chunk_and_swaps() {
    let embedder = HashEmbedder::new(64);
    let store = VectorStore::new(64);
    store.add(axis(64, 0), meta("stale", "A")).expect("add");

    let source = VecSource::new(vec![
        SourceItem::text("post-1", "blog", "La feria de ciencias será en mayo."),
        SourceItem::faq("faq-1", "pagos", "¿Puedo pagar en cuotas?", "Sí, hasta en tres cuotas.").with_priority(true, 5),
    ]);
    let report = store.rebuild(&source, &embedder, &TextChunker::default()).expect("rebuild");
    assert_eq!(report.items, 2);
    assert_eq!(report.indexed, report.chunks);
    assert_eq!(report.skipped, 0);
    assert_eq!(store.len(), report.indexed);

    let snapshot = store.snapshot();
    assert!(snapshot.metas().iter().all(|m| m.doc_id != "stale"));
    assert!(snapshot.metas().iter().filter(|m| m.doc_id == "faq-1").all(|m| m.priority.featured));

    let q = embedder.embed("pagar en cuotas").expect("embed");
    let top = store.search_hits(&q, 1).expect("search");
    assert_eq!(top[0].meta.doc_id, "faq-1");
    assert_eq!(top[0].vector.len(), 64);
}

#[test]
fn rebuild_keeps_usage_of_surviving_documents() {
    let embedder = HashEmbedder::new(64);
    let store = VectorStore::new(64);
    let first = VecSource::new(vec![
        SourceItem::text("post-1", "blog", "La feria de ciencias será en mayo."),
        SourceItem::text("post-2", "blog", "Nuevo taller de robótica."),
    ]);
    store.rebuild(&first, &embedder, &TextChunker::default()).expect("rebuild");
    assert_eq!(store.update_usage("post-1", |u| u.count += 3), 1);
    store.update_usage("post-2", |u| u.success_rate = 0.5);

    let second = VecSource::new(vec![
        SourceItem::text("post-1", "blog", "La feria de ciencias será en junio."),
        SourceItem::text("post-3", "blog", "Cierre de inscripciones."),
    ]);
    store.rebuild(&second, &embedder, &TextChunker::default()).expect("rebuild");
    let snapshot = store.snapshot();
    let usage = |id: &str| snapshot.metas().iter().find(|m| m.doc_id == id).map(|m| m.usage.clone());
    assert_eq!(usage("post-1").map(|u| u.count), Some(3));
    assert_eq!(usage("post-2"), None);
    assert_eq!(usage("post-3"), Some(Usage::default()));
}

#[test]
fn clear_keeps_dimension() {
    let store = populated(4);
    store.clear();
    assert!(store.is_empty());
    assert_eq!(store.dim(), 4);
}
