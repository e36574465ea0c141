use faqdb_core::math::{cosine_similarity, l2_norm};
use faqdb_core::traits::Embedder;
use faqdb_core::Error;
use faqdb_embed::{get_default_embedder, HashEmbedder, DEFAULT_DIM};

#[test]
fn fake_embedder_shapes_and_determinism() {
    // Force the hashed embedder to avoid loading the large model
    std::env::set_var("APP_USE_FAKE_EMBEDDINGS", "1");

    let embedder = get_default_embedder().expect("embedder");
    assert_eq!(embedder.dim(), DEFAULT_DIM);

    let texts = vec!["hola mundo".to_string(), "hola mundo".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), DEFAULT_DIM);
    let norm = l2_norm(v1);
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");
    for (a, b) in v1.iter().zip(v2.iter()) {
        assert!((a - b).abs() <= 1e-6);
    }
}

#[test]
fn hashed_embedder_rejects_empty_text() {
    let embedder = HashEmbedder::new(64);
    assert!(matches!(embedder.embed(""), Err(Error::InvalidInput(_))));
    assert!(matches!(embedder.embed("   \t"), Err(Error::InvalidInput(_))));
    assert!(matches!(embedder.embed("¿?!"), Err(Error::InvalidInput(_))));
}

#[test]
fn hashed_embedder_ignores_case_and_punctuation() {
    let embedder = HashEmbedder::new(256);
    let a = embedder.embed("¿Cuándo empiezan las clases?").expect("embed");
    let b = embedder.embed("cuándo empiezan las clases").expect("embed");
    let c = embedder.embed("precio del estacionamiento nocturno").expect("embed");
    assert!(cosine_similarity(&a, &b) > 0.999);
    assert!(cosine_similarity(&a, &c) < 0.5);
}
