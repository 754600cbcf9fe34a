use super::*;

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn vectors_have_configured_dimension() {
    let embedder = OfflineEmbedder::new(32);
    let vector = embedder
        .embed_one("hello world")
        .expect("embedding should succeed");
    assert_eq!(vector.len(), 32);
    assert_eq!(embedder.dimension(), 32);
}

#[test]
fn identical_texts_embed_identically() {
    let embedder = OfflineEmbedder::default();
    let a = embedder.embed_one("the quick brown fox").expect("embed");
    let b = embedder.embed_one("the quick brown fox").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn vectors_are_unit_length() {
    let embedder = OfflineEmbedder::default();
    let vector = embedder
        .embed_one("normalize me please")
        .expect("embedding should succeed");
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}

#[test]
fn shared_vocabulary_scores_higher_than_disjoint() {
    let embedder = OfflineEmbedder::default();
    let query = embedder.embed_one("capital of France").expect("embed");
    let related = embedder
        .embed_one("Paris is the capital of France")
        .expect("embed");
    let unrelated = embedder
        .embed_one("photosynthesis converts sunlight")
        .expect("embed");

    assert!(cosine(&query, &related) > cosine(&query, &unrelated));
}

#[test]
fn tokenization_is_case_insensitive() {
    let embedder = OfflineEmbedder::default();
    let a = embedder.embed_one("Rust Programming").expect("embed");
    let b = embedder.embed_one("rust programming").expect("embed");
    assert_eq!(a, b);
}

#[test]
fn empty_text_embeds_to_zero_vector() {
    let embedder = OfflineEmbedder::new(8);
    let vector = embedder.embed_one("   ").expect("embed");
    assert!(vector.iter().all(|v| *v == 0.0));
}

#[test]
fn batch_preserves_input_order() {
    let embedder = OfflineEmbedder::default();
    let texts = vec!["first text".to_string(), "second text".to_string()];
    let vectors = embedder.embed(&texts).expect("embed");

    assert_eq!(vectors.len(), 2);
    assert_eq!(vectors[0], embedder.embed_one("first text").expect("embed"));
    assert_eq!(
        vectors[1],
        embedder.embed_one("second text").expect("embed")
    );
}
