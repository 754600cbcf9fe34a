use super::*;
use crate::index::ChunkMetadata;

fn hit(content: &str) -> SearchHit {
    hit_with(content, "doc-1.txt", None)
}

fn hit_with(content: &str, source: &str, title: Option<&str>) -> SearchHit {
    SearchHit {
        metadata: ChunkMetadata {
            chunk_id: uuid::Uuid::new_v4().to_string(),
            document_id: "doc-1".to_string(),
            source: source.to_string(),
            title: title.map(str::to_string),
            page: None,
            chunk_index: 0,
            content: content.to_string(),
        },
        distance: 0.1,
        similarity: 0.9,
    }
}

#[test]
fn term_occurrences_score_two_each() {
    let candidate = hit("the cat sat on the mat with another cat nearby plus filler text to get past the short-content penalty threshold");
    // "cat" occurs twice: 2 * 2 = 4, plus +2 for length in [100, 2000)
    assert_eq!(relevance_score(&candidate, "cat"), 6);
}

#[test]
fn exact_phrase_earns_flat_bonus() {
    let base = "x".repeat(100);
    let with_phrase = hit(&format!("{} the capital of france appears here", base));
    let without_phrase = hit(&format!("{} capital appears of appears france appears", base));

    let with_score = relevance_score(&with_phrase, "capital of france");
    let without_score = relevance_score(&without_phrase, "capital of france");
    assert_eq!(with_score - without_score, 10);
}

#[test]
fn matching_is_case_insensitive() {
    let candidate = hit_with("The Capital Of France is Paris, a city described at length in this sentence to cross one hundred characters.", "doc.txt", None);
    let lower = relevance_score(&candidate, "capital of france");
    let upper = relevance_score(&candidate, "CAPITAL OF FRANCE");
    assert_eq!(lower, upper);
    assert!(lower > 0);
}

#[test]
fn title_terms_score_five_each() {
    let body = "neutral filler words repeated enough times to pass the length adjustment threshold for scoring purposes here";
    let titled = hit_with(body, "doc.txt", Some("France Travel Guide"));
    let untitled = hit_with(body, "doc.txt", None);

    let diff = relevance_score(&titled, "france guide") - relevance_score(&untitled, "france guide");
    assert_eq!(diff, 10);
}

#[test]
fn length_adjustments() {
    let short = hit("tiny");
    let medium = hit(&"m".repeat(150));
    let long = hit(&"l".repeat(3000));

    assert_eq!(relevance_score(&short, "zzz"), -3);
    assert_eq!(relevance_score(&medium, "zzz"), 2);
    assert_eq!(relevance_score(&long, "zzz"), 0);
}

#[test]
fn ordering_is_descending_with_stable_ties() {
    let hits = vec![
        hit(&format!("{} nothing relevant", "a".repeat(100))),
        hit(&format!("{} rust rust rust", "b".repeat(100))),
        hit(&format!("{} also nothing here", "c".repeat(100))),
    ];
    let first_id = hits[0].metadata.chunk_id.clone();
    let third_id = hits[2].metadata.chunk_id.clone();

    let ranked = apply(hits, &[], "rust");

    assert_eq!(ranked.len(), 3);
    assert!(ranked[0].hit.metadata.content.contains("rust"));
    // The two zero-score candidates keep their retrieval order
    assert_eq!(ranked[1].hit.metadata.chunk_id, first_id);
    assert_eq!(ranked[2].hit.metadata.chunk_id, third_id);
}

#[test]
fn reranking_is_idempotent() {
    let hits = vec![
        hit("alpha beta gamma delta filler to reach a reasonable length for the scoring window of this test case body"),
        hit("beta beta beta filler to reach a reasonable length for the scoring window of this test case body text"),
        hit("unrelated filler to reach a reasonable length for the scoring window of this test case body text here"),
    ];

    let once = apply(hits, &[], "beta");
    let ids_once: Vec<String> = once.iter().map(|c| c.hit.metadata.chunk_id.clone()).collect();

    let again = apply(once.into_iter().map(|c| c.hit).collect(), &[], "beta");
    let ids_again: Vec<String> = again.iter().map(|c| c.hit.metadata.chunk_id.clone()).collect();

    assert_eq!(ids_once, ids_again);
}

#[test]
fn file_type_filter_matches_extension() {
    let hits = vec![
        hit_with("markdown body", "notes.md", None),
        hit_with("plain body", "notes.txt", None),
    ];

    let kept = apply(hits, &[StructuralFilter::FileType(vec!["md".to_string()])], "body");
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].hit.metadata.source, "notes.md");
}

#[test]
fn file_type_filter_accepts_dotted_and_uppercase_forms() {
    let hits = vec![hit_with("body", "NOTES.MD", None)];
    let kept = apply(hits, &[StructuralFilter::FileType(vec![".md".to_string()])], "body");
    assert_eq!(kept.len(), 1);
}

#[test]
fn min_length_filter_drops_short_chunks() {
    let hits = vec![hit("short"), hit(&"long enough ".repeat(10))];
    let kept = apply(hits, &[StructuralFilter::MinLength(50)], "query");
    assert_eq!(kept.len(), 1);
}

#[test]
fn keyword_filter_is_or_within_and_case_insensitive() {
    let hits = vec![
        hit("talks about RUST internals"),
        hit("talks about python internals"),
        hit("talks about nothing"),
    ];

    let kept = apply(
        hits,
        &[StructuralFilter::Keywords(vec!["rust".to_string(), "python".to_string()])],
        "internals",
    );
    assert_eq!(kept.len(), 2);
}

#[test]
fn multiple_filters_are_and_combined() {
    let hits = vec![
        hit_with(&"rust ".repeat(20), "a.md", None),
        hit_with("rust", "b.md", None),
        hit_with(&"python ".repeat(20), "c.md", None),
    ];

    let kept = apply(
        hits,
        &[
            StructuralFilter::MinLength(50),
            StructuralFilter::Keywords(vec!["rust".to_string()]),
        ],
        "rust",
    );
    assert_eq!(kept.len(), 1);
    assert_eq!(kept[0].hit.metadata.source, "a.md");
}

#[test]
fn apply_never_grows_the_candidate_set() {
    let hits = vec![hit("one"), hit("two")];
    let ranked = apply(hits, &[], "query");
    assert!(ranked.len() <= 2);
}
