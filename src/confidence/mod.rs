
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ranking::Candidate;

const CONFIDENCE_PHRASES: [&str; 3] = ["specifically", "according to", "based on"];
const NON_ANSWER_MARKERS: [&str; 2] = ["i don't", "unclear"];

/// How many supporting candidates count as full document coverage.
///
/// Both profiles share the same weighted formula; they differ only in how
/// many candidates saturate the document sub-score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceProfile {
    Basic,
    #[default]
    Enhanced,
}

impl ConfidenceProfile {
    #[inline]
    pub fn reference_count(self) -> usize {
        match self {
            ConfidenceProfile::Basic => 5,
            ConfidenceProfile::Enhanced => 8,
        }
    }
}

/// Estimate answer confidence in [0, 1] from the ranked candidates, the
/// query, and the (possibly empty) generated answer text.
///
/// Weighted sum of three sub-scores: 0.4 for candidate coverage against the
/// profile's reference count, 0.4 for query-term hits across candidates, and
/// 0.2 for surface features of the answer text. An empty candidate list
/// returns exactly 0.0 without evaluating the formula.
#[inline]
pub fn estimate(
    profile: ConfidenceProfile,
    candidates: &[Candidate],
    query: &str,
    answer: &str,
) -> f32 {
    if candidates.is_empty() {
        return 0.0;
    }

    let doc_confidence =
        (candidates.len() as f32 / profile.reference_count() as f32).min(1.0);
    let term_confidence = term_confidence(candidates, query);
    let answer_confidence = answer_confidence(answer);

    let combined = 0.4 * doc_confidence + 0.4 * term_confidence + 0.2 * answer_confidence;
    let clamped = combined.clamp(0.0, 1.0);

    debug!(
        "Confidence {:.3} (doc {:.3}, term {:.3}, answer {:.3})",
        clamped, doc_confidence, term_confidence, answer_confidence
    );
    clamped
}

/// Fraction of (query term, candidate) pairs where the term occurs in the
/// candidate text. Zero when the query has no terms.
fn term_confidence(candidates: &[Candidate], query: &str) -> f32 {
    let query_lower = query.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    if terms.is_empty() || candidates.is_empty() {
        return 0.0;
    }

    let mut matches = 0usize;
    for candidate in candidates {
        let content = candidate.hit.metadata.content.to_lowercase();
        matches += terms.iter().filter(|term| content.contains(*term)).count();
    }

    matches as f32 / (terms.len() * candidates.len()) as f32
}

/// Surface-feature score for the answer text, 0.5 baseline.
fn answer_confidence(answer: &str) -> f32 {
    let mut score = 0.5f32;
    let answer_lower = answer.to_lowercase();

    if answer.chars().count() > 100 {
        score += 0.2;
    }
    if CONFIDENCE_PHRASES.iter().any(|p| answer_lower.contains(p)) {
        score += 0.1;
    }
    if NON_ANSWER_MARKERS.iter().any(|m| answer_lower.contains(m)) {
        score -= 0.3;
    }

    score
}
