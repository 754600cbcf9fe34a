#[cfg(test)]
mod tests;

use std::cmp::Reverse;
use tracing::debug;

use crate::index::SearchHit;

/// A retrieved chunk with its transient relevance score. Produced per query,
/// never persisted.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub hit: SearchHit,
    pub score: i64,
}

/// Structural constraints applied before scoring. Multiple filters are
/// AND-combined; the keyword list is OR within itself.
#[derive(Debug, Clone)]
pub enum StructuralFilter {
    /// File-extension allow-list, matched against the chunk's source filename
    FileType(Vec<String>),
    /// Minimum content length in characters
    MinLength(usize),
    /// Case-insensitive substring match, any keyword suffices
    Keywords(Vec<String>),
}

impl StructuralFilter {
    fn matches(&self, hit: &SearchHit) -> bool {
        match self {
            StructuralFilter::FileType(extensions) => {
                let source = hit.metadata.source.to_lowercase();
                extensions.iter().any(|ext| {
                    let ext = ext.trim_start_matches('.').to_lowercase();
                    source.ends_with(&format!(".{}", ext))
                })
            }
            StructuralFilter::MinLength(min) => hit.metadata.content.chars().count() >= *min,
            StructuralFilter::Keywords(keywords) => {
                let content = hit.metadata.content.to_lowercase();
                keywords
                    .iter()
                    .any(|keyword| content.contains(&keyword.to_lowercase()))
            }
        }
    }
}

/// Filter candidates structurally, score them against the query, and return
/// them in descending score order. Ties keep the original retrieval order
/// (stable sort), and the output is never larger than the input.
#[inline]
pub fn apply(hits: Vec<SearchHit>, filters: &[StructuralFilter], query: &str) -> Vec<Candidate> {
    let mut candidates: Vec<Candidate> = hits
        .into_iter()
        .filter(|hit| filters.iter().all(|f| f.matches(hit)))
        .map(|hit| {
            let score = relevance_score(&hit, query);
            Candidate { hit, score }
        })
        .collect();

    candidates.sort_by_key(|c| Reverse(c.score));

    debug!(
        "Ranked {} candidates for query of {} terms",
        candidates.len(),
        query.split_whitespace().count()
    );
    candidates
}

/// Deterministic lexical score for a (candidate, query) pair.
#[inline]
pub fn relevance_score(hit: &SearchHit, query: &str) -> i64 {
    let query_lower = query.to_lowercase();
    let terms: Vec<&str> = query_lower.split_whitespace().collect();
    let content = hit.metadata.content.to_lowercase();
    let title = hit.metadata.title.as_deref().map(str::to_lowercase);

    let mut score: i64 = 0;

    for term in &terms {
        score += 2 * content.matches(term).count() as i64;

        if let Some(title) = &title {
            if title.contains(term) {
                score += 5;
            }
        }
    }

    if !query_lower.trim().is_empty() && content.contains(query_lower.trim()) {
        score += 10;
    }

    let length = hit.metadata.content.chars().count();
    if (100..2000).contains(&length) {
        score += 2;
    } else if length < 50 {
        score -= 3;
    }

    score
}
