// Chunking: recursive character splitting of page text into overlapping,
// stably-identified chunks.


use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::loader::DocumentPage;
use crate::{RagError, Result};

/// Separator ladder, coarsest first. The empty string means raw character
/// boundaries and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Configuration for document chunking. Sizes are in characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// A bounded contiguous slice of a document's text, the atomic unit of
/// indexing and retrieval. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Globally unique id, stable for the lifetime of the owning document
    pub id: String,
    pub document_id: String,
    /// 0-based ordinal within the document, contiguous across pages
    pub chunk_index: usize,
    pub content: String,
    /// 1-based source page number
    pub page_number: Option<u32>,
    /// Character offset of this chunk within the owning page's text
    pub start_offset: usize,
}

/// Split a document's pages into overlapping chunks.
///
/// Each page is split independently with the separator ladder: the coarsest
/// separator that still yields pieces within `chunk_size` wins, finer ones
/// apply recursively to oversized pieces. Adjacent chunks share
/// `chunk_overlap` trailing characters. Chunk ordinals increase
/// monotonically across the whole document starting at 0.
#[inline]
pub fn chunk_pages(
    document_id: &str,
    pages: &[DocumentPage],
    config: &ChunkingConfig,
) -> Result<Vec<Chunk>> {
    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(RagError::EmptyDocument);
    }

    let mut chunks = Vec::new();
    let mut chunk_index = 0;

    for page in pages {
        if page.text.trim().is_empty() {
            continue;
        }

        let pieces = split_text(&page.text, &SEPARATORS, config);
        let mut search_from = 0;

        for content in pieces {
            if content.trim().is_empty() {
                continue;
            }

            // Chunks are verbatim substrings of the page text, so the start
            // offset is recoverable by a forward search.
            let byte_offset = page.text[search_from..]
                .find(&content)
                .map(|pos| search_from + pos)
                .unwrap_or(search_from);
            let start_offset = page.text[..byte_offset].chars().count();
            search_from = byte_offset + content.chars().next().map_or(1, char::len_utf8);

            chunks.push(Chunk {
                id: Uuid::new_v4().to_string(),
                document_id: document_id.to_string(),
                chunk_index,
                content,
                page_number: Some(page.page_number),
                start_offset,
            });
            chunk_index += 1;
        }
    }

    debug!(
        "Chunked document {} into {} chunks across {} pages",
        document_id,
        chunks.len(),
        pages.len()
    );

    Ok(chunks)
}

/// Recursively split `text` with the given separator ladder.
fn split_text(text: &str, separators: &[&str], config: &ChunkingConfig) -> Vec<String> {
    // Pick the first separator present in the text; the empty string is the
    // unconditional last resort.
    let mut separator = "";
    let mut remaining: &[&str] = &[];
    for (i, sep) in separators.iter().enumerate() {
        if sep.is_empty() || text.contains(sep) {
            separator = sep;
            remaining = &separators[i + 1..];
            break;
        }
    }

    let pieces: Vec<String> = if separator.is_empty() {
        text.chars().map(String::from).collect()
    } else {
        // Separators stay attached to the preceding piece so that merged
        // chunks reproduce the source text verbatim.
        text.split_inclusive(separator).map(String::from).collect()
    };

    let mut final_chunks = Vec::new();
    let mut mergeable: Vec<String> = Vec::new();

    for piece in pieces {
        if piece.chars().count() <= config.chunk_size {
            mergeable.push(piece);
        } else {
            if !mergeable.is_empty() {
                final_chunks.extend(merge_pieces(&mergeable, config));
                mergeable.clear();
            }
            if remaining.is_empty() {
                final_chunks.push(piece);
            } else {
                final_chunks.extend(split_text(&piece, remaining, config));
            }
        }
    }

    if !mergeable.is_empty() {
        final_chunks.extend(merge_pieces(&mergeable, config));
    }

    final_chunks
}

/// Greedily merge small pieces into chunks of at most `chunk_size`
/// characters, carrying `chunk_overlap` trailing characters forward.
fn merge_pieces(pieces: &[String], config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut window: std::collections::VecDeque<&String> = std::collections::VecDeque::new();
    let mut total = 0usize;

    for piece in pieces {
        let piece_len = piece.chars().count();

        if total + piece_len > config.chunk_size && !window.is_empty() {
            chunks.push(window.iter().map(|s| s.as_str()).collect::<String>());

            // Drop leading pieces until the carried tail fits the overlap
            // budget and the next piece fits the chunk budget.
            while total > config.chunk_overlap
                || (total + piece_len > config.chunk_size && total > 0)
            {
                let Some(removed) = window.pop_front() else {
                    break;
                };
                total -= removed.chars().count();
            }
        }

        window.push_back(piece);
        total += piece_len;
    }

    if !window.is_empty() {
        chunks.push(window.iter().map(|s| s.as_str()).collect::<String>());
    }

    chunks
}
