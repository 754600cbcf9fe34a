// Document loading: turns an uploaded file into page texts by extension.


use std::fs;
use std::path::Path;

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use tracing::debug;

use crate::{RagError, Result};

/// One page of loaded document text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentPage {
    pub text: String,
    /// 1-based page number in the source document
    pub page_number: u32,
}

/// Load a document into pages based on its file extension.
///
/// Plain text and markdown files load as a single page. Unknown extensions
/// fail with [`RagError::UnsupportedFormat`]; a document whose loaded text
/// is empty fails with [`RagError::EmptyDocument`].
#[inline]
pub fn load_document(path: &Path) -> Result<Vec<DocumentPage>> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let pages = match extension.as_str() {
        "txt" | "text" => load_plain_text(path)?,
        "md" | "markdown" => load_markdown(path)?,
        other => {
            return Err(RagError::UnsupportedFormat(if other.is_empty() {
                "(no extension)".to_string()
            } else {
                format!(".{}", other)
            }));
        }
    };

    if pages.iter().all(|p| p.text.trim().is_empty()) {
        return Err(RagError::EmptyDocument);
    }

    debug!("Loaded {} pages from {}", pages.len(), path.display());
    Ok(pages)
}

fn load_plain_text(path: &Path) -> Result<Vec<DocumentPage>> {
    let text = fs::read_to_string(path)?;
    Ok(vec![DocumentPage {
        text,
        page_number: 1,
    }])
}

fn load_markdown(path: &Path) -> Result<Vec<DocumentPage>> {
    let source = fs::read_to_string(path)?;
    Ok(vec![DocumentPage {
        text: markdown_to_text(&source),
        page_number: 1,
    }])
}

/// Strip markdown markup, keeping the readable text with paragraph breaks.
fn markdown_to_text(source: &str) -> String {
    let parser = Parser::new_ext(source, Options::empty());
    let mut text = String::with_capacity(source.len());

    for event in parser {
        match event {
            Event::Text(t) | Event::Code(t) => text.push_str(&t),
            Event::SoftBreak => text.push(' '),
            Event::HardBreak => text.push('\n'),
            Event::Start(Tag::Item) => text.push_str("- "),
            Event::End(
                TagEnd::Paragraph
                | TagEnd::Heading(_)
                | TagEnd::Item
                | TagEnd::CodeBlock
                | TagEnd::BlockQuote(_),
            ) => text.push_str("\n\n"),
            _ => {}
        }
    }

    text.trim_end().to_string()
}
