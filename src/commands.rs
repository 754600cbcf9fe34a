use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::embeddings::{Embedder, OllamaEmbedder};
use crate::index::{LanceIndex, SearchIndex, lance_index_path};
use crate::pipeline::{QueryOptions, RagPipeline};
use crate::ranking::StructuralFilter;
use crate::registry::Registry;
use crate::{RagError, Result};

async fn build_pipeline() -> Result<RagPipeline> {
    let base_dir = Config::default_base_dir().map_err(|e| RagError::Config(e.to_string()))?;
    let config = Config::load(&base_dir)?;

    let embedder = OllamaEmbedder::new(&config.ollama)?;
    let index_dir = config.index_dir();
    let backend = LanceIndex::open(&lance_index_path(&index_dir), embedder.dimension()).await?;
    let index = Arc::new(SearchIndex::open(
        Box::new(backend),
        &index_dir,
        embedder.model_id(),
        embedder.dimension(),
    )?);
    let registry = Registry::open(&config.registry_path()).await?;

    Ok(RagPipeline::new(config, Arc::new(embedder), index, registry))
}

/// Upload and index a document file
#[inline]
pub async fn add_document(path: PathBuf) -> Result<()> {
    info!("Adding document: {}", path.display());

    let base_dir = Config::default_base_dir().map_err(|e| RagError::Config(e.to_string()))?;
    let config = Config::load(&base_dir)?;
    let client = OllamaEmbedder::new(&config.ollama)?;
    let health = tokio::task::spawn_blocking(move || client.health_check())
        .await
        .map_err(|e| RagError::Embedding(format!("health check task failed: {}", e)))?;
    if let Err(e) = health {
        warn!("Ollama health check failed: {:#}", e);
        println!("Warning: Ollama server is not reachable, indexing will likely fail.");
    }

    let pipeline = build_pipeline().await?;
    let document = pipeline.upload_document(&path).await?;

    println!("Indexed document: {} (ID: {})", document.filename, document.id);
    println!("  Pages: {}", document.page_count);
    println!("  Chunks: {}", document.chunk_count);
    Ok(())
}

/// List all registered documents
#[inline]
pub async fn list_documents() -> Result<()> {
    let pipeline = build_pipeline().await?;
    let documents = pipeline.registry().list().await?;

    if documents.is_empty() {
        println!("No documents have been added yet.");
        println!("Use 'askdocs add <file>' to add one.");
        return Ok(());
    }

    println!("Documents ({} total):", documents.len());
    println!();
    for document in &documents {
        println!("{} (ID: {})", document.filename, document.id);
        println!("  Status: {}", document.status);
        println!("  Uploaded: {}", document.upload_date);
        println!(
            "  Pages: {}, Chunks: {}, Size: {} bytes",
            document.page_count, document.chunk_count, document.file_size
        );
        println!();
    }
    Ok(())
}

/// Delete a document by id or filename
#[inline]
pub async fn delete_document(document: String) -> Result<()> {
    let pipeline = build_pipeline().await?;

    let id = match pipeline.registry().get(&document).await? {
        Some(found) => found.id,
        None => {
            let matches = pipeline.registry().search(&document).await?;
            match matches.len() {
                0 => {
                    println!("No document matches '{}'", document);
                    return Ok(());
                }
                1 => matches[0].id.clone(),
                _ => {
                    println!("'{}' matches multiple documents:", document);
                    for candidate in &matches {
                        println!("  {} (ID: {})", candidate.filename, candidate.id);
                    }
                    println!("Delete by ID instead.");
                    return Ok(());
                }
            }
        }
    };

    if pipeline.delete_document(&id).await? {
        println!("Deleted document {}", id);
    } else {
        println!("Document {} not found", id);
    }
    Ok(())
}

/// Run a retrieval query and print the ranked chunks
#[inline]
pub async fn query(
    text: String,
    documents: HashSet<String>,
    k: Option<usize>,
    file_types: Vec<String>,
    keywords: Vec<String>,
    min_length: Option<usize>,
) -> Result<()> {
    let pipeline = build_pipeline().await?;

    let mut filters = Vec::new();
    if !file_types.is_empty() {
        filters.push(StructuralFilter::FileType(file_types));
    }
    if !keywords.is_empty() {
        filters.push(StructuralFilter::Keywords(keywords));
    }
    if let Some(min_length) = min_length {
        filters.push(StructuralFilter::MinLength(min_length));
    }

    let options = QueryOptions {
        documents: (!documents.is_empty()).then_some(documents),
        k,
        filters,
    };

    let result = pipeline.answer_query(&text, &options).await?;

    if result.chunks.is_empty() {
        println!("No matching chunks found.");
        println!("Confidence: {:.2}", result.confidence);
        return Ok(());
    }

    println!("Found {} chunks (confidence {:.2}):", result.chunks.len(), result.confidence);
    println!();
    for (rank, candidate) in result.chunks.iter().enumerate() {
        let metadata = &candidate.hit.metadata;
        print!("{}. [score {}] {}", rank + 1, candidate.score, metadata.source);
        if let Some(page) = metadata.page {
            print!(", page {}", page);
        }
        println!(" (chunk {})", metadata.chunk_index);
        println!("   {}", preview(&metadata.content, 200));
        println!();
    }
    Ok(())
}

/// Show registry and index totals
#[inline]
pub async fn show_status() -> Result<()> {
    let pipeline = build_pipeline().await?;

    let stats = pipeline.registry().stats().await?;
    let indexed = pipeline.index().count().await?;
    let manifest = pipeline.index().manifest();

    println!("askdocs status");
    println!("  Documents: {}", stats.document_count);
    println!("  Registered chunks: {}", stats.chunk_count);
    println!("  Indexed vectors: {}", indexed);
    println!(
        "  Embedding model: {} ({} dimensions)",
        manifest.model, manifest.dimension
    );
    Ok(())
}

/// Print the active configuration, optionally writing defaults to disk first
#[inline]
pub fn show_config(init: bool) -> Result<()> {
    let base_dir = Config::default_base_dir().map_err(|e| RagError::Config(e.to_string()))?;
    let config = Config::load(&base_dir)?;

    if init {
        config.save()?;
        println!("Wrote {}", base_dir.join("config.toml").display());
    }

    let rendered =
        toml::to_string_pretty(&config).map_err(|e| RagError::Config(e.to_string()))?;
    println!("Base directory: {}", base_dir.display());
    println!();
    print!("{}", rendered);
    Ok(())
}

fn preview(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        content.to_string()
    } else {
        let truncated: String = content.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_truncates_long_content() {
        let content = "x".repeat(300);
        let shown = preview(&content, 200);
        assert_eq!(shown.chars().count(), 203);
        assert!(shown.ends_with("..."));
    }

    #[test]
    fn preview_keeps_short_content_intact() {
        assert_eq!(preview("short", 200), "short");
    }
}
