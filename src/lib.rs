use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Document contains no text")]
    EmptyDocument,

    #[error("Query text is empty")]
    EmptyQuery,

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chunking;
pub mod commands;
pub mod confidence;
pub mod config;
pub mod embeddings;
pub mod index;
pub mod loader;
pub mod pipeline;
pub mod ranking;
pub mod registry;
pub mod retrieval;
