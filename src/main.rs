use std::collections::HashSet;
use std::path::PathBuf;

use askdocs::Result;
use askdocs::commands::{
    add_document, delete_document, list_documents, query, show_config, show_status,
};
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "askdocs")]
#[command(about = "Index local documents and retrieve ranked, confidence-scored chunks")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload and index a document file
    Add {
        /// Path to the document (.txt or .md)
        path: PathBuf,
    },
    /// List all registered documents
    List,
    /// Delete a document and its index entries
    Delete {
        /// Document ID or filename to delete
        document: String,
    },
    /// Retrieve ranked chunks for a query
    Query {
        /// The query text
        text: String,
        /// Restrict the search to specific document IDs (repeatable)
        #[arg(long = "doc")]
        documents: Vec<String>,
        /// Number of chunks to return
        #[arg(long)]
        k: Option<usize>,
        /// Only return chunks from files with these extensions (repeatable)
        #[arg(long = "file-type")]
        file_types: Vec<String>,
        /// Only return chunks containing one of these keywords (repeatable)
        #[arg(long = "keyword")]
        keywords: Vec<String>,
        /// Drop chunks shorter than this many characters
        #[arg(long)]
        min_length: Option<usize>,
    },
    /// Show registry and index totals
    Status,
    /// Show the active configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Add { path } => {
            add_document(path).await?;
        }
        Commands::List => {
            list_documents().await?;
        }
        Commands::Delete { document } => {
            delete_document(document).await?;
        }
        Commands::Query {
            text,
            documents,
            k,
            file_types,
            keywords,
            min_length,
        } => {
            let documents: HashSet<String> = documents.into_iter().collect();
            query(text, documents, k, file_types, keywords, min_length).await?;
        }
        Commands::Status => {
            show_status().await?;
        }
        Commands::Config { init } => {
            show_config(init)?;
        }
    }

    Ok(())
}
