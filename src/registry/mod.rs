
use anyhow::Context;
use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, Pool, Sqlite, Type};
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Result;

pub type DbPool = Pool<Sqlite>;

/// Metadata row for an uploaded document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub upload_date: NaiveDateTime,
    pub file_size: i64,
    pub page_count: i64,
    pub chunk_count: i64,
    pub status: DocumentStatus,
}

/// Lifecycle of a document: `uploaded -> chunked -> indexed`, with `deleted`
/// reachable from any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DocumentStatus {
    Uploaded,
    Chunked,
    Indexed,
    Deleted,
}

impl std::fmt::Display for DocumentStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            DocumentStatus::Uploaded => write!(f, "Uploaded"),
            DocumentStatus::Chunked => write!(f, "Chunked"),
            DocumentStatus::Indexed => write!(f, "Indexed"),
            DocumentStatus::Deleted => write!(f, "Deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDocument {
    pub filename: String,
    pub path: String,
    pub file_size: i64,
}

/// Aggregate counts for the status command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct RegistryStats {
    pub document_count: i64,
    pub chunk_count: i64,
}

const SELECT_DOCUMENT: &str = "SELECT id, filename, path, upload_date, file_size, \
                               page_count, chunk_count, status FROM documents";

/// SQLite-backed registry of uploaded documents.
#[derive(Debug, Clone)]
pub struct Registry {
    pool: DbPool,
}

impl Registry {
    /// Open (or create) the registry database at `db_path` and run migrations.
    #[inline]
    pub async fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect_with(options)
            .await
            .context("Failed to create registry connection pool")?;

        let registry = Self { pool };
        registry.run_migrations().await?;

        Ok(registry)
    }

    /// In-memory registry, used by tests.
    #[inline]
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::new().in_memory(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to create in-memory registry")?;

        let registry = Self { pool };
        registry.run_migrations().await?;

        Ok(registry)
    }

    async fn run_migrations(&self) -> Result<()> {
        debug!("Running registry migrations");
        sqlx::migrate!("src/registry/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run registry migrations")?;
        Ok(())
    }

    /// Record a freshly uploaded document and return its row.
    #[inline]
    pub async fn create(&self, new_document: NewDocument) -> Result<Document> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO documents (id, filename, path, upload_date, file_size, status) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new_document.filename)
        .bind(&new_document.path)
        .bind(now)
        .bind(new_document.file_size)
        .bind(DocumentStatus::Uploaded)
        .execute(&self.pool)
        .await
        .context("Failed to insert document")?;

        info!("Registered document {} ({})", new_document.filename, id);

        self.get(&id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to read back created document").into())
    }

    #[inline]
    pub async fn get(&self, id: &str) -> Result<Option<Document>> {
        let document = sqlx::query_as::<_, Document>(&format!("{} WHERE id = ?", SELECT_DOCUMENT))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to get document by id")?;
        Ok(document)
    }

    /// All documents, newest first.
    #[inline]
    pub async fn list(&self) -> Result<Vec<Document>> {
        let documents = sqlx::query_as::<_, Document>(&format!(
            "{} ORDER BY upload_date DESC",
            SELECT_DOCUMENT
        ))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list documents")?;
        Ok(documents)
    }

    /// Documents whose filename contains `needle`, case-insensitive.
    #[inline]
    pub async fn search(&self, needle: &str) -> Result<Vec<Document>> {
        let pattern = format!("%{}%", needle.replace('%', "\\%").replace('_', "\\_"));
        let documents = sqlx::query_as::<_, Document>(&format!(
            "{} WHERE filename LIKE ? ESCAPE '\\' ORDER BY upload_date DESC",
            SELECT_DOCUMENT
        ))
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .context("Failed to search documents")?;
        Ok(documents)
    }

    #[inline]
    pub async fn set_status(&self, id: &str, status: DocumentStatus) -> Result<()> {
        sqlx::query("UPDATE documents SET status = ? WHERE id = ?")
            .bind(status)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update document status")?;
        Ok(())
    }

    /// Record chunking results for a document.
    #[inline]
    pub async fn set_counts(&self, id: &str, page_count: i64, chunk_count: i64) -> Result<()> {
        sqlx::query("UPDATE documents SET page_count = ?, chunk_count = ? WHERE id = ?")
            .bind(page_count)
            .bind(chunk_count)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update document counts")?;
        Ok(())
    }

    /// Remove a document row entirely. Returns whether a row existed.
    #[inline]
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete document")?;
        Ok(result.rows_affected() > 0)
    }

    /// Totals across documents that are still live.
    #[inline]
    pub async fn stats(&self) -> Result<RegistryStats> {
        let stats = sqlx::query_as::<_, RegistryStats>(
            "SELECT COUNT(*) AS document_count, COALESCE(SUM(chunk_count), 0) AS chunk_count \
             FROM documents WHERE status != 'deleted'",
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to read registry stats")?;
        Ok(stats)
    }
}
