#[cfg(test)]
mod tests;

use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::{ChunkMetadata, ChunkRecord, IndexBackend, SearchHit};
use crate::{RagError, Result};

const TABLE_NAME: &str = "chunks";

/// LanceDB-backed index. Unlike the flat backend this one can filter and
/// delete by `document_id` natively, so searches scoped to a document subset
/// push the predicate into the store instead of over-fetching.
pub struct LanceIndex {
    connection: Connection,
    dimension: usize,
}

impl LanceIndex {
    /// Connect to (or create) a LanceDB dataset at `path`.
    #[inline]
    pub async fn open(path: &Path, dimension: usize) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        debug!("Opening LanceDB index at {:?}", path);
        let uri = format!("file://{}", path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to connect to LanceDB: {}", e)))?;

        let index = Self {
            connection,
            dimension,
        };
        index.ensure_table().await?;

        Ok(index)
    }

    async fn ensure_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to list tables: {}", e)))?;

        if table_names.contains(&TABLE_NAME.to_string()) {
            return Ok(());
        }

        self.connection
            .create_empty_table(TABLE_NAME, self.schema())
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to create table: {}", e)))?;

        info!("Created chunks table with {} dimensions", self.dimension);
        Ok(())
    }

    async fn table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(TABLE_NAME)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to open table: {}", e)))
    }

    fn schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("document_id", DataType::Utf8, false),
            Field::new("source", DataType::Utf8, false),
            Field::new("title", DataType::Utf8, true),
            Field::new("page", DataType::UInt32, true),
            Field::new("chunk_index", DataType::UInt32, false),
            Field::new("content", DataType::Utf8, false),
            Field::new("created_at", DataType::Utf8, false),
        ]))
    }

    fn record_batch(&self, records: &[ChunkRecord]) -> Result<RecordBatch> {
        let len = records.len();
        let created_at = Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut document_ids = Vec::with_capacity(len);
        let mut sources = Vec::with_capacity(len);
        let mut titles = Vec::with_capacity(len);
        let mut pages = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);

        for record in records {
            if record.vector.len() != self.dimension {
                return Err(RagError::Index(format!(
                    "record {} has {} dimensions, table expects {}",
                    record.id,
                    record.vector.len(),
                    self.dimension
                )));
            }
            ids.push(record.id.as_str());
            document_ids.push(record.metadata.document_id.as_str());
            sources.push(record.metadata.source.as_str());
            titles.push(record.metadata.title.as_deref());
            pages.push(record.metadata.page);
            chunk_indices.push(record.metadata.chunk_index);
            contents.push(record.metadata.content.as_str());
            flat_values.extend_from_slice(&record.vector);
        }

        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(Float32Array::from(flat_values)),
            None,
        )
        .map_err(|e| RagError::Index(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(document_ids)),
            Arc::new(StringArray::from(sources)),
            Arc::new(StringArray::from(titles)),
            Arc::new(UInt32Array::from(pages)),
            Arc::new(UInt32Array::from(chunk_indices)),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(vec![created_at.as_str(); len])),
        ];

        RecordBatch::try_new(self.schema(), arrays)
            .map_err(|e| RagError::Index(format!("Failed to create record batch: {}", e)))
    }

    fn parse_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>> {
        let ids = string_column(batch, "id")?;
        let document_ids = string_column(batch, "document_id")?;
        let sources = string_column(batch, "source")?;
        let titles = string_column(batch, "title")?;
        let pages = u32_column(batch, "page")?;
        let chunk_indices = u32_column(batch, "chunk_index")?;
        let contents = string_column(batch, "content")?;

        let distances = batch
            .column_by_name("_distance")
            .map(|col| col.as_any().downcast_ref::<Float32Array>());

        let mut hits = Vec::with_capacity(batch.num_rows());
        for row in 0..batch.num_rows() {
            let distance = distances
                .flatten()
                .map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            hits.push(SearchHit {
                metadata: ChunkMetadata {
                    chunk_id: ids.value(row).to_string(),
                    document_id: document_ids.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    title: (!titles.is_null(row)).then(|| titles.value(row).to_string()),
                    page: (!pages.is_null(row)).then(|| pages.value(row)),
                    chunk_index: chunk_indices.value(row),
                    content: contents.value(row).to_string(),
                },
                distance,
                similarity: 1.0 - distance,
            });
        }

        Ok(hits)
    }
}

#[async_trait]
impl IndexBackend for LanceIndex {
    async fn insert(&mut self, records: Vec<ChunkRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        debug!("Inserting {} records into LanceDB index", records.len());

        let batch = self.record_batch(&records)?;
        let schema = batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        self.table()
            .await?
            .add(reader)
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to insert records: {}", e)))?;

        Ok(())
    }

    async fn search(
        &self,
        vector: &[f32],
        k: usize,
        documents: Option<&HashSet<String>>,
    ) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let table = self.table().await?;
        let mut query = table
            .vector_search(vector)
            .map_err(|e| RagError::Index(format!("Failed to create vector search: {}", e)))?
            .distance_type(lancedb::DistanceType::Cosine)
            .column("vector")
            .limit(k);

        if let Some(documents) = documents {
            if documents.is_empty() {
                return Ok(Vec::new());
            }
            query = query.only_if(document_predicate(documents));
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| RagError::Index(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Index(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_batch(&batch)?);
        }

        debug!("LanceDB search returned {} hits", hits.len());
        Ok(hits)
    }

    async fn remove_document(&mut self, document_id: &str) -> Result<u64> {
        let table = self.table().await?;
        let predicate = format!("document_id = '{}'", escape_literal(document_id));

        // LanceDB's delete does not report a count, so measure first
        let removed = table
            .count_rows(Some(predicate.clone()))
            .await
            .map_err(|e| RagError::Index(format!("Failed to count matching rows: {}", e)))?;

        table
            .delete(&predicate)
            .await
            .map_err(|e| RagError::Index(format!("Failed to delete records: {}", e)))?;

        if removed > 0 {
            info!("Removed {} records for document {}", removed, document_id);
        }
        Ok(removed as u64)
    }

    async fn count(&self) -> Result<u64> {
        let count = self
            .table()
            .await?
            .count_rows(None)
            .await
            .map_err(|e| RagError::Index(format!("Failed to count rows: {}", e)))?;
        Ok(count as u64)
    }

    fn supports_document_filter(&self) -> bool {
        true
    }
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_column(batch, name)
}

fn u32_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a UInt32Array> {
    typed_column(batch, name)
}

fn typed_column<'a, T: 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| RagError::Index(format!("Missing {} column", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| RagError::Index(format!("Invalid {} column type", name)))
}

fn document_predicate(documents: &HashSet<String>) -> String {
    let quoted: Vec<String> = documents
        .iter()
        .map(|id| format!("'{}'", escape_literal(id)))
        .collect();
    format!("document_id IN ({})", quoted.join(", "))
}

fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
