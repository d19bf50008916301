
use super::{ChunkMetadata, ChunkRecord};
use crate::database::Collection;
use crate::{BotError, Result};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use itertools::Itertools;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vector collection persisted as a LanceDB table named after the collection.
///
/// The table is created on the first insert, once the embedding dimension is
/// known.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    path: PathBuf,
}

/// Search result from vector similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub id: String,
    pub metadata: ChunkMetadata,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Open the collection stored under `path`, creating the directory if
    /// needed
    #[inline]
    pub async fn get_or_create(path: &Path, name: &str) -> Result<Self> {
        debug!("Opening LanceDB collection {} at {:?}", name, path);

        std::fs::create_dir_all(path).map_err(|e| {
            BotError::Database(format!(
                "Failed to create vector database directory {}: {}",
                path.display(),
                e
            ))
        })?;

        let uri = path.to_string_lossy().into_owned();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| BotError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        let store = Self {
            connection,
            table_name: name.to_string(),
            path: path.to_path_buf(),
        };

        if let Some(dim) = store.existing_dimension().await? {
            info!("Opened collection {} ({} dimensions)", name, dim);
        } else {
            info!("Collection {} is empty", name);
        }

        Ok(store)
    }

    /// Directory the collection lives in
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete every stored chunk. The only way chunks are removed.
    #[inline]
    pub async fn reset(&self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping collection table {}", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| BotError::Database(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| BotError::Database(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Option<Table>> {
        if !self.table_exists().await? {
            return Ok(None);
        }
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| BotError::Database(format!("Failed to open table: {}", e)))?;
        Ok(Some(table))
    }

    /// Vector dimension of the existing table, if there is one
    async fn existing_dimension(&self) -> Result<Option<usize>> {
        let Some(table) = self.open_table().await? else {
            return Ok(None);
        };

        let schema = table
            .schema()
            .await
            .map_err(|e| BotError::Database(format!("Failed to get table schema: {}", e)))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(Some(*size as usize));
                }
            }
        }

        Err(BotError::Database(
            "Could not find vector column or determine dimension".to_string(),
        ))
    }

    /// Open the table for inserting `vector_dim`-sized vectors, creating or
    /// recreating it when that is safe
    async fn table_for_dimension(&self, vector_dim: usize) -> Result<Table> {
        match self.existing_dimension().await? {
            Some(dim) if dim == vector_dim => {}
            Some(dim) => {
                let rows = self.count().await?;
                if rows > 0 {
                    return Err(BotError::Database(format!(
                        "Collection {} holds {} vectors of dimension {}, cannot add dimension {}; reset it first",
                        self.table_name, rows, dim, vector_dim
                    )));
                }
                warn!(
                    "Recreating empty collection {} with dimension {} (was {})",
                    self.table_name, vector_dim, dim
                );
                self.reset().await?;
                self.create_table(vector_dim).await?;
            }
            None => self.create_table(vector_dim).await?,
        }

        self.open_table().await?.ok_or_else(|| {
            BotError::Database(format!("Table {} disappeared", self.table_name))
        })
    }

    async fn create_table(&self, vector_dim: usize) -> Result<()> {
        info!(
            "Creating collection table {} with {} dimensions",
            self.table_name, vector_dim
        );
        self.connection
            .create_empty_table(&self.table_name, create_schema(vector_dim))
            .execute()
            .await
            .map_err(|e| BotError::Database(format!("Failed to create table: {}", e)))?;
        Ok(())
    }

    /// Parse search results from LanceDB stream into SearchResult structs
    async fn parse_search_results_stream(
        &self,
        mut results: lancedb::arrow::SendableRecordBatchStream,
    ) -> Result<Vec<SearchResult>> {
        let mut search_results = Vec::new();

        while let Some(batch_result) = results
            .try_next()
            .await
            .map_err(|e| BotError::Database(format!("Failed to read result stream: {}", e)))?
        {
            search_results.extend(parse_search_batch(&batch_result)?);
        }

        debug!("Parsed {} search results from stream", search_results.len());
        Ok(search_results)
    }
}

#[async_trait]
impl Collection for VectorStore {
    #[inline]
    fn name(&self) -> &str {
        &self.table_name
    }

    async fn add(&self, records: Vec<ChunkRecord>) -> Result<()> {
        // A merge may match each stored row once, so the last record per id wins
        let records: Vec<ChunkRecord> = records
            .into_iter()
            .rev()
            .unique_by(|record| record.id.clone())
            .collect();

        let Some(first) = records.first() else {
            debug!("No records to store");
            return Ok(());
        };

        let vector_dim = first.vector.len();
        if vector_dim == 0 {
            return Err(BotError::Database("Cannot store empty vectors".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != vector_dim) {
            return Err(BotError::Database(format!(
                "Record {} has {} dimensions, expected {}",
                bad.id,
                bad.vector.len(),
                vector_dim
            )));
        }

        debug!("Storing batch of {} records", records.len());

        let table = self.table_for_dimension(vector_dim).await?;

        let record_batch = create_record_batch(&records, vector_dim)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        // Rows sharing an id are replaced in the same commit as the inserts
        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| BotError::Database(format!("Failed to upsert records: {}", e)))?;

        info!(
            "Stored {} records in collection {}",
            records.len(),
            self.table_name
        );
        Ok(())
    }

    async fn query(&self, vector: &[f32], n_results: usize) -> Result<Vec<SearchResult>> {
        debug!("Searching for similar vectors with limit: {}", n_results);

        let Some(table) = self.open_table().await? else {
            debug!("Collection {} has no table yet", self.table_name);
            return Ok(Vec::new());
        };

        if n_results == 0 || self.count().await? == 0 {
            return Ok(Vec::new());
        }

        let results = table
            .vector_search(vector)
            .map_err(|e| BotError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(n_results)
            .execute()
            .await
            .map_err(|e| BotError::Database(format!("Failed to execute search: {}", e)))?;

        let mut search_results = self.parse_search_results_stream(results).await?;
        search_results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        Ok(search_results)
    }

    async fn count(&self) -> Result<u64> {
        let Some(table) = self.open_table().await? else {
            return Ok(0);
        };

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| BotError::Database(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}

/// Create schema with the specified vector dimension
fn create_schema(vector_dim: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                vector_dim as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

/// Create a RecordBatch from chunk records
fn create_record_batch(records: &[ChunkRecord], vector_dim: usize) -> Result<RecordBatch> {
    let len = records.len();

    let mut ids = Vec::with_capacity(len);
    let mut flat_values = Vec::with_capacity(len * vector_dim);
    let mut contents = Vec::with_capacity(len);
    let mut sources = Vec::with_capacity(len);
    let mut chunk_indices = Vec::with_capacity(len);
    let mut created_ats = Vec::with_capacity(len);

    for record in records {
        ids.push(record.id.as_str());
        flat_values.extend_from_slice(&record.vector);
        contents.push(record.metadata.content.as_str());
        sources.push(record.metadata.source.as_str());
        chunk_indices.push(record.metadata.chunk_index);
        created_ats.push(record.metadata.created_at.as_str());
    }

    let values_array = Float32Array::from(flat_values);
    let field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
            .map_err(|e| BotError::Database(format!("Failed to create vector array: {}", e)))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(create_schema(vector_dim), arrays)
        .map_err(|e| BotError::Database(format!("Failed to create record batch: {}", e)))
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .ok_or_else(|| BotError::Database(format!("Missing {name} column")))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| BotError::Database(format!("Invalid {name} column type")))
}

/// Parse a single record batch from search results
fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchResult>> {
    let ids = string_column(batch, "id")?;
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;
    let created_ats = string_column(batch, "created_at")?;
    let chunk_indices = batch
        .column_by_name("chunk_index")
        .ok_or_else(|| BotError::Database("Missing chunk_index column".to_string()))?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or_else(|| BotError::Database("Invalid chunk_index column type".to_string()))?;

    // Extract distance scores if available
    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let search_results = (0..batch.num_rows())
        .map(|row| {
            let distance =
                distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

            SearchResult {
                id: ids.value(row).to_string(),
                metadata: ChunkMetadata {
                    content: contents.value(row).to_string(),
                    source: sources.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    created_at: created_ats.value(row).to_string(),
                },
                // Convert distance to similarity score (higher is better)
                similarity_score: 1.0 - distance,
                distance,
            }
        })
        .collect();

    Ok(search_results)
}
