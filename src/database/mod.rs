use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
    UInt64Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::embeddings::chunking::Chunk;
use crate::{Result, SiteQaError};

const TABLE_NAME: &str = "chunks";

/// The unit stored in the vector index: one chunk plus its embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    pub id: String,
    pub vector: Vec<f32>,
    pub content: String,
    pub source: String,
    pub chunk_index: u32,
    /// Global insertion position, used to break distance ties.
    pub ordinal: u64,
    pub created_at: String,
}

impl ChunkRecord {
    #[inline]
    pub fn from_chunk(chunk: &Chunk, vector: Vec<f32>, ordinal: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            content: chunk.text.clone(),
            source: chunk.source.clone(),
            chunk_index: chunk.chunk_index as u32,
            ordinal,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// One retrieved chunk with its distance to the query vector.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub content: String,
    pub source: String,
    pub chunk_index: u32,
    pub ordinal: u64,
    /// Euclidean (L2) distance; smaller is more similar.
    pub distance: f32,
}

/// Persistent vector index backed by LanceDB.
///
/// Lifecycle is rebuild-or-reuse: the table is either built fresh from the
/// full chunk set or loaded wholesale from disk; there is no incremental
/// update.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

impl VectorStore {
    /// Open (or create) the store directory at `index_dir`.
    #[inline]
    pub async fn open<P: AsRef<Path>>(index_dir: P) -> Result<Self> {
        let index_dir = index_dir.as_ref();
        std::fs::create_dir_all(index_dir).map_err(|e| {
            SiteQaError::Index(format!(
                "failed to create index directory {}: {e}",
                index_dir.display()
            ))
        })?;
        let index_dir = index_dir.canonicalize().map_err(|e| {
            SiteQaError::Index(format!(
                "failed to resolve index directory {}: {e}",
                index_dir.display()
            ))
        })?;

        let uri = format!("file://{}", index_dir.display());
        debug!("Opening LanceDB store at {}", uri);

        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SiteQaError::Index(format!("failed to open vector store: {e}")))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
        })
    }

    /// Number of stored chunks. A missing, corrupted, or unreadable table
    /// counts as zero so callers fall back to a fresh build instead of
    /// failing.
    #[inline]
    pub async fn count(&self) -> u64 {
        let table_names = match self.connection.table_names().execute().await {
            Ok(names) => names,
            Err(e) => {
                warn!("Could not list index tables, treating index as absent: {e}");
                return 0;
            }
        };
        if !table_names.contains(&self.table_name) {
            return 0;
        }

        let table = match self.connection.open_table(&self.table_name).execute().await {
            Ok(table) => table,
            Err(e) => {
                warn!("Persisted index unreadable, treating as absent: {e}");
                return 0;
            }
        };

        match table.count_rows(None).await {
            Ok(count) => count as u64,
            Err(e) => {
                warn!("Persisted index unreadable, treating as absent: {e}");
                0
            }
        }
    }

    /// Replace the stored index with the given records.
    ///
    /// Callers must have generated every embedding before this point: the
    /// previous table is only dropped once the full record set exists, so
    /// an aborted build never leaves a partial index behind.
    #[inline]
    pub async fn rebuild(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Err(SiteQaError::Index(
                "refusing to build an empty index".to_string(),
            ));
        }

        let dimension = records[0].vector.len();
        if dimension == 0 {
            return Err(SiteQaError::Index("zero-dimension embedding".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(SiteQaError::Index(format!(
                "inconsistent embedding dimensions: expected {dimension}, got {} for {}",
                bad.vector.len(),
                bad.source
            )));
        }

        self.drop_table_if_exists().await?;

        let schema = create_schema(dimension);
        let batch = create_record_batch(&schema, records)?;
        let reader = RecordBatchIterator::new(std::iter::once(Ok(batch)), schema);

        self.connection
            .create_table(&self.table_name, reader)
            .execute()
            .await
            .map_err(|e| SiteQaError::Index(format!("failed to create index table: {e}")))?;

        info!(
            "Stored {} chunks ({} dimensions) in vector index",
            records.len(),
            dimension
        );
        Ok(())
    }

    /// Return the `k` stored chunks nearest to `query` under Euclidean (L2)
    /// distance, most similar first. Distance ties are broken by insertion
    /// order. Requesting more chunks than stored returns every row.
    #[inline]
    pub async fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| SiteQaError::Index(format!("index not built: {e}")))?;

        let mut stream = table
            .vector_search(query)
            .map_err(|e| SiteQaError::Index(format!("failed to start search: {e}")))?
            .column("vector")
            .limit(k)
            .execute()
            .await
            .map_err(|e| SiteQaError::Index(format!("search failed: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| SiteQaError::Index(format!("failed to read search results: {e}")))?
        {
            results.extend(parse_search_batch(&batch)?);
        }

        // LanceDB does not define an order for equal distances; pin it to
        // insertion order.
        results.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then(a.ordinal.cmp(&b.ordinal))
        });

        debug!("Search returned {} chunks", results.len());
        Ok(results)
    }

    async fn drop_table_if_exists(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SiteQaError::Index(format!("failed to list index tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            debug!("Dropping existing index table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| SiteQaError::Index(format!("failed to drop index table: {e}")))?;
        }
        Ok(())
    }
}

fn create_schema(dimension: usize) -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new(
            "vector",
            DataType::FixedSizeList(
                Arc::new(Field::new("item", DataType::Float32, false)),
                dimension as i32,
            ),
            false,
        ),
        Field::new("content", DataType::Utf8, false),
        Field::new("source", DataType::Utf8, false),
        Field::new("chunk_index", DataType::UInt32, false),
        Field::new("ordinal", DataType::UInt64, false),
        Field::new("created_at", DataType::Utf8, false),
    ]))
}

fn create_record_batch(schema: &Arc<Schema>, records: &[ChunkRecord]) -> Result<RecordBatch> {
    let dimension = records[0].vector.len();

    let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
    let contents: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
    let sources: Vec<&str> = records.iter().map(|r| r.source.as_str()).collect();
    let chunk_indices: Vec<u32> = records.iter().map(|r| r.chunk_index).collect();
    let ordinals: Vec<u64> = records.iter().map(|r| r.ordinal).collect();
    let created_ats: Vec<&str> = records.iter().map(|r| r.created_at.as_str()).collect();

    let mut flat_values = Vec::with_capacity(records.len() * dimension);
    for record in records {
        flat_values.extend_from_slice(&record.vector);
    }
    let values = Float32Array::from(flat_values);
    let item_field = Arc::new(Field::new("item", DataType::Float32, false));
    let vector_array =
        FixedSizeListArray::try_new(item_field, dimension as i32, Arc::new(values), None)
            .map_err(|e| SiteQaError::Index(format!("failed to build vector column: {e}")))?;

    let arrays: Vec<Arc<dyn Array>> = vec![
        Arc::new(StringArray::from(ids)),
        Arc::new(vector_array),
        Arc::new(StringArray::from(contents)),
        Arc::new(StringArray::from(sources)),
        Arc::new(UInt32Array::from(chunk_indices)),
        Arc::new(UInt64Array::from(ordinals)),
        Arc::new(StringArray::from(created_ats)),
    ];

    RecordBatch::try_new(Arc::clone(schema), arrays)
        .map_err(|e| SiteQaError::Index(format!("failed to build record batch: {e}")))
}

fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<ScoredChunk>> {
    let contents = string_column(batch, "content")?;
    let sources = string_column(batch, "source")?;

    let chunk_indices = batch
        .column_by_name("chunk_index")
        .and_then(|col| col.as_any().downcast_ref::<UInt32Array>())
        .ok_or_else(|| SiteQaError::Index("missing chunk_index column".to_string()))?;
    let ordinals = batch
        .column_by_name("ordinal")
        .and_then(|col| col.as_any().downcast_ref::<UInt64Array>())
        .ok_or_else(|| SiteQaError::Index("missing ordinal column".to_string()))?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });
        results.push(ScoredChunk {
            content: contents.value(row).to_string(),
            source: sources.value(row).to_string(),
            chunk_index: chunk_indices.value(row),
            ordinal: ordinals.value(row),
            distance,
        });
    }
    Ok(results)
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    batch
        .column_by_name(name)
        .and_then(|col| col.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| SiteQaError::Index(format!("missing {name} column")))
}
