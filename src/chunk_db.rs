use std::path::Path;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    store::{ChunkMetadata, ChunkRecord, QueryMatch, VectorStore},
};

const CHUNKS: TableDefinition<&str, &[u8]> = TableDefinition::new("chunks");
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const DIMENSION_KEY: &str = "dimension";

/// Header size: 4 bytes for the vector dimension.
const HEADER_SIZE: usize = 4;

/// JSON payload stored after the vector bytes.
#[derive(Serialize, Deserialize)]
struct ChunkPayload {
    text: String,
    source: String,
    chunk_index: usize,
    total_chunks: usize,
}

/// redb-backed chunk store.
///
/// Binary format per entry, keyed by chunk id:
/// - 4 bytes: vector dimension D (u32 LE)
/// - D * 4 bytes: f32 LE vector values
/// - remainder: JSON payload with text and metadata
///
/// The first `add` pins the store's vector dimension in a meta table; later
/// adds and queries with a different dimension are rejected, since distances
/// across models are meaningless.
///
/// Similarity queries are a brute-force cosine-distance scan, ascending,
/// with ties broken by id so results are deterministic.
pub struct ChunkDb {
    db: Database,
}

impl ChunkDb {
    /// Open or create a chunk store at the given path.
    ///
    /// # Examples
    ///
    /// ```
    /// # let tmp = tempfile::tempdir().unwrap();
    /// use carpet::{ChunkDb, store::VectorStore};
    ///
    /// let db = ChunkDb::open(&tmp.path().join("chunks.redb")).unwrap();
    /// assert!(db.get_all().unwrap().is_empty());
    /// ```
    pub fn open(path: &Path) -> Result<Self> {
        let db = Database::create(path)?;

        let txn = db.begin_write()?;
        txn.open_table(CHUNKS)?;
        txn.open_table(META)?;
        txn.commit()?;

        Ok(Self { db })
    }

    /// The pinned vector dimension, or `None` before the first add.
    pub fn dimension(&self) -> Result<Option<usize>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(META)?;
        Ok(table.get(DIMENSION_KEY)?.map(|v| v.value() as usize))
    }

    fn encode(record: &ChunkRecord) -> Result<Vec<u8>> {
        let payload = ChunkPayload {
            text: record.text.clone(),
            source: record.metadata.source.clone(),
            chunk_index: record.metadata.chunk_index,
            total_chunks: record.metadata.total_chunks,
        };
        let json = serde_json::to_vec(&payload)
            .map_err(|e| Error::Config(format!("cannot serialize chunk payload: {e}")))?;

        let dim = record.vector.len() as u32;
        let mut bytes =
            Vec::with_capacity(HEADER_SIZE + record.vector.len() * 4 + json.len());
        bytes.extend_from_slice(&dim.to_le_bytes());
        bytes.extend_from_slice(bytemuck::cast_slice(&record.vector));
        bytes.extend_from_slice(&json);
        Ok(bytes)
    }

    fn decode(id: &str, bytes: &[u8]) -> Option<ChunkRecord> {
        if bytes.len() < HEADER_SIZE {
            return None;
        }
        let dim = u32::from_le_bytes(bytes[0..4].try_into().ok()?) as usize;
        let vector_end = HEADER_SIZE + dim * 4;
        if bytes.len() < vector_end {
            return None;
        }
        // The vector bytes sit behind the 4-byte header, so the slice is
        // generally not f32-aligned; decode element by element.
        let mut vector = Vec::with_capacity(dim);
        for raw in bytes[HEADER_SIZE..vector_end].chunks_exact(4) {
            vector.push(f32::from_le_bytes(raw.try_into().ok()?));
        }
        let payload: ChunkPayload = serde_json::from_slice(&bytes[vector_end..]).ok()?;

        Some(ChunkRecord {
            id: id.to_string(),
            vector,
            text: payload.text,
            metadata: ChunkMetadata {
                source: payload.source,
                chunk_index: payload.chunk_index,
                total_chunks: payload.total_chunks,
            },
        })
    }
}

impl VectorStore for ChunkDb {
    fn get_all(&self) -> Result<Vec<ChunkRecord>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(CHUNKS)?;
        let mut result = Vec::new();
        for entry in table.iter()? {
            let (k, v) = entry?;
            match Self::decode(k.value(), v.value()) {
                Some(record) => result.push(record),
                None => {
                    tracing::warn!(id = %k.value(), "skipping undecodable chunk record");
                }
            }
        }
        Ok(result)
    }

    /// Append records in a single transaction.
    ///
    /// Re-adding an existing id overwrites it (redb insert semantics); the
    /// ingestion pipeline's dedup check runs first, so in practice an upsert
    /// only happens when a caller bypasses the pipeline.
    fn add(&self, records: &[ChunkRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let dim = records[0].vector.len();
        if dim == 0 {
            return Err(Error::Config("cannot store an empty vector".into()));
        }
        for record in records {
            if record.vector.len() != dim {
                return Err(Error::Config(format!(
                    "vector dimension mismatch within batch: {} vs {dim}",
                    record.vector.len()
                )));
            }
        }

        let txn = self.db.begin_write()?;
        {
            let mut meta = txn.open_table(META)?;
            // Bind before matching so the access guard's borrow of `meta`
            // ends here and the insert below is allowed.
            let stored_dim = meta.get(DIMENSION_KEY)?.map(|v| v.value() as usize);
            match stored_dim {
                Some(stored) if stored != dim => {
                    return Err(Error::Config(format!(
                        "store holds {stored}-dimensional vectors, got {dim}"
                    )));
                }
                Some(_) => {}
                None => {
                    meta.insert(DIMENSION_KEY, dim as u64)?;
                }
            }

            let mut table = txn.open_table(CHUNKS)?;
            for record in records {
                let bytes = Self::encode(record)?;
                table.insert(record.id.as_str(), bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn delete(&self, ids: &[String]) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        let txn = self.db.begin_write()?;
        let removed = {
            let mut table = txn.open_table(CHUNKS)?;
            let mut removed = 0;
            for id in ids {
                if table.remove(id.as_str())?.is_some() {
                    removed += 1;
                }
            }
            removed
        };
        txn.commit()?;
        Ok(removed)
    }

    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>> {
        if top_k == 0 {
            return Ok(Vec::new());
        }
        if let Some(dim) = self.dimension()?
            && dim != vector.len()
        {
            return Err(Error::Config(format!(
                "query vector has {} dimensions, store holds {dim}",
                vector.len()
            )));
        }

        let mut matches: Vec<QueryMatch> = self
            .get_all()?
            .into_iter()
            .map(|record| QueryMatch {
                distance: cosine_distance(vector, &record.vector),
                id: record.id,
                text: record.text,
                metadata: record.metadata,
            })
            .collect();

        matches.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.id.cmp(&b.id))
        });
        matches.truncate(top_k);
        Ok(matches)
    }
}

impl std::fmt::Debug for ChunkDb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkDb").finish_non_exhaustive()
    }
}

/// Cosine distance: `1 - cos(a, b)`. Zero-norm vectors are maximally distant.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}
