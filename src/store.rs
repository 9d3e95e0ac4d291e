//! The vector store seam: record types and the [`VectorStore`] trait.
//!
//! The rest of the crate only talks to the store through this trait, so the
//! redb implementation in [`crate::chunk_db`] can be swapped for anything
//! that persists `(id, vector, text, metadata)` tuples and answers
//! nearest-neighbor queries.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Metadata stored alongside every chunk.
///
/// All chunks of one file share the same `source` and `total_chunks`, and
/// `chunk_index` runs contiguously from 0.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// The originating file path.
    pub source: String,
    /// Zero-based position in the file's emitted chunk sequence.
    pub chunk_index: usize,
    /// Number of chunks emitted for this file.
    pub total_chunks: usize,
}

/// One stored chunk: the unit of embedding and storage.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkRecord {
    /// Stable id, a deterministic function of (source path, chunk index).
    pub id: String,
    /// The embedding vector; same length for every record in a store.
    pub vector: Vec<f32>,
    /// The chunk's text.
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A nearest-neighbor query hit.
#[derive(Debug, Clone)]
pub struct QueryMatch {
    pub id: String,
    /// Distance from the query vector; smaller is closer.
    pub distance: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// A store of chunk records with similarity search.
///
/// Records are append-only from the store's point of view: they are created
/// by ingestion, removed by [`VectorStore::delete`], and never mutated in
/// place. Implementations define their own distance metric; deleting an
/// unknown id is a no-op.
pub trait VectorStore {
    /// Return every stored record.
    fn get_all(&self) -> Result<Vec<ChunkRecord>>;

    /// Append records. Behavior on a duplicate id is implementation-defined
    /// and must be documented by the implementation.
    fn add(&self, records: &[ChunkRecord]) -> Result<()>;

    /// Remove records by id, returning how many actually existed.
    fn delete(&self, ids: &[String]) -> Result<usize>;

    /// Return the `top_k` records nearest to `vector`, closest first.
    fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>>;
}

/// Check whether any chunk of `source` is already stored.
///
/// Presence means an exact `metadata.source` match; ids are never consulted,
/// so `/a/b.txt` can never be confused with `/a/b.txt.bak`.
pub fn source_present(store: &dyn VectorStore, source: &str) -> Result<bool> {
    Ok(store
        .get_all()?
        .iter()
        .any(|record| record.metadata.source == source))
}

/// Collect the ids of every chunk belonging to `source`.
pub fn ids_for_source(store: &dyn VectorStore, source: &str) -> Result<Vec<String>> {
    Ok(store
        .get_all()?
        .into_iter()
        .filter(|record| record.metadata.source == source)
        .map(|record| record.id)
        .collect())
}
