//! Read-side inspection and admin over the chunk store: listing, statistics,
//! bulk clear, and per-file deletion.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    error::Result,
    store::{ChunkRecord, VectorStore, ids_for_source},
};

/// Preview length for chunk listings.
const LIST_PREVIEW_CHARS: usize = 100;

/// One source file and its chunk count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub source: String,
    pub chunks: usize,
}

/// Aggregate statistics over the whole store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub total_chunks: usize,
    pub unique_sources: usize,
    pub total_chars: usize,
    pub avg_chunk_size: f64,
}

/// All records grouped by source, sources sorted.
pub fn list_all(store: &dyn VectorStore) -> Result<Vec<(String, Vec<ChunkRecord>)>> {
    let mut grouped: BTreeMap<String, Vec<ChunkRecord>> = BTreeMap::new();
    for record in store.get_all()? {
        grouped
            .entry(record.metadata.source.clone())
            .or_default()
            .push(record);
    }
    for records in grouped.values_mut() {
        records.sort_by_key(|r| r.metadata.chunk_index);
    }
    Ok(grouped.into_iter().collect())
}

/// Sorted unique sources with their chunk counts.
pub fn list_sources(store: &dyn VectorStore) -> Result<Vec<SourceSummary>> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in store.get_all()? {
        *counts.entry(record.metadata.source).or_default() += 1;
    }
    Ok(counts
        .into_iter()
        .map(|(source, chunks)| SourceSummary { source, chunks })
        .collect())
}

/// Chunk/source/character totals. An empty store yields all zeros; the
/// average never divides by zero.
pub fn stats(store: &dyn VectorStore) -> Result<StoreStats> {
    let records = store.get_all()?;
    let total_chunks = records.len();
    let total_chars: usize = records.iter().map(|r| r.text.chars().count()).sum();
    let unique_sources = records
        .iter()
        .map(|r| r.metadata.source.as_str())
        .collect::<std::collections::HashSet<_>>()
        .len();
    let avg_chunk_size = if total_chunks == 0 {
        0.0
    } else {
        total_chars as f64 / total_chunks as f64
    };

    Ok(StoreStats {
        total_chunks,
        unique_sources,
        total_chars,
        avg_chunk_size,
    })
}

/// Delete every record, returning how many were removed.
///
/// Destructive; callers are expected to confirm with the user first.
pub fn clear_all(store: &dyn VectorStore) -> Result<usize> {
    let ids: Vec<String> = store.get_all()?.into_iter().map(|r| r.id).collect();
    store.delete(&ids)
}

/// Delete all chunks whose `metadata.source` equals `source`.
///
/// Returns `None` when no chunks belong to the file (distinct from deleting
/// zero of an existing file, which cannot happen with a lookup-then-delete).
pub fn delete_by_file(store: &dyn VectorStore, source: &str) -> Result<Option<usize>> {
    let ids = ids_for_source(store, source)?;
    if ids.is_empty() {
        return Ok(None);
    }
    Ok(Some(store.delete(&ids)?))
}

/// Print every record grouped by source.
pub fn format_all(groups: &[(String, Vec<ChunkRecord>)]) {
    if groups.is_empty() {
        println!("Store is empty. No documents found.");
        return;
    }

    let total_chunks: usize = groups.iter().map(|(_, records)| records.len()).sum();
    println!("Store contents ({} files, {total_chunks} chunks)", groups.len());

    for (source, records) in groups {
        println!("\nSource: {source}");
        println!("  Chunks: {}", records.len());
        for record in records {
            println!(
                "  [{}/{}] {} | {}",
                record.metadata.chunk_index + 1,
                record.metadata.total_chunks,
                record.id,
                crate::search::preview(&record.text, LIST_PREVIEW_CHARS)
            );
        }
    }
}

/// Print the source list.
pub fn format_sources(sources: &[SourceSummary]) {
    if sources.is_empty() {
        println!("No documents found in store.");
        return;
    }

    println!("Source files ({}):", sources.len());
    for summary in sources {
        println!("  {} ({} chunks)", summary.source, summary.chunks);
    }
}

/// Print store statistics.
pub fn format_stats(stats: &StoreStats) {
    println!("Store statistics");
    println!("  Total chunks:     {}", stats.total_chunks);
    println!("  Unique files:     {}", stats.unique_sources);
    println!("  Total characters: {}", stats.total_chars);
    println!("  Avg chunk size:   {:.0} characters", stats.avg_chunk_size);
}
