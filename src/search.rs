//! Semantic search: embed the query, fetch the nearest chunks, aggregate
//! hits to unique source files.

use serde::Serialize;

use crate::{
    embedding::EmbeddingClient,
    error::Result,
    store::VectorStore,
};

/// Number of characters shown in a result preview.
pub const PREVIEW_CHARS: usize = 200;

/// Default number of chunk matches to retrieve.
pub const DEFAULT_TOP_K: usize = 5;

/// One ranked chunk match.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub rank: usize,
    pub id: String,
    /// Store-defined distance; smaller is closer.
    pub distance: f32,
    pub source: String,
    pub chunk_index: usize,
    /// Single-line preview of the chunk text, truncated to
    /// [`PREVIEW_CHARS`] characters. Display-only; the stored text is
    /// untouched.
    pub preview: String,
}

/// The outcome of a search: ranked chunk matches plus the unique source
/// files they came from, in first-seen (best-match) order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub sources: Vec<String>,
    pub results: Vec<SearchResult>,
}

impl SearchOutcome {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Embed `query` and return the `top_k` nearest chunks with their sources.
///
/// The query must be embedded by the same model that ingested the store;
/// vectors from different models are not comparable. An empty store yields
/// an empty outcome, not an error.
pub fn search(
    query: &str,
    top_k: usize,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingClient,
) -> Result<SearchOutcome> {
    let vector = embedder.embed_text(query)?;
    let matches = store.query(&vector, top_k)?;

    let mut sources = Vec::new();
    let mut results = Vec::with_capacity(matches.len());

    for (rank, m) in matches.into_iter().enumerate() {
        if !sources.contains(&m.metadata.source) {
            sources.push(m.metadata.source.clone());
        }
        results.push(SearchResult {
            rank: rank + 1,
            id: m.id,
            distance: m.distance,
            source: m.metadata.source,
            chunk_index: m.metadata.chunk_index,
            preview: preview(&m.text, PREVIEW_CHARS),
        });
    }

    Ok(SearchOutcome {
        query: query.to_string(),
        sources,
        results,
    })
}

/// Collapse whitespace runs to single spaces and truncate to `max_chars`
/// characters, appending an ellipsis when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let truncated: String = flat.chars().take(max_chars).collect();
    format!("{truncated}...")
}

/// Format an outcome for human-readable terminal output.
pub fn format_human(outcome: &SearchOutcome) {
    if outcome.is_empty() {
        println!("No results found.");
        return;
    }

    for r in &outcome.results {
        println!(
            "{:>3}. [{:.4}] {} (chunk {})",
            r.rank, r.distance, r.source, r.chunk_index
        );
        println!("     {}", r.preview);
    }

    println!("\nSources ({}):", outcome.sources.len());
    for source in &outcome.sources {
        println!("  {source}");
    }
}

/// Format an outcome as JSON on stdout.
pub fn format_json(outcome: &SearchOutcome) -> Result<()> {
    let json = serde_json::to_string_pretty(outcome)
        .map_err(|e| crate::error::Error::Config(format!("cannot encode results: {e}")))?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunk_db::ChunkDb,
        store::{ChunkMetadata, ChunkRecord},
    };

    struct AxisEmbedder;

    impl EmbeddingClient for AxisEmbedder {
        fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            // "x"-heavy text maps near the x axis, anything else near y.
            if text.contains('x') {
                Ok(vec![1.0, 0.1])
            } else {
                Ok(vec![0.1, 1.0])
            }
        }
    }

    fn record(id: &str, vector: Vec<f32>, source: &str, index: usize, text: &str) -> ChunkRecord {
        ChunkRecord {
            id: id.to_string(),
            vector,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.to_string(),
                chunk_index: index,
                total_chunks: 2,
            },
        }
    }

    fn seeded_store() -> (tempfile::TempDir, ChunkDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ChunkDb::open(&tmp.path().join("chunks.redb")).unwrap();
        db.add(&[
            record("x:0", vec![1.0, 0.0], "/docs/x.txt", 0, "x marks the spot"),
            record("x:1", vec![0.9, 0.1], "/docs/x.txt", 1, "more x content"),
            record("y:0", vec![0.0, 1.0], "/docs/y.txt", 0, "yellow submarine"),
        ])
        .unwrap();
        (tmp, db)
    }

    #[test]
    fn aggregates_unique_sources_in_rank_order() {
        let (_tmp, db) = seeded_store();
        let outcome = search("xxx", 3, &db, &AxisEmbedder).unwrap();

        assert_eq!(outcome.results.len(), 3);
        // Two chunks from x.txt rank first; the source list dedups them.
        assert_eq!(outcome.sources, vec!["/docs/x.txt", "/docs/y.txt"]);
        assert_eq!(outcome.results[0].source, "/docs/x.txt");
        assert_eq!(outcome.results[0].rank, 1);
        assert_eq!(outcome.results[2].rank, 3);
    }

    #[test]
    fn top_k_limits_matches() {
        let (_tmp, db) = seeded_store();
        let outcome = search("xxx", 1, &db, &AxisEmbedder).unwrap();
        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.sources.len(), 1);
    }

    #[test]
    fn empty_store_is_empty_outcome_not_error() {
        let tmp = tempfile::tempdir().unwrap();
        let db = ChunkDb::open(&tmp.path().join("chunks.redb")).unwrap();

        let outcome = search("anything", 5, &db, &AxisEmbedder).unwrap();
        assert!(outcome.is_empty());
        assert!(outcome.sources.is_empty());
    }

    #[test]
    fn preview_collapses_newlines() {
        assert_eq!(preview("line one\nline two\n\n\tthree", 200), "line one line two three");
    }

    #[test]
    fn preview_truncates_by_chars() {
        let text = "a".repeat(300);
        let p = preview(&text, 200);
        assert_eq!(p.chars().count(), 203); // 200 + "..."
        assert!(p.ends_with("..."));

        // Multi-byte safe.
        let emoji = "🎉".repeat(300);
        let p = preview(&emoji, 200);
        assert!(p.ends_with("..."));
    }

    #[test]
    fn preview_short_text_untouched() {
        assert_eq!(preview("short", 200), "short");
    }

    #[test]
    fn results_serialize_to_json() {
        let (_tmp, db) = seeded_store();
        let outcome = search("xxx", 2, &db, &AxisEmbedder).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["query"], "xxx");
        assert_eq!(json["results"].as_array().unwrap().len(), 2);
    }
}
