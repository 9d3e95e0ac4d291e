//! The ingestion pipeline: extract, chunk, embed, store.
//!
//! One file at a time, one chunk at a time, in order. Re-ingesting a file
//! that is already in the store is a detected no-op, so pointing `carpet
//! embed` at the same tree twice does not duplicate anything.

use std::path::Path;

use crate::{
    chunking::{ChunkingConfig, chunk_text},
    embedding::EmbeddingClient,
    error::{Error, Result},
    extract::ExtractorRegistry,
    source_id::SourceId,
    store::{ChunkMetadata, ChunkRecord, VectorStore, source_present},
    walker,
};

/// Failure policy for the chunks of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IngestMode {
    /// Write each chunk as it is embedded; a failing chunk is logged and
    /// skipped, the rest of the file continues, and nothing is rolled back.
    #[default]
    BestEffort,
    /// Embed every chunk into a staging buffer first and write them in one
    /// batched add; any failure leaves the store untouched for this file.
    Atomic,
}

/// What happened to one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Chunks were embedded and stored. `failed` counts chunks dropped under
    /// [`IngestMode::BestEffort`]; it is always 0 under atomic mode.
    Ingested { chunks: usize, failed: usize },
    /// The file's chunks are already in the store; nothing was written.
    SkippedExisting,
    /// No extractor handles this file's extension.
    SkippedUnsupported,
}

/// Summary of a folder ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub files: usize,
    pub ingested_files: usize,
    pub ingested_chunks: usize,
    pub skipped_existing: usize,
    pub skipped_unsupported: usize,
    pub failed_files: usize,
    pub failed_chunks: usize,
}

/// The ingestion pipeline, assembled from its collaborators.
///
/// All dependencies are injected; the pipeline holds no global state and its
/// lifecycle is owned by the caller.
pub struct Ingestor<'a> {
    store: &'a dyn VectorStore,
    embedder: &'a dyn EmbeddingClient,
    extractors: &'a ExtractorRegistry,
    config: ChunkingConfig,
    mode: IngestMode,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a dyn VectorStore,
        embedder: &'a dyn EmbeddingClient,
        extractors: &'a ExtractorRegistry,
        config: ChunkingConfig,
        mode: IngestMode,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            embedder,
            extractors,
            config,
            mode,
        })
    }

    /// Ingest a single file.
    ///
    /// The dedup check runs first: if any stored chunk's `metadata.source`
    /// equals this file's path, the file is skipped entirely. A store
    /// failure during that check aborts the file instead of risking a
    /// duplicate ingestion.
    pub fn embed_file(&self, path: &Path) -> Result<IngestOutcome> {
        let abs = path
            .canonicalize()
            .map_err(|_| Error::NotFound(path.to_path_buf()))?;
        let source = abs.to_string_lossy().to_string();

        if source_present(self.store, &source)? {
            tracing::info!(source = %source, "already embedded, skipping");
            return Ok(IngestOutcome::SkippedExisting);
        }

        let Some(extractor) = self.extractors.get_for_file(&abs) else {
            tracing::warn!(source = %source, "unsupported file type, skipping");
            return Ok(IngestOutcome::SkippedUnsupported);
        };

        let text = extractor.extract(&abs)?;
        let chunks = chunk_text(&text, self.config.chunk_size, self.config.overlap);
        if chunks.is_empty() {
            tracing::info!(source = %source, "no text content, nothing to embed");
            return Ok(IngestOutcome::Ingested {
                chunks: 0,
                failed: 0,
            });
        }

        let source_id = SourceId::new(&source);
        let total_chunks = chunks.len();
        let make_record = |index: usize, text: &str, vector: Vec<f32>| ChunkRecord {
            id: source_id.chunk_id(index),
            vector,
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: source.clone(),
                chunk_index: index,
                total_chunks,
            },
        };

        match self.mode {
            IngestMode::BestEffort => {
                let mut stored = 0;
                let mut failed = 0;
                for chunk in &chunks {
                    let result = self
                        .embedder
                        .embed_text(&chunk.text)
                        .and_then(|vector| {
                            self.store
                                .add(&[make_record(chunk.index, &chunk.text, vector)])
                        });
                    match result {
                        Ok(()) => stored += 1,
                        Err(err) => {
                            tracing::warn!(
                                source = %source,
                                chunk = chunk.index,
                                "chunk failed, continuing: {err}"
                            );
                            failed += 1;
                        }
                    }
                }
                tracing::info!(source = %source, chunks = stored, failed, "embedded file");
                Ok(IngestOutcome::Ingested {
                    chunks: stored,
                    failed,
                })
            }
            IngestMode::Atomic => {
                let mut staged = Vec::with_capacity(chunks.len());
                for chunk in &chunks {
                    let vector = self.embedder.embed_text(&chunk.text)?;
                    staged.push(make_record(chunk.index, &chunk.text, vector));
                }
                self.store.add(&staged)?;
                tracing::info!(source = %source, chunks = staged.len(), "embedded file");
                Ok(IngestOutcome::Ingested {
                    chunks: staged.len(),
                    failed: 0,
                })
            }
        }
    }

    /// Ingest a directory tree.
    ///
    /// All file paths are collected up front, then each is ingested
    /// sequentially. A failing file is logged and counted; it never aborts
    /// the rest of the run.
    pub fn embed_folder(&self, root: &Path) -> Result<IngestReport> {
        let files = walker::discover_files(root)?;
        let mut report = IngestReport {
            files: files.len(),
            ..IngestReport::default()
        };

        for file in &files {
            self.ingest_into_report(file, &mut report);
        }

        Ok(report)
    }

    /// Ingest one file and fold the outcome into a report. Used by
    /// [`Ingestor::embed_folder`] and by callers that drive the file loop
    /// themselves (e.g. to show progress).
    pub fn ingest_into_report(&self, file: &Path, report: &mut IngestReport) {
        match self.embed_file(file) {
            Ok(IngestOutcome::Ingested { chunks, failed }) => {
                report.ingested_files += 1;
                report.ingested_chunks += chunks;
                report.failed_chunks += failed;
            }
            Ok(IngestOutcome::SkippedExisting) => report.skipped_existing += 1,
            Ok(IngestOutcome::SkippedUnsupported) => report.skipped_unsupported += 1,
            Err(err) => {
                tracing::warn!(file = %file.display(), "ingestion failed: {err}");
                report.failed_files += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::chunk_db::ChunkDb;

    /// Deterministic embedder: a tiny vector derived from the text's bytes.
    struct StubEmbedder;

    impl EmbeddingClient for StubEmbedder {
        fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            let sum: u32 = text.bytes().map(u32::from).sum();
            Ok(vec![
                (sum % 97) as f32,
                text.len() as f32,
                1.0,
            ])
        }
    }

    /// Fails every `n`th call.
    struct FlakyEmbedder {
        calls: AtomicUsize,
        fail_every: usize,
    }

    impl EmbeddingClient for FlakyEmbedder {
        fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if (call + 1) % self.fail_every == 0 {
                return Err(Error::Embedding("stub outage".into()));
            }
            StubEmbedder.embed_text(text)
        }
    }

    fn test_store() -> (tempfile::TempDir, ChunkDb) {
        let tmp = tempfile::tempdir().unwrap();
        let db = ChunkDb::open(&tmp.path().join("chunks.redb")).unwrap();
        (tmp, db)
    }

    fn ingestor<'a>(
        store: &'a dyn VectorStore,
        embedder: &'a dyn EmbeddingClient,
        extractors: &'a ExtractorRegistry,
        mode: IngestMode,
    ) -> Ingestor<'a> {
        Ingestor::new(store, embedder, extractors, ChunkingConfig::default(), mode)
            .unwrap()
    }

    #[test]
    fn embeds_file_with_metadata() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let path = docs.path().join("essay.txt");
        std::fs::write(&path, "sentence ".repeat(200)).unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        let outcome = ing.embed_file(&path).unwrap();
        let IngestOutcome::Ingested { chunks, failed } = outcome else {
            panic!("expected ingestion");
        };
        assert!(chunks > 1);
        assert_eq!(failed, 0);

        let all = db.get_all().unwrap();
        assert_eq!(all.len(), chunks);

        let canonical = path.canonicalize().unwrap().to_string_lossy().to_string();
        let mut indices: Vec<usize> =
            all.iter().map(|r| r.metadata.chunk_index).collect();
        indices.sort_unstable();
        for (expected, actual) in indices.iter().enumerate() {
            assert_eq!(expected, *actual, "chunk indices must be contiguous");
        }
        for record in &all {
            assert_eq!(record.metadata.source, canonical);
            assert_eq!(record.metadata.total_chunks, chunks);
        }
    }

    #[test]
    fn second_ingestion_is_a_noop() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let path = docs.path().join("note.txt");
        std::fs::write(&path, "some interesting note text").unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        ing.embed_file(&path).unwrap();
        let before = db.get_all().unwrap();

        let outcome = ing.embed_file(&path).unwrap();
        assert_eq!(outcome, IngestOutcome::SkippedExisting);
        assert_eq!(db.get_all().unwrap(), before);
    }

    #[test]
    fn dedup_does_not_match_path_prefixes() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let a = docs.path().join("b.txt");
        let b = docs.path().join("b.txt.bak.txt");
        std::fs::write(&a, "original file").unwrap();
        std::fs::write(&b, "backup file").unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        ing.embed_file(&a).unwrap();
        // The backup's path contains the original's path as a prefix; it
        // must still be ingested as its own file.
        let outcome = ing.embed_file(&b).unwrap();
        assert!(matches!(outcome, IngestOutcome::Ingested { .. }));

        let sources: std::collections::HashSet<String> = db
            .get_all()
            .unwrap()
            .into_iter()
            .map(|r| r.metadata.source)
            .collect();
        assert_eq!(sources.len(), 2);
    }

    #[test]
    fn unsupported_extension_skipped_not_fatal() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let path = docs.path().join("image.png");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        assert_eq!(
            ing.embed_file(&path).unwrap(),
            IngestOutcome::SkippedUnsupported
        );
        assert!(db.get_all().unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_not_found() {
        let (_tmp, db) = test_store();
        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        match ing.embed_file(Path::new("/no/such/file.txt")) {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected not-found, got {other:?}"),
        }
    }

    #[test]
    fn best_effort_keeps_going_past_chunk_failures() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let path = docs.path().join("long.txt");
        std::fs::write(&path, "word ".repeat(600)).unwrap(); // several chunks

        let registry = ExtractorRegistry::with_defaults();
        let flaky = FlakyEmbedder {
            calls: AtomicUsize::new(0),
            fail_every: 2,
        };
        let ing = ingestor(&db, &flaky, &registry, IngestMode::BestEffort);

        let IngestOutcome::Ingested { chunks, failed } =
            ing.embed_file(&path).unwrap()
        else {
            panic!("expected ingestion");
        };
        assert!(chunks > 0, "surviving chunks should be stored");
        assert!(failed > 0, "failures should be counted");
        assert_eq!(db.get_all().unwrap().len(), chunks);
    }

    #[test]
    fn atomic_mode_stores_nothing_on_failure() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        let path = docs.path().join("long.txt");
        std::fs::write(&path, "word ".repeat(600)).unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let flaky = FlakyEmbedder {
            calls: AtomicUsize::new(0),
            fail_every: 2,
        };
        let ing = ingestor(&db, &flaky, &registry, IngestMode::Atomic);

        assert!(ing.embed_file(&path).is_err());
        assert!(db.get_all().unwrap().is_empty());
    }

    #[test]
    fn folder_ingestion_walks_and_reports() {
        let (_tmp, db) = test_store();
        let docs = tempfile::tempdir().unwrap();
        std::fs::write(docs.path().join("a.txt"), "alpha text").unwrap();
        let sub = docs.path().join("nested");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.md"), "# beta text").unwrap();
        std::fs::write(docs.path().join("c.png"), [1u8, 2]).unwrap();

        let registry = ExtractorRegistry::with_defaults();
        let ing = ingestor(&db, &StubEmbedder, &registry, IngestMode::BestEffort);

        let report = ing.embed_folder(docs.path()).unwrap();
        assert_eq!(report.files, 3);
        assert_eq!(report.ingested_files, 2);
        assert_eq!(report.skipped_unsupported, 1);
        assert_eq!(report.failed_files, 0);

        // Re-running skips everything already ingested.
        let report = ing.embed_folder(docs.path()).unwrap();
        assert_eq!(report.ingested_files, 0);
        assert_eq!(report.skipped_existing, 2);
    }

    #[test]
    fn invalid_chunking_config_rejected_up_front() {
        let (_tmp, db) = test_store();
        let registry = ExtractorRegistry::with_defaults();
        let config = ChunkingConfig {
            chunk_size: 100,
            overlap: 100,
        };
        assert!(
            Ingestor::new(&db, &StubEmbedder, &registry, config, IngestMode::BestEffort)
                .is_err()
        );
    }
}
