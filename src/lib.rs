//! carpet - embed your files, search them by meaning.
//!
//! carpet walks a folder tree, splits each supported document (plain text,
//! markdown, PDF) into overlapping character chunks, embeds every chunk via
//! a local [Ollama](https://ollama.ai) server, and stores the vectors in a
//! local [redb](https://github.com/cberner/redb) database. Stored chunks can
//! then be searched semantically and aggregated back to their source files.
//!
//! # Quick start
//!
//! ```no_run
//! use carpet::{ChunkDb, Ingestor, OllamaEmbedder};
//! use carpet::chunking::ChunkingConfig;
//! use carpet::extract::ExtractorRegistry;
//! use carpet::ingestion::IngestMode;
//!
//! let store = ChunkDb::open(std::path::Path::new("chunks.redb")).unwrap();
//! let embedder = OllamaEmbedder::new();
//! let extractors = ExtractorRegistry::with_defaults();
//!
//! let ingestor = Ingestor::new(
//!     &store,
//!     &embedder,
//!     &extractors,
//!     ChunkingConfig::default(),
//!     IngestMode::BestEffort,
//! )
//! .unwrap();
//! ingestor.embed_folder(std::path::Path::new("docs")).unwrap();
//!
//! let outcome = carpet::search::search("lifetimes", 5, &store, &embedder).unwrap();
//! for result in &outcome.results {
//!     println!("[{:.4}] {} :: {}", result.distance, result.source, result.preview);
//! }
//! ```

pub mod chunk_db;
pub mod chunking;
pub mod cli;
pub mod data_dir;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingestion;
pub mod inventory;
pub mod search;
pub mod source_id;
pub mod store;
pub mod walker;

pub use chunk_db::ChunkDb;
pub use data_dir::DataDir;
pub use embedding::{EmbeddingClient, OllamaEmbedder};
pub use error::{Error, Result};
pub use ingestion::Ingestor;
pub use source_id::SourceId;
pub use store::VectorStore;
