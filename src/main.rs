use std::io::Write;
use std::path::Path;

use clap::Parser;
use kdam::{BarExt, tqdm};
use tracing_subscriber::EnvFilter;

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

use chunk_db::ChunkDb;
use chunking::ChunkingConfig;
use cli::{Cli, Command, DbAction, DeleteArgs, SearchArgs};
use data_dir::DataDir;
use embedding::OllamaEmbedder;
use extract::ExtractorRegistry;
use ingestion::{IngestMode, IngestReport, Ingestor};

fn init_tracing(verbose: u8, quiet: bool) {
    let filter = if let Ok(env) = std::env::var("CARPET_LOG") {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let data_dir = DataDir::resolve(cli.data_dir.as_deref())?;

    match cli.command {
        Command::Embed(args) => {
            let store = ChunkDb::open(&data_dir.chunks_db())?;
            let embedder = OllamaEmbedder::new();
            let extractors = ExtractorRegistry::with_defaults();
            let config = ChunkingConfig {
                chunk_size: args.chunk_size,
                overlap: args.overlap,
            };
            let mode = if args.atomic {
                IngestMode::Atomic
            } else {
                IngestMode::BestEffort
            };
            let ingestor = Ingestor::new(&store, &embedder, &extractors, config, mode)?;

            let files = walker::discover_files(&args.path)?;
            println!("Found {} files to embed.", files.len());

            let mut report = IngestReport {
                files: files.len(),
                ..IngestReport::default()
            };
            let mut bar = tqdm!(total = files.len(), desc = "embedding");
            for file in &files {
                ingestor.ingest_into_report(file, &mut report);
                let _ = bar.update(1);
            }
            eprintln!();

            println!(
                "Embedded {} files ({} chunks); {} already present, {} unsupported, {} failed.",
                report.ingested_files,
                report.ingested_chunks,
                report.skipped_existing,
                report.skipped_unsupported,
                report.failed_files
            );
            if report.failed_chunks > 0 {
                println!("{} chunks failed and were skipped.", report.failed_chunks);
            }
        }
        Command::Search(args) => report_failure("search", search_cmd(&data_dir, &args)),
        Command::Db { action } => report_failure("db", db_cmd(&data_dir, action)),
        Command::Delete(args) => report_failure("delete", delete_cmd(&data_dir, &args)),
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

/// Read-side and admin command failures are reported with a message and the
/// process exits cleanly; they never escape as an unhandled error.
fn report_failure(command: &str, result: error::Result<()>) {
    if let Err(err) = result {
        tracing::error!("{command} failed: {err}");
        println!("{command} failed: {err}");
    }
}

fn search_cmd(data_dir: &DataDir, args: &SearchArgs) -> error::Result<()> {
    let store = ChunkDb::open(&data_dir.chunks_db())?;
    let embedder = OllamaEmbedder::new();

    let outcome = search::search(&args.query_text(), args.count, &store, &embedder)?;
    if args.json {
        search::format_json(&outcome)?;
    } else {
        search::format_human(&outcome);
    }
    Ok(())
}

fn db_cmd(data_dir: &DataDir, action: Option<DbAction>) -> error::Result<()> {
    let store = ChunkDb::open(&data_dir.chunks_db())?;
    match action {
        None => {
            let groups = inventory::list_all(&store)?;
            inventory::format_all(&groups);
        }
        Some(DbAction::Sources) => {
            let sources = inventory::list_sources(&store)?;
            inventory::format_sources(&sources);
        }
        Some(DbAction::Stats) => {
            let stats = inventory::stats(&store)?;
            inventory::format_stats(&stats);
        }
        Some(DbAction::Clear { yes }) => {
            if !yes && !confirm_clear()? {
                println!("Cancelled.");
                return Ok(());
            }
            let deleted = inventory::clear_all(&store)?;
            if deleted == 0 {
                println!("Store is already empty.");
            } else {
                println!("Deleted {deleted} chunks.");
            }
        }
    }
    Ok(())
}

fn delete_cmd(data_dir: &DataDir, args: &DeleteArgs) -> error::Result<()> {
    let store = ChunkDb::open(&data_dir.chunks_db())?;
    let source = resolve_delete_source(&args.filepath);
    match inventory::delete_by_file(&store, &source)? {
        None => println!("File not found in store: {source}"),
        Some(count) => println!("Deleted {count} chunks for {source}"),
    }
    Ok(())
}

/// Ingestion stores canonical absolute paths, so the delete argument is
/// resolved the same way while the file still exists on disk. Files already
/// gone from disk can only be matched by the raw string.
fn resolve_delete_source(path: &Path) -> String {
    path.canonicalize()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|_| path.to_string_lossy().to_string())
}

/// Interactive yes/no gate in front of `db clear`.
fn confirm_clear() -> error::Result<bool> {
    print!("This will delete every chunk in the store. Are you sure? (yes/no): ");
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}
