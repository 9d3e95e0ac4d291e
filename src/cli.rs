use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use crate::chunking::{DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE};
use crate::search::DEFAULT_TOP_K;

#[derive(Debug, Parser)]
#[command(name = "carpet", about = "Embed your files, search them by meaning")]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Embed a folder tree into the vector store
    Embed(EmbedArgs),
    /// Search stored chunks by meaning
    Search(SearchArgs),
    /// Inspect the vector store
    Db {
        #[command(subcommand)]
        action: Option<DbAction>,
    },
    /// Remove a file's chunks from the store
    Delete(DeleteArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Embed --

#[derive(Debug, Parser)]
pub struct EmbedArgs {
    /// Directory to ingest recursively
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Chunk size in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    pub chunk_size: usize,

    /// Overlap between adjacent chunks in characters
    #[arg(long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    pub overlap: usize,

    /// Write each file's chunks all-or-nothing instead of best-effort
    #[arg(long)]
    pub atomic: bool,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub query: Vec<String>,

    /// Number of chunk matches to retrieve
    #[arg(short = 'n', long, default_value_t = DEFAULT_TOP_K)]
    pub count: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn query_text(&self) -> String {
        self.query.join(" ")
    }
}

// -- Db --

#[derive(Debug, Subcommand)]
pub enum DbAction {
    /// List source files with chunk counts
    Sources,
    /// Show chunk/source/character statistics
    Stats,
    /// Delete every record in the store
    Clear {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

// -- Delete --

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    /// Source file path whose chunks should be removed
    pub filepath: PathBuf,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(self.shell, &mut cmd, "carpet", &mut std::io::stdout());
    }
}
