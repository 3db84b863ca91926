//! `ragflow` command line.
//!
//! Chunks single files, filters listings, and runs the full
//! source -> filter -> parse -> chunk graph over a local directory.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ragflow_chunking::ChunkingStrategy;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

#[derive(Parser)]
#[command(name = "ragflow")]
#[command(version, about = "Document ingestion pipeline for retrieval", long_about = None)]
struct Cli {
    /// Log filter, e.g. `debug` or `ragflow_pipeline=trace` (overrides RUST_LOG)
    #[arg(long, global = true, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment one file and print its chunks as JSON
    Chunk {
        /// File to segment
        file: PathBuf,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Pull window ends back to whitespace (fixed strategy)
        #[arg(long)]
        smart_boundaries: bool,

        /// Do not copy file metadata into chunks
        #[arg(long)]
        no_metadata: bool,
    },

    /// Apply the folder and format filter to a listing JSON file
    Filter {
        /// Listing file (`{ contents, owner, repo, platform }`)
        listing: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Run the pipeline over a local directory and print the chunk batch
    Run {
        /// Directory to ingest
        dir: PathBuf,

        /// Pipeline configuration file (TOML)
        #[arg(short, long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        chunking: ChunkingArgs,

        /// Seconds to wait for the chunk stage
        #[arg(long, default_value_t = 60)]
        timeout: u64,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct ChunkingArgs {
    /// Chunking strategy (fixed, recursive, semantic, code, domain)
    #[arg(long)]
    pub strategy: Option<ChunkingStrategy>,

    /// Maximum chunk size in characters
    #[arg(long)]
    pub size: Option<usize>,

    /// Characters shared between consecutive chunks
    #[arg(long)]
    pub overlap: Option<usize>,
}

#[derive(Args, Debug, Clone, Default)]
pub(crate) struct FilterArgs {
    /// Folder to select (repeatable)
    #[arg(long = "folder", value_name = "FOLDER")]
    pub folders: Vec<String>,

    /// Format class to select, e.g. `rs` or `readme` (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Drop root-level files when no folder is selected
    #[arg(long)]
    pub no_root_files: bool,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Chunk {
            file,
            chunking,
            smart_boundaries,
            no_metadata,
        } => commands::chunk(&file, &chunking, smart_boundaries, !no_metadata),
        Commands::Filter { listing, filter } => commands::filter(&listing, &filter),
        Commands::Run {
            dir,
            config,
            filter,
            chunking,
            timeout,
        } => commands::run(&dir, config.as_deref(), &filter, &chunking, timeout).await,
    }
}
