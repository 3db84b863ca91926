//! Subcommand implementations.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use ragflow_chunking::{ChunkedBatch, ChunkingConfig, Document, segment};
use ragflow_listing::{FilterConfig, RepoListing, apply_filter, scan_directory, summarize};
use ragflow_pipeline::{
    CommitEvent, LocalFsFetcher, NodeId, Pipeline, PipelineConfig, StageOutput,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

use crate::{ChunkingArgs, FilterArgs};

const SOURCE: &str = "source";
const FILTER: &str = "filter";
const PARSE: &str = "parse";
const CHUNK: &str = "chunk";

/// Overlay command line flags on `base`.
pub(crate) fn chunking_config(base: ChunkingConfig, args: &ChunkingArgs) -> Result<ChunkingConfig> {
    let mut config = base;
    if let Some(strategy) = args.strategy {
        config.strategy = strategy;
    }
    if let Some(size) = args.size {
        config.chunk_size = size;
    }
    if let Some(overlap) = args.overlap {
        config.overlap = overlap;
    }
    config.validate()?;
    Ok(config)
}

/// Overlay command line flags on `base`. Flags replace, not extend.
pub(crate) fn filter_config(base: FilterConfig, args: &FilterArgs) -> FilterConfig {
    let mut config = base;
    if !args.folders.is_empty() {
        config.selected_folders = args.folders.clone();
    }
    if !args.extensions.is_empty() {
        config.extensions = args.extensions.clone();
    }
    if args.no_root_files {
        config.include_root_files = false;
    }
    config
}

/// Select every format class present when none was chosen.
///
/// Without extensions the filter keeps only folders, which gives the parse
/// stage nothing to read.
pub(crate) fn with_default_extensions(mut config: FilterConfig, listing: &RepoListing) -> FilterConfig {
    if config.extensions.is_empty() {
        config.extensions = summarize(listing).by_class.into_keys().collect();
    }
    config
}

pub(crate) fn chunk(
    file: &Path,
    args: &ChunkingArgs,
    smart_boundaries: bool,
    preserve_metadata: bool,
) -> Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let config = chunking_config(ChunkingConfig::default(), args)?
        .with_smart_boundaries(smart_boundaries)
        .with_preserve_metadata(preserve_metadata);

    let document = Document::new(file.display().to_string(), text);
    let chunks = segment(&document, &config)?;
    info!(
        "Segmented {} into {} chunks ({} strategy)",
        file.display(),
        chunks.len(),
        config.strategy
    );

    println!("{}", serde_json::to_string_pretty(&chunks)?);
    Ok(())
}

pub(crate) fn filter(listing: &Path, args: &FilterArgs) -> Result<()> {
    let json = std::fs::read_to_string(listing)
        .with_context(|| format!("failed to read {}", listing.display()))?;
    let listing = RepoListing::from_json(&json)?;
    let config = filter_config(FilterConfig::default(), args);

    let selection = apply_filter(&listing, &config);
    info!(
        "Kept {} of {} entries",
        selection.len(),
        listing.contents.len()
    );

    println!("{}", serde_json::to_string_pretty(&selection)?);
    Ok(())
}

pub(crate) async fn run(
    dir: &Path,
    config_path: Option<&Path>,
    filter_args: &FilterArgs,
    chunking_args: &ChunkingArgs,
    timeout_secs: u64,
) -> Result<()> {
    let base = match config_path {
        Some(path) => PipelineConfig::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let listing = scan_directory(dir)?;
    let filter = with_default_extensions(filter_config(base.filter.clone(), filter_args), &listing);
    let chunking = chunking_config(base.chunking.clone(), chunking_args)?;
    let config = PipelineConfig {
        debounce_ms: 0,
        trigger_stagger_ms: 0,
        ..base
    }
    .with_filter(filter)
    .with_chunking(chunking);

    let mut pipeline = Pipeline::new(config);
    let source = pipeline.add_source(SOURCE).await?;
    pipeline.add_filter(FILTER).await?;
    pipeline.add_parser(PARSE, LocalFsFetcher::new(dir)).await?;
    pipeline.add_chunker(CHUNK).await?;
    pipeline.connect(SOURCE, FILTER).await?;
    pipeline.connect(FILTER, PARSE).await?;
    pipeline.connect(PARSE, CHUNK).await?;

    let mut events = pipeline.store().subscribe();
    info!(
        "Running pipeline over {} ({} entries)",
        dir.display(),
        listing.contents.len()
    );
    source.commit_output(StageOutput::Listing(listing)).await?;

    let target = NodeId::from(CHUNK);
    let batch = tokio::time::timeout(
        Duration::from_secs(timeout_secs),
        wait_for_chunks(&pipeline, &mut events, &target),
    )
    .await
    .context("timed out waiting for the chunk stage")??;

    pipeline.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&batch)?);
    Ok(())
}

async fn wait_for_chunks(
    pipeline: &Pipeline,
    events: &mut broadcast::Receiver<CommitEvent>,
    target: &NodeId,
) -> Result<ChunkedBatch> {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!("Missed {skipped} commit events");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => bail!("pipeline stopped"),
        };

        if let Some(error) = &event.error {
            bail!("stage {} failed: {error}", event.node_id);
        }
        if event.node_id == *target {
            let output = pipeline
                .store()
                .output(target)
                .await
                .context("chunk output was invalidated")?;
            return match output.as_ref() {
                StageOutput::Chunks(batch) => Ok(batch.clone()),
                other => bail!("unexpected {} output from {target}", other.kind()),
            };
        }
        if event.empty {
            bail!("stage {} produced no output", event.node_id);
        }
    }
}
