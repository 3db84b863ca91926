use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use ragflow_chunking::{ChunkKind, ChunkingConfig, ChunkingStrategy};
use ragflow_listing::{FilterConfig, ListingEntry, RepoListing, apply_filter};
use ragflow_pipeline::{
    CommitEvent, Delivery, InMemoryFetcher, NodeId, NodeStatus, OutputKind, Pipeline,
    PipelineConfig, PipelineError, ProcessingState, Stage, StageConfig, StageFailure, StageInput,
    StageKind, StageOutput, Trigger, WaitReason,
};
use tokio::sync::{Notify, broadcast};

fn example_listing() -> RepoListing {
    RepoListing::new("octo", "demo", "github").with_entries([
        ListingEntry::file("README.md", 40),
        ListingEntry::file("CHANGELOG.md", 10),
        ListingEntry::file("CONTRIBUTING.md", 10),
        ListingEntry::file("setup.py", 10),
        ListingEntry::file("manage.py", 10),
        ListingEntry::folder("src"),
        ListingEntry::file("src/app.js", 30),
        ListingEntry::file("src/util.js", 30),
        ListingEntry::file("src/api.js", 30),
        ListingEntry::file("src/view.js", 30),
    ])
}

fn fetcher() -> InMemoryFetcher {
    let mut fetcher = InMemoryFetcher::new();
    for name in ["app", "util", "api", "view"] {
        fetcher = fetcher.with_file(
            format!("src/{name}.js"),
            format!("function {name}() {{\n  return '{name}';\n}}\n"),
        );
    }
    fetcher
}

async fn next_commit(events: &mut broadcast::Receiver<CommitEvent>, node: &str) -> CommitEvent {
    let wait = async {
        loop {
            let event = events.recv().await.unwrap();
            if event.node_id.as_str() == node {
                return event;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(30), wait)
        .await
        .unwrap()
}

/// Filter stage that blocks until released.
struct GatedStage {
    calls: Arc<AtomicUsize>,
    gate: Arc<Notify>,
}

#[async_trait]
impl Stage for GatedStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn accepts(&self) -> &[OutputKind] {
        &[OutputKind::Listing]
    }

    async fn process(
        &self,
        input: StageInput,
        _config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.gate.notified().await;
        match input.payload.as_ref() {
            StageOutput::Listing(listing) => Ok(StageOutput::Selection(apply_filter(
                listing,
                &FilterConfig::new().with_extension("md"),
            ))),
            other => Err(StageFailure::new(format!("unexpected {}", other.kind()))),
        }
    }
}

struct FailingStage;

#[async_trait]
impl Stage for FailingStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn accepts(&self) -> &[OutputKind] {
        &[OutputKind::Listing]
    }

    async fn process(
        &self,
        _input: StageInput,
        _config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        Err(StageFailure::new("boom"))
    }
}

struct SourceStage;

#[async_trait]
impl Stage for SourceStage {
    fn kind(&self) -> StageKind {
        StageKind::Source
    }

    fn accepts(&self) -> &[OutputKind] {
        &[]
    }

    async fn process(
        &self,
        _input: StageInput,
        _config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        Err(StageFailure::new("unreachable"))
    }
}

#[tokio::test]
async fn listing_flows_through_to_chunks() {
    let config = PipelineConfig::immediate()
        .with_filter(FilterConfig::new().with_folder("src").with_extension("js"))
        .with_chunking(
            ChunkingConfig::new(ChunkingStrategy::Code)
                .with_chunk_size(200)
                .with_overlap(0),
        );
    let mut pipeline = Pipeline::new(config);
    let source = pipeline.add_source("source").await.unwrap();
    pipeline.add_filter("filter").await.unwrap();
    pipeline.add_parser("parse", fetcher()).await.unwrap();
    pipeline.add_chunker("chunk").await.unwrap();
    pipeline.connect("source", "filter").await.unwrap();
    pipeline.connect("filter", "parse").await.unwrap();
    pipeline.connect("parse", "chunk").await.unwrap();
    let mut events = pipeline.store().subscribe();

    source
        .commit_output(StageOutput::Listing(example_listing()))
        .await
        .unwrap();
    let event = next_commit(&mut events, "chunk").await;

    assert!(event.is_success());
    let output = pipeline.store().output(&"chunk".into()).await.unwrap();
    let StageOutput::Chunks(batch) = output.as_ref() else {
        panic!("expected chunks, got {}", output.kind());
    };
    let files: Vec<_> = batch
        .chunked_files
        .iter()
        .map(|f| f.original_file.path.as_str())
        .collect();
    assert_eq!(files, vec!["src/app.js", "src/util.js", "src/api.js", "src/view.js"]);
    assert_eq!(batch.total_chunks, 4);
    assert!(batch.chunks().all(|c| c.kind == ChunkKind::Declaration));

    let filter = pipeline.store().output(&"filter".into()).await.unwrap();
    let StageOutput::Selection(selection) = filter.as_ref() else {
        panic!("expected a selection");
    };
    assert_eq!(selection.len(), 4);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn configuration_change_reruns_the_stage() {
    let config = PipelineConfig::immediate().with_chunking(
        ChunkingConfig::new(ChunkingStrategy::Fixed)
            .with_chunk_size(1000)
            .with_overlap(0),
    );
    let mut pipeline = Pipeline::new(config);
    let source = pipeline.add_source("docs").await.unwrap();
    pipeline.add_chunker("chunk").await.unwrap();
    pipeline.connect("docs", "chunk").await.unwrap();
    let mut events = pipeline.store().subscribe();

    source
        .commit_output(StageOutput::Documents(vec![ragflow_chunking::Document::new(
            "notes.txt",
            "abcdefghijklmnopqrst",
        )]))
        .await
        .unwrap();
    next_commit(&mut events, "chunk").await;

    pipeline
        .store()
        .set_config(
            &"chunk".into(),
            StageConfig::Chunk(
                ChunkingConfig::new(ChunkingStrategy::Fixed)
                    .with_chunk_size(5)
                    .with_overlap(0),
            ),
        )
        .await
        .unwrap();
    let event = next_commit(&mut events, "chunk").await;

    assert_eq!(event.revision, 2);
    let node = pipeline.store().node(&"chunk".into()).await.unwrap();
    assert_eq!(node.config_revision, 1);
    let Some(StageOutput::Chunks(batch)) = node.output.as_deref() else {
        panic!("expected chunks");
    };
    assert_eq!(batch.total_chunks, 4);
}

#[tokio::test]
async fn trigger_while_processing_is_ignored() {
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Notify::new());
    let mut pipeline = Pipeline::new(PipelineConfig::immediate());
    let source = pipeline.add_source("src").await.unwrap();
    pipeline
        .add_stage(
            "gated",
            GatedStage {
                calls: calls.clone(),
                gate: gate.clone(),
            },
            StageConfig::None,
        )
        .await
        .unwrap();
    let mut sink = pipeline.add_sink("sink").await.unwrap();
    pipeline.connect("src", "gated").await.unwrap();
    pipeline.connect("gated", "sink").await.unwrap();
    let mut events = pipeline.store().subscribe();

    source
        .commit_output(StageOutput::Listing(example_listing()))
        .await
        .unwrap();
    while calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let gated = NodeId::from("gated");
    assert_eq!(
        pipeline.store().node(&gated).await.unwrap().state,
        ProcessingState::Processing
    );
    for _ in 0..2 {
        let delivery = pipeline.bus().publish(Trigger::new("src", "gated")).await;
        assert_eq!(delivery, Delivery::Delivered(1));
    }

    gate.notify_one();
    let event = next_commit(&mut events, "gated").await;
    assert_eq!(event.revision, 1);
    assert_eq!(sink.recv().await, Some(Trigger::new("gated", "sink")));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(sink.try_recv(), None);
    let node = pipeline.store().node(&gated).await.unwrap();
    assert_eq!(node.output_revision, 1);
    assert_eq!(node.status(), NodeStatus::Succeeded);
}

#[tokio::test]
async fn failed_stage_reports_error_and_stops_propagation() {
    let mut pipeline = Pipeline::new(PipelineConfig::immediate());
    let source = pipeline.add_source("src").await.unwrap();
    pipeline
        .add_stage("broken", FailingStage, StageConfig::None)
        .await
        .unwrap();
    let mut sink = pipeline.add_sink("sink").await.unwrap();
    pipeline.connect("src", "broken").await.unwrap();
    pipeline.connect("broken", "sink").await.unwrap();
    let mut events = pipeline.store().subscribe();

    source
        .commit_output(StageOutput::Listing(example_listing()))
        .await
        .unwrap();
    let event = next_commit(&mut events, "broken").await;

    assert_eq!(event.error.as_deref(), Some("boom"));
    let node = pipeline.store().node(&"broken".into()).await.unwrap();
    assert_eq!(node.status(), NodeStatus::Failed("boom".to_string()));
    assert!(node.output.is_none());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.try_recv(), None);
}

#[tokio::test]
async fn stage_without_input_is_waiting() {
    let mut pipeline = Pipeline::new(PipelineConfig::immediate());
    pipeline.add_filter("filter").await.unwrap();

    let filter = NodeId::from("filter");
    let mut status = NodeStatus::Idle;
    for _ in 0..100 {
        status = pipeline.store().node(&filter).await.unwrap().status();
        if status != NodeStatus::Idle {
            break;
        }
        tokio::task::yield_now().await;
    }

    assert_eq!(status, NodeStatus::Waiting(WaitReason::NoIncomingEdge));
}

#[tokio::test]
async fn source_kind_cannot_host_a_stage() {
    let mut pipeline = Pipeline::new(PipelineConfig::immediate());
    let err = pipeline
        .add_stage("src", SourceStage, StageConfig::None)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NotProcessable(_, StageKind::Source)));
    assert_eq!(pipeline.runner_count(), 0);
}

#[tokio::test]
async fn second_input_edge_is_rejected() {
    let mut pipeline = Pipeline::new(PipelineConfig::immediate());
    pipeline.add_source("a").await.unwrap();
    pipeline.add_source("b").await.unwrap();
    pipeline.add_filter("filter").await.unwrap();
    pipeline.connect("a", "filter").await.unwrap();

    let err = pipeline.connect("b", "filter").await.unwrap_err();
    assert!(matches!(err, PipelineError::MultipleInputs { .. }));

    pipeline.remove_node(&"filter".into()).await.unwrap();
    assert_eq!(pipeline.runner_count(), 0);
    assert!(pipeline.store().edges().await.is_empty());
}
