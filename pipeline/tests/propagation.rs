use std::time::Duration;

use pretty_assertions::assert_eq;
use ragflow_listing::{ListingEntry, RepoListing};
use ragflow_pipeline::{Pipeline, PipelineConfig, StageOutput, Trigger};
use tokio::time::Instant;

fn listing() -> StageOutput {
    StageOutput::Listing(
        RepoListing::new("octo", "demo", "github").with_entries([ListingEntry::file("a.md", 1)]),
    )
}

#[tokio::test(start_paused = true)]
async fn fan_out_triggers_each_target_once_in_edge_order() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let source = pipeline.add_source("A").await.unwrap();
    let mut b = pipeline.add_sink("B").await.unwrap();
    let mut c = pipeline.add_sink("C").await.unwrap();
    pipeline.connect("A", "B").await.unwrap();
    pipeline.connect("A", "C").await.unwrap();

    let start = Instant::now();
    source.commit_output(listing()).await.unwrap();

    assert_eq!(b.recv().await, Some(Trigger::new("A", "B")));
    let at_b = start.elapsed();
    assert_eq!(c.try_recv(), None);

    assert_eq!(c.recv().await, Some(Trigger::new("A", "C")));
    let at_c = start.elapsed();

    assert!(at_b >= Duration::from_millis(300));
    assert!(at_c >= at_b + Duration::from_millis(500));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(b.try_recv(), None);
    assert_eq!(c.try_recv(), None);
}

#[tokio::test(start_paused = true)]
async fn burst_of_commits_propagates_once() {
    let pipeline = Pipeline::new(PipelineConfig::default());
    let source = pipeline.add_source("A").await.unwrap();
    let mut sink = pipeline.add_sink("B").await.unwrap();
    pipeline.connect("A", "B").await.unwrap();

    for _ in 0..5 {
        source.commit_output(listing()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    assert_eq!(sink.recv().await, Some(Trigger::new("A", "B")));
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(sink.try_recv(), None);

    let node = pipeline.store().node(&"A".into()).await.unwrap();
    assert_eq!(node.output_revision, 1);
}

#[tokio::test(start_paused = true)]
async fn failed_commit_does_not_propagate() {
    let pipeline = Pipeline::new(PipelineConfig::immediate());
    let source = pipeline.add_source("A").await.unwrap();
    let mut sink = pipeline.add_sink("B").await.unwrap();
    pipeline.connect("A", "B").await.unwrap();

    source.commit_failure("fetch failed").await.unwrap();
    tokio::time::sleep(Duration::from_secs(5)).await;

    assert_eq!(sink.try_recv(), None);
}

#[tokio::test]
async fn removed_listener_misses_triggers() {
    let pipeline = Pipeline::new(PipelineConfig::immediate());
    let source = pipeline.add_source("A").await.unwrap();
    let sink = pipeline.add_sink("B").await.unwrap();
    pipeline.connect("A", "B").await.unwrap();

    assert_eq!(pipeline.bus().listeners(&"B".into()).await, 1);
    drop(sink);
    source.commit_output(listing()).await.unwrap();

    assert_eq!(pipeline.bus().listeners(&"B".into()).await, 0);
    assert!(pipeline.bus().registered_nodes().await.is_empty());
}
