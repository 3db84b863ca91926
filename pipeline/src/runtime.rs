//! Pipeline assembly and lifecycle.

use std::sync::Arc;

use indexmap::IndexMap;
use tokio::task::JoinHandle;
use tracing::info;

use crate::bus::{Trigger, TriggerBus, TriggerListener};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::graph::{GraphStore, OutputWriter};
use crate::ids::{EdgeId, NodeId};
use crate::node::{Edge, Node, StageKind};
use crate::payload::StageConfig;
use crate::runner::StageRunner;
use crate::stages::{ChunkStage, ContentFetcher, FilterStage, ParseStage, Stage};

/// A graph of stages with one runner task per processing node.
///
/// Runner tasks are aborted when the pipeline is shut down or dropped.
pub struct Pipeline {
    store: GraphStore,
    config: PipelineConfig,
    runners: IndexMap<NodeId, JoinHandle<()>>,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new(config: PipelineConfig) -> Self {
        let store = GraphStore::with_bus(TriggerBus::new(), config.store_options());
        Self {
            store,
            config,
            runners: IndexMap::new(),
        }
    }

    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    pub fn bus(&self) -> &TriggerBus {
        self.store.bus()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Add a source node. The caller commits its output through the
    /// returned writer.
    pub async fn add_source(&self, id: impl Into<NodeId>) -> Result<OutputWriter> {
        let id = id.into();
        self.store
            .add_node(id.clone(), StageKind::Source, StageConfig::None)
            .await?;
        self.store.writer(&id).await
    }

    /// Add a sink node and listen for its triggers.
    pub async fn add_sink(&self, id: impl Into<NodeId>) -> Result<TriggerListener> {
        let id = id.into();
        self.store
            .add_node(id.clone(), StageKind::Sink, StageConfig::None)
            .await?;
        Ok(self.bus().register(id).await)
    }

    /// Add a processing node and mount a runner for `stage` on it.
    pub async fn add_stage(
        &mut self,
        id: impl Into<NodeId>,
        stage: impl Stage + 'static,
        config: StageConfig,
    ) -> Result<()> {
        let id = id.into();
        let kind = stage.kind();
        if !kind.is_processing() {
            return Err(PipelineError::NotProcessable(id, kind));
        }

        self.store.add_node(id.clone(), kind, config).await?;
        let writer = self.store.writer(&id).await?;
        let listener = self.bus().register(id.clone()).await;
        let runner = StageRunner::new(
            self.store.clone(),
            Arc::new(stage),
            writer,
            listener,
            self.config.discovery_poll(),
        );

        self.runners.insert(id, runner.spawn());
        Ok(())
    }

    /// Add a filter stage configured from the pipeline configuration.
    pub async fn add_filter(&mut self, id: impl Into<NodeId>) -> Result<()> {
        let config = StageConfig::Filter(self.config.filter.clone());
        self.add_stage(id, FilterStage, config).await
    }

    /// Add a parse stage reading through `fetcher`.
    pub async fn add_parser(
        &mut self,
        id: impl Into<NodeId>,
        fetcher: impl ContentFetcher + 'static,
    ) -> Result<()> {
        self.add_stage(id, ParseStage::new(fetcher), StageConfig::None)
            .await
    }

    /// Add a chunk stage configured from the pipeline configuration.
    pub async fn add_chunker(&mut self, id: impl Into<NodeId>) -> Result<()> {
        let config = StageConfig::Chunk(self.config.chunking.clone());
        self.add_stage(id, ChunkStage::new(), config).await
    }

    /// Connect `source` to `target`.
    pub async fn connect(
        &self,
        source: impl Into<NodeId>,
        target: impl Into<NodeId>,
    ) -> Result<EdgeId> {
        let edge = Edge::new(source, target);
        let target = edge.target.clone();
        let id = self.store.add_edge(edge).await?;

        // A runner on the target may be waiting for an incoming edge.
        let processing = self
            .store
            .node(&target)
            .await
            .is_some_and(|node| node.kind.is_processing());
        if processing {
            self.bus().publish(Trigger::new(&target, &target)).await;
        }
        Ok(id)
    }

    /// Remove a node and stop its runner.
    pub async fn remove_node(&mut self, id: &NodeId) -> Result<Node> {
        if let Some(runner) = self.runners.shift_remove(id) {
            runner.abort();
        }
        self.store.remove_node(id).await
    }

    /// Number of mounted runners.
    pub fn runner_count(&self) -> usize {
        self.runners.len()
    }

    /// Stop every runner and land pending commits.
    pub async fn shutdown(mut self) {
        for (_, runner) in self.runners.drain(..) {
            runner.abort();
        }
        self.store.flush().await;
        info!("Pipeline shut down");
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        for runner in self.runners.values() {
            runner.abort();
        }
    }
}
