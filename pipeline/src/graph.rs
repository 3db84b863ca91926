//! Graph and output store.
//!
//! The store is the only shared mutable state of a pipeline. Every component
//! receives a [`GraphStore`] handle; clones share the same graph.
//!
//! Outputs are written through an [`OutputWriter`], at most one per node.
//! Commits are debounced per node: a commit replaces the pending one and
//! restarts the window, and only the last commit of a burst lands. A landed
//! successful commit is the only thing that schedules propagation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, warn};

use crate::bus::{Trigger, TriggerBus};
use crate::discovery::WaitReason;
use crate::error::{PipelineError, Result};
use crate::ids::{EdgeId, NodeId};
use crate::node::{Edge, Node, StageKind};
use crate::payload::{OutputKind, StageConfig, StageOutput};
use crate::propagation;
use crate::state::{ProcessingState, StageEvent, Transition};

/// Timing of commits and propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Window in which repeated commits to one node coalesce. Zero lands
    /// commits synchronously.
    pub debounce: Duration,

    /// Delay between successive downstream triggers of one commit.
    pub stagger: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(300),
            stagger: Duration::from_millis(500),
        }
    }
}

impl StoreOptions {
    /// No debounce, no stagger.
    pub fn immediate() -> Self {
        Self {
            debounce: Duration::ZERO,
            stagger: Duration::ZERO,
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_stagger(mut self, stagger: Duration) -> Self {
        self.stagger = stagger;
        self
    }
}

/// Broadcast to store subscribers whenever a commit lands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitEvent {
    pub node_id: NodeId,

    /// `output_revision` after the commit.
    pub revision: u64,

    /// Kind of the committed output (success only).
    pub output_kind: Option<OutputKind>,

    /// Whether the committed output is empty.
    pub empty: bool,

    /// Failure message (failure only).
    pub error: Option<String>,

    pub committed_at: DateTime<Utc>,
}

impl CommitEvent {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
enum Commit {
    Output(StageOutput),
    Failure(String),
}

#[derive(Debug)]
struct PendingCommit {
    generation: u64,
    commit: Commit,
}

#[derive(Debug)]
struct NodeEntry {
    node: Node,
    lease: Arc<AtomicBool>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: IndexMap<NodeId, NodeEntry>,
    edges: IndexMap<EdgeId, Edge>,
    pending: IndexMap<NodeId, PendingCommit>,
    generation: u64,
}

/// Commit that landed, with the follow-up work to do outside the lock.
struct Landed {
    event: CommitEvent,
    targets: Vec<NodeId>,
}

impl GraphState {
    fn owned_entry(&mut self, node_id: &NodeId, lease: &Arc<AtomicBool>) -> Result<&mut NodeEntry> {
        match self.nodes.get_mut(node_id) {
            Some(entry) if Arc::ptr_eq(&entry.lease, lease) => Ok(entry),
            _ => Err(PipelineError::NodeNotFound(node_id.clone())),
        }
    }

    fn outgoing_targets(&self, node_id: &NodeId) -> Vec<NodeId> {
        self.edges
            .values()
            .filter(|e| e.source == *node_id)
            .map(|e| e.target.clone())
            .collect()
    }

    fn land(&mut self, node_id: &NodeId, commit: Commit) -> Option<Landed> {
        let entry = self.nodes.get_mut(node_id)?;
        let node = &mut entry.node;
        node.output_revision += 1;
        node.waiting = None;

        let event = match commit {
            Commit::Output(output) => {
                let event = CommitEvent {
                    node_id: node_id.clone(),
                    revision: node.output_revision,
                    output_kind: Some(output.kind()),
                    empty: output.is_empty(),
                    error: None,
                    committed_at: Utc::now(),
                };
                node.output = Some(Arc::new(output));
                node.error = None;
                node.state = ProcessingState::Succeeded;
                event
            }
            Commit::Failure(message) => {
                node.output = None;
                node.error = Some(message.clone());
                node.state = ProcessingState::Failed;
                CommitEvent {
                    node_id: node_id.clone(),
                    revision: node.output_revision,
                    output_kind: None,
                    empty: true,
                    error: Some(message),
                    committed_at: Utc::now(),
                }
            }
        };

        let targets = if event.is_success() {
            self.outgoing_targets(node_id)
        } else {
            Vec::new()
        };
        Some(Landed { event, targets })
    }
}

/// Shared handle to the graph.
#[derive(Debug, Clone)]
pub struct GraphStore {
    state: Arc<RwLock<GraphState>>,
    events: broadcast::Sender<CommitEvent>,
    bus: TriggerBus,
    options: StoreOptions,
}

impl GraphStore {
    /// Create a store with its own trigger bus.
    pub fn new(options: StoreOptions) -> Self {
        Self::with_bus(TriggerBus::new(), options)
    }

    /// Create a store that propagates over `bus`.
    pub fn with_bus(bus: TriggerBus, options: StoreOptions) -> Self {
        let (events, _) = broadcast::channel(1000);
        Self {
            state: Arc::new(RwLock::new(GraphState::default())),
            events,
            bus,
            options,
        }
    }

    pub fn bus(&self) -> &TriggerBus {
        &self.bus
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Subscribe to landed commits.
    pub fn subscribe(&self) -> broadcast::Receiver<CommitEvent> {
        self.events.subscribe()
    }

    /// Add a node.
    pub async fn add_node(
        &self,
        id: impl Into<NodeId>,
        kind: StageKind,
        config: StageConfig,
    ) -> Result<()> {
        let id = id.into();
        let mut state = self.state.write().await;
        if state.nodes.contains_key(&id) {
            return Err(PipelineError::DuplicateNode(id));
        }

        info!("Adding {kind} node: {id}");
        state.nodes.insert(
            id.clone(),
            NodeEntry {
                node: Node::new(id, kind, config),
                lease: Arc::new(AtomicBool::new(false)),
            },
        );
        Ok(())
    }

    /// Remove a node with its edges and pending commit.
    ///
    /// A writer still held for the node can no longer commit.
    pub async fn remove_node(&self, id: &NodeId) -> Result<Node> {
        let mut state = self.state.write().await;
        let entry = state
            .nodes
            .shift_remove(id)
            .ok_or_else(|| PipelineError::NodeNotFound(id.clone()))?;

        state.edges.retain(|_, e| e.source != *id && e.target != *id);
        if state.pending.shift_remove(id).is_some() {
            debug!("Dropped pending commit of removed node {id}");
        }

        info!("Removed node: {id}");
        Ok(entry.node)
    }

    /// Connect two nodes.
    pub async fn add_edge(&self, edge: Edge) -> Result<EdgeId> {
        let mut state = self.state.write().await;

        if edge.source == edge.target {
            return Err(PipelineError::SelfLoop(edge.source));
        }
        for endpoint in [&edge.source, &edge.target] {
            if !state.nodes.contains_key(endpoint) {
                return Err(PipelineError::NodeNotFound(endpoint.clone()));
            }
        }
        if state.edges.contains_key(&edge.id) {
            return Err(PipelineError::Config(format!("edge id already in use: {}", edge.id)));
        }
        if let Some(existing) = state.edges.values().find(|e| e.target == edge.target) {
            if existing.source == edge.source {
                return Err(PipelineError::DuplicateEdge {
                    source_id: edge.source,
                    target_id: edge.target,
                });
            }
            return Err(PipelineError::MultipleInputs {
                target_id: edge.target,
                existing: existing.source.clone(),
            });
        }

        info!("Adding edge {}: {} -> {}", edge.id, edge.source, edge.target);
        let id = edge.id.clone();
        state.edges.insert(id.clone(), edge);
        Ok(id)
    }

    /// Remove an edge. The target keeps any output it already computed.
    pub async fn remove_edge(&self, id: &EdgeId) -> Result<Edge> {
        let edge = self
            .state
            .write()
            .await
            .edges
            .shift_remove(id)
            .ok_or_else(|| PipelineError::EdgeNotFound(id.clone()))?;
        info!("Removed edge {id}: {} -> {}", edge.source, edge.target);
        Ok(edge)
    }

    /// Replace a node's configuration.
    ///
    /// The node's output is invalidated and its own listeners are triggered
    /// so the stage re-runs.
    pub async fn set_config(&self, id: &NodeId, config: StageConfig) -> Result<()> {
        {
            let mut state = self.state.write().await;
            let entry = state
                .nodes
                .get_mut(id)
                .ok_or_else(|| PipelineError::NodeNotFound(id.clone()))?;
            let node = &mut entry.node;
            node.config = config;
            node.config_revision += 1;
            node.state = ProcessingState::Idle;
            node.invalidate();
            debug!("Configuration of {id} now at revision {}", node.config_revision);

            if state.pending.shift_remove(id).is_some() {
                debug!("Dropped pending commit of {id} made under the old configuration");
            }
        }

        self.bus.publish(Trigger::new(id, id)).await;
        Ok(())
    }

    /// Take the output writer lease of a node.
    pub async fn writer(&self, id: &NodeId) -> Result<OutputWriter> {
        let state = self.state.read().await;
        let entry = state
            .nodes
            .get(id)
            .ok_or_else(|| PipelineError::NodeNotFound(id.clone()))?;
        if entry.lease.swap(true, Ordering::AcqRel) {
            return Err(PipelineError::WriterTaken(id.clone()));
        }

        Ok(OutputWriter {
            store: self.clone(),
            node_id: id.clone(),
            lease: entry.lease.clone(),
        })
    }

    /// Snapshot of a node.
    pub async fn node(&self, id: &NodeId) -> Option<Node> {
        self.state.read().await.nodes.get(id).map(|e| e.node.clone())
    }

    /// Snapshots of every node in insertion order.
    pub async fn nodes(&self) -> Vec<Node> {
        self.state
            .read()
            .await
            .nodes
            .values()
            .map(|e| e.node.clone())
            .collect()
    }

    /// Every edge in insertion order.
    pub async fn edges(&self) -> Vec<Edge> {
        self.state.read().await.edges.values().cloned().collect()
    }

    /// Edges ending at `id`.
    pub async fn incoming_edges(&self, id: &NodeId) -> Vec<Edge> {
        self.state
            .read()
            .await
            .edges
            .values()
            .filter(|e| e.target == *id)
            .cloned()
            .collect()
    }

    /// Edges starting at `id`, in insertion order.
    pub async fn outgoing_edges(&self, id: &NodeId) -> Vec<Edge> {
        self.state
            .read()
            .await
            .edges
            .values()
            .filter(|e| e.source == *id)
            .cloned()
            .collect()
    }

    /// Committed output of a node.
    pub async fn output(&self, id: &NodeId) -> Option<Arc<StageOutput>> {
        self.state
            .read()
            .await
            .nodes
            .get(id)
            .and_then(|e| e.node.output.clone())
    }

    /// Land every pending commit now.
    pub async fn flush(&self) {
        let landed: Vec<Landed> = {
            let mut state = self.state.write().await;
            let pending: Vec<_> = state.pending.drain(..).collect();
            pending
                .into_iter()
                .filter_map(|(id, p)| state.land(&id, p.commit))
                .collect()
        };
        for landed in landed {
            self.announce(landed);
        }
    }

    async fn submit(&self, node_id: &NodeId, lease: &Arc<AtomicBool>, commit: Commit) -> Result<()> {
        let debounce = self.options.debounce;
        let mut state = self.state.write().await;
        state.owned_entry(node_id, lease)?;

        if debounce.is_zero() {
            let landed = state.land(node_id, commit);
            drop(state);
            if let Some(landed) = landed {
                self.announce(landed);
            }
            return Ok(());
        }

        state.generation += 1;
        let generation = state.generation;
        if state
            .pending
            .insert(node_id.clone(), PendingCommit { generation, commit })
            .is_some()
        {
            debug!("Coalesced commit for {node_id}");
        }
        drop(state);

        let store = self.clone();
        let node_id = node_id.clone();
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            store.land_pending(&node_id, generation).await;
        });
        Ok(())
    }

    async fn land_pending(&self, node_id: &NodeId, generation: u64) {
        let landed = {
            let mut state = self.state.write().await;
            match state.pending.get(node_id) {
                Some(pending) if pending.generation == generation => {}
                _ => return,
            }
            match state.pending.shift_remove(node_id) {
                Some(pending) => state.land(node_id, pending.commit),
                None => None,
            }
        };
        if let Some(landed) = landed {
            self.announce(landed);
        }
    }

    fn announce(&self, landed: Landed) {
        let Landed { event, targets } = landed;
        match &event.error {
            None => info!(
                "Commit landed for {} (revision {})",
                event.node_id, event.revision
            ),
            Some(message) => warn!(
                "Failure committed for {} (revision {}): {message}",
                event.node_id, event.revision
            ),
        }

        let source = event.node_id.clone();
        // Err only means nobody is subscribed.
        let _ = self.events.send(event);

        if !targets.is_empty() {
            propagation::schedule(self.bus.clone(), source, targets, self.options.stagger);
        }
    }

    async fn transition(
        &self,
        node_id: &NodeId,
        lease: &Arc<AtomicBool>,
        event: StageEvent,
    ) -> Result<Transition> {
        let mut state = self.state.write().await;
        let node = &mut state.owned_entry(node_id, lease)?.node;
        let current = node.state;
        let transition = node.state.apply(event);
        match transition {
            Transition::Moved(..) if event == StageEvent::Invalidate => node.invalidate(),
            Transition::Rejected => warn!("Rejected {event:?} for {node_id} in state {current}"),
            _ => {}
        }
        Ok(transition)
    }

    async fn begin_run(&self, node_id: &NodeId, lease: &Arc<AtomicBool>) -> Result<Transition> {
        let mut state = self.state.write().await;
        let node = &mut state.owned_entry(node_id, lease)?.node;
        if matches!(
            node.state,
            ProcessingState::Succeeded | ProcessingState::Failed
        ) {
            node.state.apply(StageEvent::Invalidate);
            node.invalidate();
        }
        let transition = node.state.apply(StageEvent::Start);
        if transition.is_moved() {
            node.waiting = None;
        }
        Ok(transition)
    }
}

/// Exclusive write access to one node's output and state.
///
/// Dropping the writer releases the lease; pending commits still land.
#[derive(Debug)]
pub struct OutputWriter {
    store: GraphStore,
    node_id: NodeId,
    lease: Arc<AtomicBool>,
}

impl OutputWriter {
    pub fn node_id(&self) -> &NodeId {
        &self.node_id
    }

    /// Commit a successful output.
    pub async fn commit_output(&self, output: StageOutput) -> Result<()> {
        self.store
            .submit(&self.node_id, &self.lease, Commit::Output(output))
            .await
    }

    /// Commit a failed run. Does not propagate.
    pub async fn commit_failure(&self, message: impl Into<String>) -> Result<()> {
        self.store
            .submit(&self.node_id, &self.lease, Commit::Failure(message.into()))
            .await
    }

    /// Apply a state machine event to the node.
    pub async fn set_state(&self, event: StageEvent) -> Result<Transition> {
        self.store
            .transition(&self.node_id, &self.lease, event)
            .await
    }

    /// Begin a run: invalidate a finished output, then start.
    ///
    /// Returns the `Start` transition, `Ignored` when a run is in flight.
    pub async fn begin(&self) -> Result<Transition> {
        self.store.begin_run(&self.node_id, &self.lease).await
    }

    /// Mark the node as waiting for input, or clear the mark.
    pub async fn set_waiting(&self, reason: Option<WaitReason>) -> Result<()> {
        let mut state = self.store.state.write().await;
        let entry = state.owned_entry(&self.node_id, &self.lease)?;
        entry.node.waiting = reason;
        Ok(())
    }
}

impl Drop for OutputWriter {
    fn drop(&mut self) {
        self.lease.store(false, Ordering::Release);
    }
}
