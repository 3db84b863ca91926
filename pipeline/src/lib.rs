//! # Pipeline
//!
//! Event-driven ingestion graph: repository listing in, chunks out.
//!
//! ## Features
//!
//! - **Graph store**: nodes, edges and committed outputs behind one shared handle
//! - **Single writer**: each node's output is written only through its lease
//! - **Debounced commits**: bursts of commits to a node land once
//! - **Trigger bus**: at-most-once "input changed" notifications by node id
//! - **Stage runners**: discovery, idempotent runs and local failures
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Pipeline                               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  Source ──► Filter ──► Parse ──► Chunk ──► Sink                 │
//! │     │          ▲ │        ▲ │       ▲ │                         │
//! │     ▼          │ ▼        │ ▼       │ ▼                         │
//! │  ┌───────────────────┐  commit  ┌─────────────┐                 │
//! │  │    GraphStore     │ ───────► │ TriggerBus  │ ──► runners     │
//! │  └───────────────────┘          └─────────────┘                 │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A runner never receives data over the bus. A trigger only tells it to
//! re-read its upstream node's output from the store.

pub mod bus;
pub mod config;
pub mod discovery;
pub mod error;
pub mod graph;
pub mod ids;
pub mod node;
pub mod payload;
pub mod propagation;
pub mod runner;
pub mod runtime;
pub mod stages;
pub mod state;

pub use bus::{Delivery, ListenerId, Trigger, TriggerBus, TriggerListener};
pub use config::PipelineConfig;
pub use discovery::{Discovery, StageInput, WaitReason, discover};
pub use error::{PipelineError, Result, StageFailure};
pub use graph::{CommitEvent, GraphStore, OutputWriter, StoreOptions};
pub use ids::{EdgeId, NodeId};
pub use node::{Edge, Node, StageKind};
pub use payload::{OutputKind, StageConfig, StageOutput};
pub use runner::StageRunner;
pub use runtime::Pipeline;
pub use stages::{
    ChunkStage, ContentFetcher, FilterStage, InMemoryFetcher, LocalFsFetcher, ParseStage, Stage,
};
pub use state::{NodeStatus, ProcessingState, StageEvent, Transition};
