//! Input discovery: find a stage's input on its upstream node.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::graph::GraphStore;
use crate::ids::NodeId;
use crate::payload::{OutputKind, StageOutput};

/// Input resolved for one run.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// Upstream node the payload came from.
    pub source: NodeId,

    /// Upstream `output_revision` at discovery time.
    pub revision: u64,

    pub payload: Arc<StageOutput>,
}

/// Why no input is available yet. Not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "kind", rename_all = "snake_case")]
pub enum WaitReason {
    NoIncomingEdge,
    SourceMissing,
    NoOutput,
    EmptyOutput,
    UnsupportedOutput(OutputKind),
}

impl fmt::Display for WaitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoIncomingEdge => f.write_str("no incoming edge"),
            Self::SourceMissing => f.write_str("upstream node missing"),
            Self::NoOutput => f.write_str("upstream has no output"),
            Self::EmptyOutput => f.write_str("upstream output is empty"),
            Self::UnsupportedOutput(kind) => write!(f, "upstream output {kind} not accepted"),
        }
    }
}

/// Result of a discovery pass.
#[derive(Debug, Clone)]
pub enum Discovery {
    Ready(StageInput),
    Waiting(WaitReason),
}

/// Look up `node_id`'s input.
///
/// Takes the first incoming edge, reads its source's committed output and
/// adopts it when its kind appears in `accepts` and it is non-empty.
pub async fn discover(store: &GraphStore, node_id: &NodeId, accepts: &[OutputKind]) -> Discovery {
    let Some(edge) = store.incoming_edges(node_id).await.into_iter().next() else {
        return Discovery::Waiting(WaitReason::NoIncomingEdge);
    };
    let Some(source) = store.node(&edge.source).await else {
        return Discovery::Waiting(WaitReason::SourceMissing);
    };
    let Some(payload) = source.output else {
        return Discovery::Waiting(WaitReason::NoOutput);
    };

    let kind = payload.kind();
    if !accepts.contains(&kind) {
        return Discovery::Waiting(WaitReason::UnsupportedOutput(kind));
    }
    if payload.is_empty() {
        return Discovery::Waiting(WaitReason::EmptyOutput);
    }

    Discovery::Ready(StageInput {
        source: source.id,
        revision: source.output_revision,
        payload,
    })
}
