//! Node and edge records of the graph.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::discovery::WaitReason;
use crate::ids::{EdgeId, NodeId};
use crate::payload::{StageConfig, StageOutput};
use crate::state::{NodeStatus, ProcessingState};

/// What a node does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    /// Output committed by an external collaborator; no processing routine.
    Source,
    Filter,
    Parse,
    Chunk,
    /// Consumer standing in for the embedding and chat collaborators.
    Sink,
}

impl StageKind {
    /// Whether a stage runner may be mounted on nodes of this kind.
    pub fn is_processing(self) -> bool {
        matches!(self, Self::Filter | Self::Parse | Self::Chunk)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Filter => "filter",
            Self::Parse => "parse",
            Self::Chunk => "chunk",
            Self::Sink => "sink",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,

    pub kind: StageKind,

    pub config: StageConfig,

    /// Last successfully committed output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Arc<StageOutput>>,

    pub state: ProcessingState,

    /// Message of the last failed run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set while the node's runner has no usable input.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting: Option<WaitReason>,

    /// Bumped on every landed commit.
    pub output_revision: u64,

    /// Bumped on every configuration change.
    pub config_revision: u64,
}

impl Node {
    pub(crate) fn new(id: NodeId, kind: StageKind, config: StageConfig) -> Self {
        Self {
            id,
            kind,
            config,
            output: None,
            state: ProcessingState::Idle,
            error: None,
            waiting: None,
            output_revision: 0,
            config_revision: 0,
        }
    }

    /// Status as shown to an operator.
    pub fn status(&self) -> NodeStatus {
        match self.state {
            ProcessingState::Idle => match &self.waiting {
                Some(reason) => NodeStatus::Waiting(reason.clone()),
                None => NodeStatus::Idle,
            },
            ProcessingState::Processing => NodeStatus::Processing,
            ProcessingState::Succeeded => NodeStatus::Succeeded,
            ProcessingState::Failed => {
                NodeStatus::Failed(self.error.clone().unwrap_or_default())
            }
        }
    }

    /// Drop the output and error after an input or configuration change.
    pub(crate) fn invalidate(&mut self) {
        self.output = None;
        self.error = None;
    }
}

/// Directed connection from a source node to a target node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: EdgeId,

    pub source: NodeId,

    pub target: NodeId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_port: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_port: Option<String>,
}

impl Edge {
    /// Create an edge with a generated id.
    pub fn new(source: impl Into<NodeId>, target: impl Into<NodeId>) -> Self {
        Self {
            id: EdgeId::generate(),
            source: source.into(),
            target: target.into(),
            source_port: None,
            target_port: None,
        }
    }

    /// Use an explicit id.
    pub fn with_id(mut self, id: impl Into<EdgeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Label the source handle.
    pub fn with_source_port(mut self, port: impl Into<String>) -> Self {
        self.source_port = Some(port.into());
        self
    }

    /// Label the target handle.
    pub fn with_target_port(mut self, port: impl Into<String>) -> Self {
        self.target_port = Some(port.into());
        self
    }
}
