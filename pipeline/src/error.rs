//! Error types for the pipeline runtime.

use thiserror::Error;

use crate::ids::{EdgeId, NodeId};
use crate::node::StageKind;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised by graph edits and pipeline setup.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Node not found.
    #[error("node not found: {0}")]
    NodeNotFound(NodeId),

    /// Edge not found.
    #[error("edge not found: {0}")]
    EdgeNotFound(EdgeId),

    /// A node with this id already exists.
    #[error("node already exists: {0}")]
    DuplicateNode(NodeId),

    /// An identical source to target edge already exists.
    #[error("edge already exists: {source_id} -> {target_id}")]
    DuplicateEdge { source_id: NodeId, target_id: NodeId },

    /// Edge from a node to itself.
    #[error("self loop on node {0}")]
    SelfLoop(NodeId),

    /// Target already has an incoming edge.
    #[error("node {target_id} already has an input from {existing}")]
    MultipleInputs { target_id: NodeId, existing: NodeId },

    /// Another writer holds the node's output lease.
    #[error("output writer already taken for node {0}")]
    WriterTaken(NodeId),

    /// Node kind has no processing routine.
    #[error("node {0} is a {1} node and cannot run a stage")]
    NotProcessable(NodeId, StageKind),

    /// Segmentation configuration error.
    #[error("chunking error: {0}")]
    Chunking(#[from] ragflow_chunking::ChunkingError),

    /// Listing error.
    #[error("listing error: {0}")]
    Listing(#[from] ragflow_listing::ListingError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single stage run.
///
/// Stays local to the node: it is committed as the node's error message and
/// never propagated downstream.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct StageFailure {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl StageFailure {
    /// Create a failure with a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Attach the underlying error.
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Message followed by the underlying error, if any.
    pub fn detail(&self) -> String {
        match &self.source {
            Some(source) => format!("{}: {source}", self.message),
            None => self.message.clone(),
        }
    }
}

impl From<ragflow_chunking::ChunkingError> for StageFailure {
    fn from(err: ragflow_chunking::ChunkingError) -> Self {
        Self::new("invalid chunking configuration").with_source(err)
    }
}
