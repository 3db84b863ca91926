//! Stage processing routines.

mod chunk;
mod filter;
mod parse;

use async_trait::async_trait;

pub use chunk::ChunkStage;
pub use filter::FilterStage;
pub use parse::{ContentFetcher, InMemoryFetcher, LocalFsFetcher, ParseStage};

use crate::discovery::StageInput;
use crate::error::StageFailure;
use crate::node::StageKind;
use crate::payload::{OutputKind, StageConfig, StageOutput};

/// Processing routine of a node.
///
/// A stage computes its output from one input and its configuration. It
/// never touches the graph; the runner commits whatever it returns.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Kind of node this stage runs on.
    fn kind(&self) -> StageKind;

    /// Upstream output kinds this stage consumes, in order of preference.
    fn accepts(&self) -> &[OutputKind];

    /// Compute the output for `input`.
    async fn process(
        &self,
        input: StageInput,
        config: &StageConfig,
    ) -> Result<StageOutput, StageFailure>;
}
