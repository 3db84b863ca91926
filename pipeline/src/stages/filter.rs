use async_trait::async_trait;
use ragflow_listing::apply_filter;

use super::Stage;
use crate::discovery::StageInput;
use crate::error::StageFailure;
use crate::node::StageKind;
use crate::payload::{OutputKind, StageConfig, StageOutput};

/// Applies the folder and format filter to a listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterStage;

#[async_trait]
impl Stage for FilterStage {
    fn kind(&self) -> StageKind {
        StageKind::Filter
    }

    fn accepts(&self) -> &[OutputKind] {
        &[OutputKind::Listing]
    }

    async fn process(
        &self,
        input: StageInput,
        config: &StageConfig,
    ) -> Result<StageOutput, StageFailure> {
        let filter = config
            .filter()
            .ok_or_else(|| StageFailure::new("filter stage needs a filter configuration"))?;
        let StageOutput::Listing(listing) = input.payload.as_ref() else {
            return Err(StageFailure::new(format!(
                "filter stage cannot read {} output",
                input.payload.kind()
            )));
        };

        Ok(StageOutput::Selection(apply_filter(listing, &filter)))
    }
}
