//! Daily settlement sweep

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::Job;
use crate::error::Result;
use crate::services::TrackProcessor;

/// Settles every challenge once per run
pub struct SettlementJob {
    processor: Arc<TrackProcessor>,
}

impl SettlementJob {
    pub const NAME: &'static str = "settlement";

    pub fn new(processor: Arc<TrackProcessor>) -> Self {
        Self { processor }
    }
}

#[async_trait]
impl Job for SettlementJob {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self) -> Result<()> {
        let report = self.processor.settle_all_challenges().await?;

        if !report.is_clean() {
            warn!(failed = report.failures.len(), "Some challenges left unsettled");
        }
        info!(
            settled = report.settled,
            failed = report.failures.len(),
            total_delta = report.total_delta,
            "Settlement job complete"
        );
        Ok(())
    }
}
