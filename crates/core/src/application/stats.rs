// Stats aggregation for monitoring views
use crate::domain::{JobStatus, QueueStats};
use crate::error::Result;
use crate::port::JobStore;
use std::sync::Arc;

/// Derives per-status counts. Pure read, no side effects.
pub struct StatsAggregator {
    store: Arc<dyn JobStore>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn JobStore>) -> Self {
        Self { store }
    }

    pub async fn queue_stats(&self) -> Result<QueueStats> {
        let counts = self.store.count_by_status().await?;
        Ok(Self::fold(&counts))
    }

    /// Fold raw (status, count) rows into `QueueStats`
    pub fn fold(counts: &[(JobStatus, i64)]) -> QueueStats {
        let mut stats = QueueStats::default();
        for (status, count) in counts {
            let slot = match status {
                JobStatus::Pending => &mut stats.pending,
                JobStatus::Processing => &mut stats.processing,
                JobStatus::Sent => &mut stats.sent,
                JobStatus::Failed => &mut stats.failed,
                JobStatus::Cancelled => &mut stats.cancelled,
            };
            *slot += count;
            stats.total += count;
        }
        stats
    }
}
