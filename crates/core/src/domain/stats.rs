// Queue statistics (read model for monitoring views)

use serde::{Deserialize, Serialize};

/// Job counts per status. The per-status fields always sum to `total`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: i64,
    pub processing: i64,
    pub sent: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub total: i64,
}
