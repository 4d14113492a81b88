//! Detection History
//!
//! Keeps the last few fusion outcomes per user in process memory. The
//! history is a soft input to the decision layer: it is not durable and is
//! lost on restart.

mod buffer;
mod store;

pub use buffer::{HistoryRing, DEFAULT_CAPACITY};
pub use store::{HistoryStore, ShardedHistoryStore, DEFAULT_SHARDS, SWEEP_INTERVAL};

use chrono::{DateTime, Utc};
use distress_fusion::{FusionResult, Severity};
use serde::{Deserialize, Serialize};

/// User identifier (same representation as the user store's ids)
pub type UserId = i64;

/// One recorded detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub score: f64,
    pub severity: Severity,
    pub is_crisis: bool,
}

impl From<&FusionResult> for DetectionHistoryEntry {
    fn from(result: &FusionResult) -> Self {
        Self {
            timestamp: result.timestamp,
            score: result.combined_score,
            severity: result.severity,
            is_crisis: result.is_crisis,
        }
    }
}
