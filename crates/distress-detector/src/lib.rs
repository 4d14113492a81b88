//! Distress Detection
//!
//! Converts fusion results into alert verdicts:
//! - Crisis, severity, and score threshold rules
//! - Sustained-distress policy over the per-user history
//! - Response recommendations
//! - Country-specific crisis resources

mod decision;
mod policy;
mod resources;

pub use decision::{
    AlertTrigger, DecisionConfig, DistressDecisionService, DistressVerdict, Recommendation, ResponseTier,
};
pub use policy::{NeverSustained, SustainedDistressConfig, SustainedDistressPolicy, WindowedSeverityPolicy};
pub use resources::{country_from_address, CrisisResources, DirectoryLink, Helpline, SelfHelpResource};

pub use detection_history::{DetectionHistoryEntry, HistoryStore, ShardedHistoryStore, UserId};
pub use distress_fusion::{FusionResult, Severity};
