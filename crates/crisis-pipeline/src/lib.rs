//! Crisis Pipeline
//!
//! End-to-end distress evaluation and emergency alerting:
//! normalization, fusion, decision, contact and preference resolution,
//! message composition and dispatch.

mod logging;
mod pipeline;
mod settings;

pub use logging::init_logging;
pub use pipeline::{dispatcher_from_env, AlertOutcome, CrisisPipeline, Evaluation, PipelineStores};
pub use settings::{LogConfig, LogFormat, PipelineConfig, ENV_PREFIX};

pub use alerting::{CancellationToken, DispatchError, DispatchOutcome, DispatchSummary};
pub use distress_detector::{CrisisResources, DistressVerdict};
pub use distress_fusion::{FusionError, RawSignals};
pub use storage::{StoreError, UserId};

use thiserror::Error;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("User lookup failed for {user_id}: {source}")]
    UserLookup {
        user_id: UserId,
        #[source]
        source: StoreError,
    },

    #[error("User {0} not found")]
    UserNotFound(UserId),

    #[error("Manual alerts are disabled for user {0}")]
    ManualOverrideDisabled(UserId),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid fusion configuration: {0}")]
    Fusion(#[from] FusionError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to build channel sender: {0}")]
    Sender(String),
}
