//! Distress Fusion Engine
//!
//! Correlates emotion signals from multiple modalities:
//! - Facial expression
//! - Voice prosody and stress
//! - Text sentiment and crisis language
//!
//! Produces one calibrated [`FusionResult`] per evaluation for the
//! decision layer.

mod config;
mod engine;
mod result;

pub use config::{FusionConfig, ModalityWeights, SeverityThresholds, DEFAULT_CRISIS_KEYWORDS};
pub use engine::FusionEngine;
pub use result::{FusionResult, MANUAL_TRIGGER_EMOTION};

pub use signal_normalizer::{Modality, ModalitySignal, NormalizedSignals, RawSignals};

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Fusion error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FusionError {
    #[error("Modality weights must sum to 1.0, got {0}")]
    InvalidWeights(f64),

    #[error("Negative weight for {0} modality")]
    NegativeWeight(Modality),

    #[error("Severity thresholds must be descending within (0, 1]")]
    InvalidThresholds,

    #[error("Non-finite distress score for {0} modality")]
    NonFiniteScore(Modality),
}

/// Distress severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
