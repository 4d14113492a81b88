//! Fusion results

use crate::{Modality, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Primary emotion recorded on manually triggered alerts
pub const MANUAL_TRIGGER_EMOTION: &str = "manual";

/// Combined distress assessment of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusionResult {
    /// Weighted combination of per-modality scores (0-1)
    pub combined_score: f64,

    /// Severity tier
    pub severity: Severity,

    /// Probable acute risk
    pub is_crisis: bool,

    /// Dominant emotion across modalities
    pub primary_emotion: String,

    /// Distress sub-score per modality (absent modalities score 0)
    pub per_modality_scores: BTreeMap<Modality, f64>,

    /// When the assessment was made
    pub timestamp: DateTime<Utc>,

    /// Internal failure that forced the safe fallback
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FusionResult {
    /// Safe result returned when fusion fails internally
    pub fn fallback(error: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            combined_score: 0.0,
            severity: Severity::Low,
            is_crisis: false,
            primary_emotion: "neutral".to_string(),
            per_modality_scores: BTreeMap::new(),
            timestamp,
            error: Some(error.into()),
        }
    }

    /// Synthetic high-severity result for operator or user initiated alerts
    pub fn manual() -> Self {
        Self {
            combined_score: 0.9,
            severity: Severity::High,
            is_crisis: true,
            primary_emotion: MANUAL_TRIGGER_EMOTION.to_string(),
            per_modality_scores: BTreeMap::new(),
            timestamp: Utc::now(),
            error: None,
        }
    }

    pub fn score_for(&self, modality: Modality) -> f64 {
        self.per_modality_scores.get(&modality).copied().unwrap_or(0.0)
    }

    pub fn is_fallback(&self) -> bool {
        self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_is_safe() {
        let result = FusionResult::fallback("boom", Utc::now());
        assert_eq!(result.combined_score, 0.0);
        assert_eq!(result.severity, Severity::Low);
        assert!(!result.is_crisis);
        assert_eq!(result.primary_emotion, "neutral");
        assert!(result.is_fallback());
    }

    #[test]
    fn test_manual_result() {
        let result = FusionResult::manual();
        assert_eq!(result.primary_emotion, "manual");
        assert_eq!(result.severity, Severity::High);
        assert!(result.is_crisis);
        assert_eq!(result.combined_score, 0.9);
    }

    #[test]
    fn test_serializes_lowercase_keys() {
        let mut result = FusionResult::fallback("x", Utc::now());
        result.per_modality_scores.insert(Modality::Voice, 0.5);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["severity"], "low");
        assert_eq!(json["per_modality_scores"]["voice"], 0.5);
    }
}
