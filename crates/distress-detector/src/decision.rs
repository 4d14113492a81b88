//! Distress decision service

use crate::policy::{SustainedDistressConfig, SustainedDistressPolicy};
use crate::{DetectionHistoryEntry, FusionResult, HistoryStore, Severity, UserId};
use chrono::{DateTime, Utc};
use detection_history::DEFAULT_CAPACITY;
use distress_fusion::{FusionEngine, RawSignals};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Decision configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    /// Combined score that alone triggers an alert (default: 0.80)
    pub alert_threshold: f64,
    /// Detections kept per user (default: 10)
    pub history_capacity: usize,
    /// Users without a detection for this long lose their history (default: 1 hour)
    pub history_idle_secs: u64,
    /// Sustained-distress rule
    pub sustained: SustainedDistressConfig,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            alert_threshold: 0.80,
            history_capacity: DEFAULT_CAPACITY,
            history_idle_secs: 3600,
            sustained: SustainedDistressConfig::default(),
        }
    }
}

/// Why a verdict asks for an alert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertTrigger {
    Crisis,
    CriticalSeverity,
    ScoreThreshold,
    SustainedDistress,
}

/// Recommended response tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseTier {
    Immediate,
    Urgent,
    Monitor,
}

/// Response recommendation derived from severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub tier: ResponseTier,
    /// Localization key of the user-facing message
    pub message_key: String,
    pub suggested_actions: Vec<String>,
}

impl Recommendation {
    fn new(tier: ResponseTier, message_key: &str, actions: &[&str]) -> Self {
        Self {
            tier,
            message_key: message_key.to_string(),
            suggested_actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// Recommendation for a fusion result, chosen from severity and crisis only
    pub fn for_result(result: &FusionResult) -> Self {
        if result.is_crisis || result.severity == Severity::Critical {
            Self::new(
                ResponseTier::Immediate,
                "crisis_detected",
                &["contact_helpline", "contact_emergency_contact", "seek_professional_help"],
            )
        } else if result.severity == Severity::High {
            Self::new(
                ResponseTier::Urgent,
                "high_distress_detected",
                &["practice_breathing", "contact_support", "schedule_therapy"],
            )
        } else {
            Self::new(ResponseTier::Monitor, "monitoring_recommended", &["self_care", "track_mood"])
        }
    }
}

/// Alert verdict of one evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistressVerdict {
    pub should_alert: bool,
    pub fusion_result: FusionResult,
    pub recommendation: Recommendation,
    /// Rules that fired, empty when no alert is due
    pub triggers: Vec<AlertTrigger>,
}

/// Applies alert rules to fusion results with per-user history awareness
pub struct DistressDecisionService {
    config: DecisionConfig,
    fusion: FusionEngine,
    history: Arc<dyn HistoryStore>,
    policy: Box<dyn SustainedDistressPolicy>,
}

impl DistressDecisionService {
    /// Create a service using the configured sustained-distress policy
    pub fn new(config: DecisionConfig, fusion: FusionEngine, history: Arc<dyn HistoryStore>) -> Self {
        let policy = config.sustained.build();
        Self {
            config,
            fusion,
            history,
            policy,
        }
    }

    /// Replace the sustained-distress policy
    pub fn with_policy(mut self, policy: Box<dyn SustainedDistressPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    pub fn fusion(&self) -> &FusionEngine {
        &self.fusion
    }

    /// Fuse raw signals and decide
    pub fn analyze(&self, user_id: UserId, raw: &RawSignals) -> DistressVerdict {
        let result = self.fusion.fuse(raw);
        self.decide_at(user_id, result, Utc::now())
    }

    /// Decide on an existing fusion result
    pub fn decide(&self, user_id: UserId, result: FusionResult) -> DistressVerdict {
        self.decide_at(user_id, result, Utc::now())
    }

    /// Decide with an explicit clock. The result is appended to the user's
    /// history whatever the verdict.
    pub fn decide_at(&self, user_id: UserId, result: FusionResult, now: DateTime<Utc>) -> DistressVerdict {
        let history = self.history.record(user_id, DetectionHistoryEntry::from(&result));
        let triggers = self.triggers(&result, &history, now);
        let should_alert = !triggers.is_empty();

        if should_alert {
            info!(
                user_id,
                score = result.combined_score,
                severity = %result.severity,
                ?triggers,
                "Distress alert warranted"
            );
        } else {
            debug!(user_id, score = result.combined_score, severity = %result.severity, "Below alert threshold");
        }

        DistressVerdict {
            should_alert,
            recommendation: Recommendation::for_result(&result),
            fusion_result: result,
            triggers,
        }
    }

    /// Rules satisfied by a result given the user's history
    pub fn triggers(
        &self,
        result: &FusionResult,
        history: &[DetectionHistoryEntry],
        now: DateTime<Utc>,
    ) -> Vec<AlertTrigger> {
        let mut triggers = Vec::new();
        if result.is_crisis {
            triggers.push(AlertTrigger::Crisis);
        }
        if result.severity == Severity::Critical {
            triggers.push(AlertTrigger::CriticalSeverity);
        }
        if result.combined_score >= self.config.alert_threshold {
            triggers.push(AlertTrigger::ScoreThreshold);
        }
        if self.policy.is_sustained(history, now) {
            triggers.push(AlertTrigger::SustainedDistress);
        }
        triggers
    }

    /// Recent detections for a user, oldest first
    pub fn history(&self, user_id: UserId) -> Vec<DetectionHistoryEntry> {
        self.history.snapshot(user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{NeverSustained, ShardedHistoryStore};
    use distress_fusion::FusionConfig;

    fn service(history: Arc<ShardedHistoryStore>) -> DistressDecisionService {
        DistressDecisionService::new(DecisionConfig::default(), FusionEngine::new(FusionConfig::default()), history)
    }

    fn result(score: f64, severity: Severity, is_crisis: bool, at: DateTime<Utc>) -> FusionResult {
        FusionResult {
            combined_score: score,
            severity,
            is_crisis,
            timestamp: at,
            ..FusionResult::fallback("", at)
        }
    }

    #[test]
    fn test_low_result_does_not_alert() {
        let svc = service(Arc::new(ShardedHistoryStore::default()));
        let verdict = svc.decide(1, result(0.3, Severity::Low, false, Utc::now()));
        assert!(!verdict.should_alert);
        assert!(verdict.triggers.is_empty());
        assert_eq!(verdict.recommendation.tier, ResponseTier::Monitor);
        assert_eq!(verdict.recommendation.suggested_actions, vec!["self_care", "track_mood"]);
    }

    #[test]
    fn test_score_threshold_alerts() {
        let svc = service(Arc::new(ShardedHistoryStore::default()));
        let verdict = svc.decide(1, result(0.80, Severity::High, false, Utc::now()));
        assert!(verdict.should_alert);
        assert_eq!(verdict.triggers, vec![AlertTrigger::ScoreThreshold]);
        assert_eq!(verdict.recommendation.tier, ResponseTier::Urgent);
    }

    #[test]
    fn test_crisis_and_critical_alert() {
        let svc = service(Arc::new(ShardedHistoryStore::default()));
        let verdict = svc.decide(1, result(0.5, Severity::Critical, true, Utc::now()));
        assert!(verdict.should_alert);
        assert_eq!(
            verdict.triggers,
            vec![AlertTrigger::Crisis, AlertTrigger::CriticalSeverity]
        );
        assert_eq!(verdict.recommendation.tier, ResponseTier::Immediate);
        assert_eq!(verdict.recommendation.message_key, "crisis_detected");
    }

    #[test]
    fn test_history_recorded_regardless_of_verdict() {
        let history = Arc::new(ShardedHistoryStore::new(10));
        let svc = service(history.clone());
        for _ in 0..12 {
            svc.decide(5, result(0.1, Severity::Low, false, Utc::now()));
        }
        assert_eq!(svc.history(5).len(), 10);
        assert_eq!(history.total_recorded(5), 12);
    }

    #[test]
    fn test_sustained_high_distress_alerts() {
        let svc = service(Arc::new(ShardedHistoryStore::default()));
        let now = Utc::now();

        let first = svc.decide_at(9, result(0.72, Severity::High, false, now), now);
        let second = svc.decide_at(9, result(0.74, Severity::High, false, now), now);
        let third = svc.decide_at(9, result(0.71, Severity::High, false, now), now);

        assert!(!first.should_alert);
        assert!(!second.should_alert);
        assert!(third.should_alert);
        assert_eq!(third.triggers, vec![AlertTrigger::SustainedDistress]);
    }

    #[test]
    fn test_never_sustained_policy() {
        let svc = service(Arc::new(ShardedHistoryStore::default())).with_policy(Box::new(NeverSustained));
        let now = Utc::now();
        for _ in 0..5 {
            let verdict = svc.decide_at(9, result(0.72, Severity::High, false, now), now);
            assert!(!verdict.should_alert);
        }
    }

    #[test]
    fn test_analyze_empty_signals_is_deterministic() {
        let svc = service(Arc::new(ShardedHistoryStore::default()));
        let a = svc.analyze(3, &RawSignals::default());
        let b = svc.analyze(3, &RawSignals::default());
        assert_eq!(a.should_alert, b.should_alert);
        assert_eq!(a.fusion_result.combined_score, b.fusion_result.combined_score);
        assert_eq!(a.fusion_result.severity, b.fusion_result.severity);
        assert_eq!(svc.history(3).len(), 2);
    }
}
