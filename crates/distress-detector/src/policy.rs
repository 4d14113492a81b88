//! Sustained-distress policies

use crate::{DetectionHistoryEntry, Severity};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound on the configurable window age (~100 years)
const MAX_AGE_SECS: u64 = 100 * 365 * 24 * 3600;

/// Decides whether recent history shows sustained distress
pub trait SustainedDistressPolicy: Send + Sync {
    /// `history` is oldest first and already contains the current detection
    fn is_sustained(&self, history: &[DetectionHistoryEntry], now: DateTime<Utc>) -> bool;
}

/// Sustained-distress configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SustainedDistressConfig {
    /// Disable to never treat history as alert-worthy
    pub enabled: bool,
    /// Most recent entries inspected (default: 5)
    pub window_entries: usize,
    /// Qualifying entries required within the window (default: 3)
    pub min_entries: usize,
    /// Severity an entry needs to qualify (default: high)
    pub min_severity: Severity,
    /// Entries older than this never qualify (default: 10 minutes)
    pub max_age_secs: u64,
}

impl Default for SustainedDistressConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_entries: 5,
            min_entries: 3,
            min_severity: Severity::High,
            max_age_secs: 600,
        }
    }
}

impl SustainedDistressConfig {
    /// Build the policy this configuration describes
    pub fn build(&self) -> Box<dyn SustainedDistressPolicy> {
        if self.enabled {
            Box::new(WindowedSeverityPolicy::from(self))
        } else {
            Box::new(NeverSustained)
        }
    }
}

/// "`min_entries` of the last `window_entries` detections at or above
/// `min_severity`, all within `max_age`"
#[derive(Debug, Clone)]
pub struct WindowedSeverityPolicy {
    window_entries: usize,
    min_entries: usize,
    min_severity: Severity,
    max_age: Duration,
}

impl WindowedSeverityPolicy {
    pub fn new(window_entries: usize, min_entries: usize, min_severity: Severity, max_age: Duration) -> Self {
        Self {
            window_entries,
            min_entries: min_entries.max(1),
            min_severity,
            max_age,
        }
    }
}

impl From<&SustainedDistressConfig> for WindowedSeverityPolicy {
    fn from(config: &SustainedDistressConfig) -> Self {
        let max_age = Duration::seconds(config.max_age_secs.min(MAX_AGE_SECS) as i64);
        Self::new(config.window_entries, config.min_entries, config.min_severity, max_age)
    }
}

impl Default for WindowedSeverityPolicy {
    fn default() -> Self {
        Self::from(&SustainedDistressConfig::default())
    }
}

impl SustainedDistressPolicy for WindowedSeverityPolicy {
    fn is_sustained(&self, history: &[DetectionHistoryEntry], now: DateTime<Utc>) -> bool {
        let cutoff = now.checked_sub_signed(self.max_age).unwrap_or(DateTime::<Utc>::MIN_UTC);
        let qualifying = history
            .iter()
            .rev()
            .take(self.window_entries)
            .filter(|e| e.timestamp >= cutoff && e.severity >= self.min_severity)
            .count();
        qualifying >= self.min_entries
    }
}

/// Never reports sustained distress
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverSustained;

impl SustainedDistressPolicy for NeverSustained {
    fn is_sustained(&self, _history: &[DetectionHistoryEntry], _now: DateTime<Utc>) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(severity: Severity, minutes_ago: i64, now: DateTime<Utc>) -> DetectionHistoryEntry {
        DetectionHistoryEntry {
            timestamp: now - Duration::minutes(minutes_ago),
            score: 0.7,
            severity,
            is_crisis: false,
        }
    }

    #[test]
    fn test_three_of_last_five() {
        let now = Utc::now();
        let policy = WindowedSeverityPolicy::default();
        let history = vec![
            entry(Severity::High, 4, now),
            entry(Severity::Low, 3, now),
            entry(Severity::Critical, 2, now),
            entry(Severity::Medium, 1, now),
            entry(Severity::High, 0, now),
        ];
        assert!(policy.is_sustained(&history, now));
        assert!(!policy.is_sustained(&history[1..], now));
    }

    #[test]
    fn test_only_recent_window_counts() {
        let now = Utc::now();
        let policy = WindowedSeverityPolicy::default();
        let mut history = vec![entry(Severity::High, 9, now); 3];
        history.extend(vec![entry(Severity::Low, 1, now); 5]);
        assert!(!policy.is_sustained(&history, now));
    }

    #[test]
    fn test_stale_entries_ignored() {
        let now = Utc::now();
        let policy = WindowedSeverityPolicy::default();
        let history = vec![
            entry(Severity::High, 30, now),
            entry(Severity::High, 20, now),
            entry(Severity::High, 1, now),
        ];
        assert!(!policy.is_sustained(&history, now));
    }

    #[test]
    fn test_disabled_config_never_sustained() {
        let now = Utc::now();
        let config = SustainedDistressConfig {
            enabled: false,
            ..Default::default()
        };
        let history = vec![entry(Severity::Critical, 0, now); 5];
        assert!(!config.build().is_sustained(&history, now));
        assert!(SustainedDistressConfig::default().build().is_sustained(&history, now));
    }
}
