//! Fusion engine implementation

use crate::{FusionConfig, FusionError, FusionResult, Modality, Severity};
use chrono::{DateTime, Utc};
use signal_normalizer::{ModalitySignal, NormalizedSignals, RawSignals, SignalNormalizer};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Multi-modal distress fusion engine
pub struct FusionEngine {
    /// Configuration
    config: FusionConfig,
    /// Normalizer sharing the configured crisis keywords
    normalizer: SignalNormalizer,
}

impl FusionEngine {
    /// Create new fusion engine
    pub fn new(config: FusionConfig) -> Self {
        let config = config.normalized();
        let normalizer = SignalNormalizer::new(&config.crisis_keywords);
        Self { config, normalizer }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn normalizer(&self) -> &SignalNormalizer {
        &self.normalizer
    }

    /// Normalize and fuse raw signals. Never fails; internal errors yield
    /// [`FusionResult::fallback`].
    pub fn fuse(&self, raw: &RawSignals) -> FusionResult {
        self.fuse_at(raw, Utc::now())
    }

    /// [`fuse`](Self::fuse) with an explicit assessment time
    pub fn fuse_at(&self, raw: &RawSignals, timestamp: DateTime<Utc>) -> FusionResult {
        let signals = self.normalizer.normalize_all(raw);
        self.fuse_signals_at(&signals, timestamp)
    }

    /// Fuse already-normalized signals
    pub fn fuse_signals_at(&self, signals: &NormalizedSignals, timestamp: DateTime<Utc>) -> FusionResult {
        match self.try_fuse(signals, timestamp) {
            Ok(result) => result,
            Err(e) => {
                warn!("Fusion failed, using safe fallback: {}", e);
                FusionResult::fallback(e.to_string(), timestamp)
            }
        }
    }

    /// Fuse signals, surfacing internal errors
    pub fn try_fuse(
        &self,
        signals: &NormalizedSignals,
        timestamp: DateTime<Utc>,
    ) -> Result<FusionResult, FusionError> {
        self.config.validate()?;

        let mut per_modality_scores = BTreeMap::new();
        let mut combined = 0.0;
        for modality in Modality::ALL {
            let score = signals.get(modality).map_or(0.0, |s| self.distress_score(s));
            if !score.is_finite() {
                return Err(FusionError::NonFiniteScore(modality));
            }
            // Absent modalities keep their weight and contribute nothing
            combined += self.config.weights.get(modality) * score;
            per_modality_scores.insert(modality, score);
        }
        let combined_score = combined.clamp(0.0, 1.0);

        let has_keywords = signals.text.as_ref().is_some_and(|t| t.has_crisis_keywords());
        let mut severity = if has_keywords {
            Severity::Critical
        } else {
            self.config.thresholds.classify(combined_score)
        };

        let critical_modalities = signals
            .present()
            .filter(|s| self.config.is_critical_emotion(&s.emotion) && s.confidence > self.config.crisis_confidence)
            .count();

        let is_crisis = combined_score >= self.config.thresholds.critical
            || has_keywords
            || critical_modalities >= self.config.crisis_modalities;

        if is_crisis && severity < Severity::High {
            debug!(
                "Escalating severity {} to high: {} critical modalities",
                severity, critical_modalities
            );
            severity = Severity::High;
        }

        let primary_emotion = self.primary_emotion(signals);

        debug!(
            combined_score,
            severity = %severity,
            is_crisis,
            primary_emotion = %primary_emotion,
            "Fused distress signals"
        );

        Ok(FusionResult {
            combined_score,
            severity,
            is_crisis,
            primary_emotion,
            per_modality_scores,
            timestamp,
            error: None,
        })
    }

    /// Distress sub-score of a single modality
    pub fn distress_score(&self, signal: &ModalitySignal) -> f64 {
        let adjusted = self.base_score(&signal.emotion) * signal.confidence;

        match signal.modality {
            Modality::Voice => {
                let stress = signal.stress_level().unwrap_or(0.0);
                (adjusted + stress * self.config.voice_stress_factor).min(1.0)
            }
            Modality::Text if signal.has_crisis_keywords() => (adjusted + self.config.keyword_boost).min(1.0),
            _ => adjusted,
        }
    }

    fn base_score(&self, emotion: &str) -> f64 {
        if self.config.is_critical_emotion(emotion) {
            self.config.critical_base
        } else if self.config.is_elevated_emotion(emotion) {
            self.config.elevated_base
        } else if emotion == "neutral" {
            self.config.neutral_base
        } else {
            self.config.other_base
        }
    }

    /// First critical emotion in facial, voice, text order, else the most
    /// frequent one (earliest wins ties), else `neutral`
    fn primary_emotion(&self, signals: &NormalizedSignals) -> String {
        if let Some(critical) = signals.present().find(|s| self.config.is_critical_emotion(&s.emotion)) {
            return critical.emotion.clone();
        }

        let mut counts: Vec<(&str, usize)> = Vec::new();
        for signal in signals.present() {
            match counts.iter_mut().find(|(e, _)| *e == signal.emotion) {
                Some((_, n)) => *n += 1,
                None => counts.push((signal.emotion.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (emotion, count) in counts {
            if best.map_or(true, |(_, n)| count > n) {
                best = Some((emotion, count));
            }
        }

        best.map_or_else(|| "neutral".to_string(), |(e, _)| e.to_string())
    }
}

impl Default for FusionEngine {
    fn default() -> Self {
        Self::new(FusionConfig::default())
    }
}
