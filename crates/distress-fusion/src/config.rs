//! Fusion configuration

use crate::{FusionError, Modality, Severity};
use serde::{Deserialize, Serialize};

/// Crisis language scanned for in text input
pub const DEFAULT_CRISIS_KEYWORDS: &[&str] = &[
    "suicide",
    "kill myself",
    "end it all",
    "want to die",
    "no point",
    "hopeless",
    "worthless",
    "burden",
    "better off without me",
    "self harm",
    "cutting",
    "overdose",
    "give up",
];

/// Weight of each modality in the combined score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModalityWeights {
    pub facial: f64,
    pub voice: f64,
    pub text: f64,
}

impl Default for ModalityWeights {
    fn default() -> Self {
        Self {
            facial: 0.35,
            voice: 0.35,
            text: 0.30,
        }
    }
}

impl ModalityWeights {
    pub fn get(&self, modality: Modality) -> f64 {
        match modality {
            Modality::Facial => self.facial,
            Modality::Voice => self.voice,
            Modality::Text => self.text,
        }
    }

    pub fn sum(&self) -> f64 {
        self.facial + self.voice + self.text
    }
}

/// Lower bounds of the score-derived severity tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityThresholds {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityThresholds {
    fn default() -> Self {
        Self {
            critical: 0.85,
            high: 0.70,
            medium: 0.50,
        }
    }
}

impl SeverityThresholds {
    /// Severity for a combined score, first match wins
    pub fn classify(&self, score: f64) -> Severity {
        if score >= self.critical {
            Severity::Critical
        } else if score >= self.high {
            Severity::High
        } else if score >= self.medium {
            Severity::Medium
        } else {
            Severity::Low
        }
    }
}

/// Fusion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// Modality weights (must sum to 1.0)
    pub weights: ModalityWeights,

    /// Emotions scored with `critical_base`
    pub critical_emotions: Vec<String>,

    /// Emotions scored with `elevated_base`
    pub elevated_emotions: Vec<String>,

    /// Crisis keywords for the text modality
    pub crisis_keywords: Vec<String>,

    /// Base score of a critical-bucket emotion (default: 0.8)
    pub critical_base: f64,
    /// Base score of an elevated-bucket emotion (default: 0.6)
    pub elevated_base: f64,
    /// Base score of `neutral` (default: 0.3)
    pub neutral_base: f64,
    /// Base score of any other emotion (default: 0.4)
    pub other_base: f64,

    /// Multiplier applied to vocal stress before adding it (default: 0.2)
    pub voice_stress_factor: f64,
    /// Flat boost for text containing crisis keywords (default: 0.3)
    pub keyword_boost: f64,

    /// Score thresholds for severity tiers
    pub thresholds: SeverityThresholds,

    /// Confidence a critical emotion needs to count toward a crisis (exclusive)
    pub crisis_confidence: f64,
    /// Number of agreeing critical modalities that raise a crisis
    pub crisis_modalities: usize,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            weights: ModalityWeights::default(),
            critical_emotions: ["anger", "angry", "sad", "anxious", "fear", "depressed", "suicidal"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            elevated_emotions: ["disgust", "surprise", "fear"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            crisis_keywords: DEFAULT_CRISIS_KEYWORDS.iter().map(|s| s.to_string()).collect(),
            critical_base: 0.8,
            elevated_base: 0.6,
            neutral_base: 0.3,
            other_base: 0.4,
            voice_stress_factor: 0.2,
            keyword_boost: 0.3,
            thresholds: SeverityThresholds::default(),
            crisis_confidence: 0.7,
            crisis_modalities: 2,
        }
    }
}

impl FusionConfig {
    /// Check weight and threshold tables
    pub fn validate(&self) -> Result<(), FusionError> {
        for modality in Modality::ALL {
            if self.weights.get(modality) < 0.0 {
                return Err(FusionError::NegativeWeight(modality));
            }
        }

        let sum = self.weights.sum();
        if !sum.is_finite() || (sum - 1.0).abs() > 1e-6 {
            return Err(FusionError::InvalidWeights(sum));
        }

        let t = &self.thresholds;
        let descending = t.critical <= 1.0 && t.critical > t.high && t.high > t.medium && t.medium > 0.0;
        if !descending {
            return Err(FusionError::InvalidThresholds);
        }

        Ok(())
    }

    /// Copy with trimmed, lower-cased emotion buckets, matching how signals
    /// fold their emotion labels
    pub fn normalized(mut self) -> Self {
        self.critical_emotions = fold_labels(self.critical_emotions);
        self.elevated_emotions = fold_labels(self.elevated_emotions);
        self
    }

    pub fn is_critical_emotion(&self, emotion: &str) -> bool {
        self.critical_emotions.iter().any(|e| e == emotion)
    }

    pub fn is_elevated_emotion(&self, emotion: &str) -> bool {
        self.elevated_emotions.iter().any(|e| e == emotion)
    }
}

fn fold_labels(labels: Vec<String>) -> Vec<String> {
    labels
        .into_iter()
        .map(|l| l.trim().to_lowercase())
        .filter(|l| !l.is_empty())
        .collect()
}
