//! Signal Normalization
//!
//! Turns the loosely shaped per-modality payloads produced by the upstream
//! emotion recognizers into uniform [`ModalitySignal`] records:
//! - Facial expression (emotion + confidence)
//! - Voice prosody (emotion + confidence + stress level)
//! - Text sentiment (emotion + confidence + crisis keyword scan)
//!
//! Missing modalities stay missing; missing fields fall back to defaults.

mod error;
mod normalizer;
mod raw;

pub use error::NormalizeError;
pub use normalizer::{NormalizedSignals, SignalNormalizer, DEFAULT_CONFIDENCE, DEFAULT_EMOTION, DEFAULT_STRESS_LEVEL};
pub use raw::{RawFacial, RawSignal, RawSignals, RawText, RawVoice};

use serde::{Deserialize, Serialize};
use std::fmt;

/// One independent channel of emotional signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Facial,
    Voice,
    Text,
}

impl Modality {
    /// All modalities in evaluation order
    pub const ALL: [Modality; 3] = [Modality::Facial, Modality::Voice, Modality::Text];

    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Facial => "facial",
            Modality::Voice => "voice",
            Modality::Text => "text",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Modality-specific extras carried next to the emotion label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModalityHints {
    Facial,
    Voice {
        /// Vocal stress estimate (0-1)
        stress_level: f64,
    },
    Text {
        /// Text the sentiment was computed from
        source: String,
        /// Raw sentiment label reported upstream, if any
        #[serde(skip_serializing_if = "Option::is_none")]
        sentiment: Option<String>,
        /// Whether the source contains a configured crisis keyword
        has_crisis_keywords: bool,
    },
}

/// Uniform per-modality record consumed by the fusion engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModalitySignal {
    /// Lower-cased emotion label
    pub emotion: String,
    /// Recognizer confidence (0-1)
    pub confidence: f64,
    /// Source modality
    pub modality: Modality,
    /// Modality-specific hints
    pub hints: ModalityHints,
}

impl ModalitySignal {
    /// Vocal stress level, if this is a voice signal
    pub fn stress_level(&self) -> Option<f64> {
        match self.hints {
            ModalityHints::Voice { stress_level } => Some(stress_level),
            _ => None,
        }
    }

    /// Whether the text source matched a crisis keyword
    pub fn has_crisis_keywords(&self) -> bool {
        matches!(
            self.hints,
            ModalityHints::Text {
                has_crisis_keywords: true,
                ..
            }
        )
    }
}
