//! Signal normalizer

use crate::raw::{RawFacial, RawSignal, RawSignals, RawText, RawVoice};
use crate::{Modality, ModalityHints, ModalitySignal};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Emotion assumed when a recognizer reports none
pub const DEFAULT_EMOTION: &str = "neutral";

/// Confidence assumed when a recognizer reports none
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Vocal stress assumed when the voice recognizer reports none
pub const DEFAULT_STRESS_LEVEL: f64 = 0.5;

/// Normalized signals of one evaluation; `None` means the modality was absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizedSignals {
    pub facial: Option<ModalitySignal>,
    pub voice: Option<ModalitySignal>,
    pub text: Option<ModalitySignal>,
}

impl NormalizedSignals {
    pub fn get(&self, modality: Modality) -> Option<&ModalitySignal> {
        match modality {
            Modality::Facial => self.facial.as_ref(),
            Modality::Voice => self.voice.as_ref(),
            Modality::Text => self.text.as_ref(),
        }
    }

    /// Present signals in facial, voice, text order
    pub fn present(&self) -> impl Iterator<Item = &ModalitySignal> {
        Modality::ALL.into_iter().filter_map(move |m| self.get(m))
    }
}

/// Extracts uniform [`ModalitySignal`]s from raw recognizer output
#[derive(Debug, Clone)]
pub struct SignalNormalizer {
    /// Lower-cased crisis keywords matched against text input
    crisis_keywords: Vec<String>,
}

impl SignalNormalizer {
    /// Create a normalizer scanning text for the given crisis keywords
    pub fn new<I, S>(crisis_keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            crisis_keywords: crisis_keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// Normalize all present modalities
    pub fn normalize_all(&self, raw: &RawSignals) -> NormalizedSignals {
        NormalizedSignals {
            facial: raw.facial.as_ref().map(|f| self.normalize_facial(f)),
            voice: raw.voice.as_ref().map(|v| self.normalize_voice(v)),
            text: raw.text.as_ref().map(|t| self.normalize_text(t)),
        }
    }

    /// Normalize a single raw signal; `None` input stays `None`
    pub fn normalize(&self, raw: Option<&RawSignal>) -> Option<ModalitySignal> {
        Some(match raw? {
            RawSignal::Facial(f) => self.normalize_facial(f),
            RawSignal::Voice(v) => self.normalize_voice(v),
            RawSignal::Text(t) => self.normalize_text(t),
        })
    }

    pub fn normalize_facial(&self, raw: &RawFacial) -> ModalitySignal {
        ModalitySignal {
            emotion: fold_emotion(raw.emotion.as_deref().or(raw.detected_emotion.as_deref())),
            confidence: clamp_unit(raw.confidence.or(raw.confidence_score), DEFAULT_CONFIDENCE),
            modality: Modality::Facial,
            hints: ModalityHints::Facial,
        }
    }

    pub fn normalize_voice(&self, raw: &RawVoice) -> ModalitySignal {
        ModalitySignal {
            emotion: fold_emotion(raw.emotion.as_deref().or(raw.detected_emotion.as_deref())),
            confidence: clamp_unit(raw.confidence.or(raw.confidence_score), DEFAULT_CONFIDENCE),
            modality: Modality::Voice,
            hints: ModalityHints::Voice {
                stress_level: clamp_unit(raw.stress_level.or(raw.stress), DEFAULT_STRESS_LEVEL),
            },
        }
    }

    pub fn normalize_text(&self, raw: &RawText) -> ModalitySignal {
        let source = raw
            .text
            .as_deref()
            .or(raw.input.as_deref())
            .unwrap_or_default()
            .to_string();
        let has_crisis_keywords = self.contains_crisis_keyword(&source);
        if has_crisis_keywords {
            debug!("Crisis keyword present in text signal");
        }

        ModalitySignal {
            emotion: fold_emotion(raw.emotion.as_deref().or(raw.sentiment.as_deref())),
            confidence: clamp_unit(raw.confidence.or(raw.confidence_score), DEFAULT_CONFIDENCE),
            modality: Modality::Text,
            hints: ModalityHints::Text {
                source,
                sentiment: raw.sentiment.as_ref().map(|s| s.trim().to_lowercase()),
                has_crisis_keywords,
            },
        }
    }

    /// Case-insensitive substring match against the keyword list
    pub fn contains_crisis_keyword(&self, text: &str) -> bool {
        if text.is_empty() {
            return false;
        }
        let haystack = text.to_lowercase();
        self.crisis_keywords.iter().any(|k| haystack.contains(k.as_str()))
    }

    pub fn crisis_keywords(&self) -> &[String] {
        &self.crisis_keywords
    }
}

fn fold_emotion(emotion: Option<&str>) -> String {
    match emotion.map(str::trim) {
        Some(e) if !e.is_empty() => e.to_lowercase(),
        _ => DEFAULT_EMOTION.to_string(),
    }
}

fn clamp_unit(value: Option<f64>, default: f64) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn normalizer() -> SignalNormalizer {
        SignalNormalizer::new(["suicide", "Kill Myself", "want to die", "  "])
    }

    #[test]
    fn test_facial_defaults() {
        let signal = normalizer().normalize_facial(&RawFacial::default());
        assert_eq!(signal.emotion, "neutral");
        assert_eq!(signal.confidence, 0.5);
        assert_eq!(signal.hints, ModalityHints::Facial);
    }

    #[test]
    fn test_facial_aliases_and_case_folding() {
        let raw = RawFacial {
            detected_emotion: Some(" SAD ".to_string()),
            confidence_score: Some(1.7),
            ..Default::default()
        };
        let signal = normalizer().normalize_facial(&raw);
        assert_eq!(signal.emotion, "sad");
        assert_eq!(signal.confidence, 1.0);
    }

    #[test]
    fn test_primary_field_wins_over_alias() {
        let raw = RawVoice {
            emotion: Some("anger".to_string()),
            detected_emotion: Some("neutral".to_string()),
            confidence: Some(0.0),
            confidence_score: Some(0.9),
            stress: Some(0.8),
            ..Default::default()
        };
        let signal = normalizer().normalize_voice(&raw);
        assert_eq!(signal.emotion, "anger");
        assert_eq!(signal.confidence, 0.0);
        assert_eq!(signal.stress_level(), Some(0.8));
    }

    #[test]
    fn test_voice_stress_default() {
        let signal = normalizer().normalize_voice(&RawVoice::default());
        assert_eq!(signal.stress_level(), Some(DEFAULT_STRESS_LEVEL));
    }

    #[test]
    fn test_text_keyword_detection() {
        let raw = RawText {
            sentiment: Some("Negative".to_string()),
            input: Some("Sometimes I just WANT TO DIE".to_string()),
            ..Default::default()
        };
        let signal = normalizer().normalize_text(&raw);
        assert_eq!(signal.emotion, "negative");
        assert!(signal.has_crisis_keywords());
        match signal.hints {
            ModalityHints::Text { source, sentiment, .. } => {
                assert_eq!(source, "Sometimes I just WANT TO DIE");
                assert_eq!(sentiment.as_deref(), Some("negative"));
            }
            other => panic!("unexpected hints {:?}", other),
        }
    }

    #[test]
    fn test_blank_keywords_are_ignored() {
        let n = normalizer();
        assert_eq!(n.crisis_keywords().len(), 3);
        assert!(!n.contains_crisis_keyword("a perfectly calm day"));
        assert!(!n.contains_crisis_keyword(""));
    }

    #[test]
    fn test_absent_modality_stays_absent() {
        let n = normalizer();
        assert!(n.normalize(None).is_none());

        let all = n.normalize_all(&RawSignals {
            text: Some(RawText::default()),
            ..Default::default()
        });
        assert!(all.facial.is_none());
        assert!(all.voice.is_none());
        assert_eq!(all.present().count(), 1);
    }

    proptest! {
        #[test]
        fn prop_confidence_always_in_unit_range(c in proptest::num::f64::ANY) {
            let raw = RawFacial { confidence: Some(c), ..Default::default() };
            let signal = normalizer().normalize_facial(&raw);
            prop_assert!((0.0..=1.0).contains(&signal.confidence));
        }
    }
}
