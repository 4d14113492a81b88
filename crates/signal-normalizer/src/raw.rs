//! Raw upstream signal shapes
//!
//! Each recognizer reports its own field names for the same concept
//! (`emotion` vs `detected_emotion`, `confidence` vs `confidence_score`).
//! The raw structs keep every known alias as an optional field so that
//! normalization can pick the first one present.

use crate::{Modality, NormalizeError};
use serde_json::{Map, Value};

/// Raw facial expression analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFacial {
    pub emotion: Option<String>,
    pub detected_emotion: Option<String>,
    pub confidence: Option<f64>,
    pub confidence_score: Option<f64>,
}

/// Raw voice prosody analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawVoice {
    pub emotion: Option<String>,
    pub detected_emotion: Option<String>,
    pub confidence: Option<f64>,
    pub confidence_score: Option<f64>,
    pub stress_level: Option<f64>,
    pub stress: Option<f64>,
}

/// Raw text sentiment analysis
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawText {
    pub emotion: Option<String>,
    pub sentiment: Option<String>,
    pub confidence: Option<f64>,
    pub confidence_score: Option<f64>,
    pub text: Option<String>,
    pub input: Option<String>,
}

/// A raw signal tagged with its modality
#[derive(Debug, Clone, PartialEq)]
pub enum RawSignal {
    Facial(RawFacial),
    Voice(RawVoice),
    Text(RawText),
}

impl RawSignal {
    pub fn modality(&self) -> Modality {
        match self {
            RawSignal::Facial(_) => Modality::Facial,
            RawSignal::Voice(_) => Modality::Voice,
            RawSignal::Text(_) => Modality::Text,
        }
    }
}

/// The three optional raw inputs of one evaluation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSignals {
    pub facial: Option<RawFacial>,
    pub voice: Option<RawVoice>,
    pub text: Option<RawText>,
}

impl RawSignals {
    /// Read the modalities out of an upstream emotion payload.
    ///
    /// Each modality is looked up under `details.<modality>` first and then
    /// at the top level. `null` and non-object values count as absent.
    pub fn from_envelope(envelope: &Value) -> Self {
        let lookup = |key: &str| -> Option<&Map<String, Value>> {
            envelope
                .get("details")
                .and_then(|d| d.get(key))
                .and_then(Value::as_object)
                .or_else(|| envelope.get(key).and_then(Value::as_object))
        };

        Self {
            facial: lookup("facial").map(RawFacial::from_object),
            voice: lookup("voice").map(RawVoice::from_object),
            text: lookup("text").map(RawText::from_object),
        }
    }

    /// Parse an envelope from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, NormalizeError> {
        let value: Value = serde_json::from_str(json)?;
        Ok(Self::from_envelope(&value))
    }

    /// Present inputs in facial, voice, text order
    pub fn iter(&self) -> impl Iterator<Item = RawSignal> + '_ {
        let facial = self.facial.clone().map(RawSignal::Facial);
        let voice = self.voice.clone().map(RawSignal::Voice);
        let text = self.text.clone().map(RawSignal::Text);
        facial.into_iter().chain(voice).chain(text)
    }

    pub fn is_empty(&self) -> bool {
        self.facial.is_none() && self.voice.is_none() && self.text.is_none()
    }
}

impl RawFacial {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            emotion: string_field(obj, "emotion"),
            detected_emotion: string_field(obj, "detected_emotion"),
            confidence: number_field(obj, "confidence"),
            confidence_score: number_field(obj, "confidence_score"),
        }
    }
}

impl RawVoice {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            emotion: string_field(obj, "emotion"),
            detected_emotion: string_field(obj, "detected_emotion"),
            confidence: number_field(obj, "confidence"),
            confidence_score: number_field(obj, "confidence_score"),
            stress_level: number_field(obj, "stress_level"),
            stress: number_field(obj, "stress"),
        }
    }
}

impl RawText {
    pub fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            emotion: string_field(obj, "emotion"),
            sentiment: string_field(obj, "sentiment"),
            confidence: number_field(obj, "confidence"),
            confidence_score: number_field(obj, "confidence_score"),
            text: string_field(obj, "text"),
            input: string_field(obj, "input"),
        }
    }
}

/// Non-empty string value, anything else is treated as missing
fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        _ => None,
    }
}

/// Finite number, or a string holding one
fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let value = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    value.is_finite().then_some(value)
}
