//! Localized alert messages

use chrono::{DateTime, Utc};
use distress_fusion::FusionResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Template key of the alert title
pub const TITLE_KEY: &str = "emergencyAlert.title";

/// Template key of the alert body
pub const MESSAGE_KEY: &str = "emergencyAlert.message";

const FALLBACK_TITLE: &str = "URGENT: Mental Health Alert";
const FALLBACK_MESSAGE: &str = "Possible crisis detected for {{userName}}. Emotion: {{emotion}}, \
Severity: {{severity}}, Time: {{timestamp}}. Please reach out immediately.";

const BUILTIN_TEMPLATES: &[(&str, &str, &str)] = &[
    ("en", FALLBACK_TITLE, FALLBACK_MESSAGE),
    (
        "es",
        "URGENTE: Alerta de salud mental",
        "Posible crisis detectada para {{userName}}. Emoción: {{emotion}}, Gravedad: {{severity}}, \
Hora: {{timestamp}}. Por favor, comuníquese de inmediato.",
    ),
    (
        "fr",
        "URGENT : Alerte de santé mentale",
        "Crise possible détectée pour {{userName}}. Émotion : {{emotion}}, Gravité : {{severity}}, \
Heure : {{timestamp}}. Veuillez prendre contact immédiatement.",
    ),
    (
        "de",
        "DRINGEND: Warnung zur psychischen Gesundheit",
        "Mögliche Krise bei {{userName}} erkannt. Emotion: {{emotion}}, Schweregrad: {{severity}}, \
Zeit: {{timestamp}}. Bitte melden Sie sich sofort.",
    ),
];

/// Source of localized templates
pub trait LocalizationProvider: Send + Sync {
    fn get_template(&self, language: &str, key: &str) -> Option<String>;
}

/// In-process template catalog
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    templates: HashMap<String, HashMap<String, String>>,
}

impl StaticCatalog {
    /// Empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in en, es, fr and de alert templates
    pub fn builtin() -> Self {
        BUILTIN_TEMPLATES
            .iter()
            .fold(Self::new(), |catalog, (lang, title, message)| {
                catalog.with_template(lang, TITLE_KEY, *title).with_template(lang, MESSAGE_KEY, *message)
            })
    }

    pub fn with_template(mut self, language: &str, key: &str, template: impl Into<String>) -> Self {
        self.templates
            .entry(language.to_ascii_lowercase())
            .or_default()
            .insert(key.to_string(), template.into());
        self
    }

    pub fn languages(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }
}

impl LocalizationProvider for StaticCatalog {
    fn get_template(&self, language: &str, key: &str) -> Option<String> {
        self.templates
            .get(&language.to_ascii_lowercase())
            .and_then(|t| t.get(key))
            .cloned()
    }
}

/// Composer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposerConfig {
    /// Language tried when the requested one has no template (default: en)
    pub default_language: String,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
        }
    }
}

/// Rendered alert
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertMessage {
    pub title: String,
    pub body: String,
}

/// Data substituted into the templates
#[derive(Debug, Clone, PartialEq)]
pub struct AlertSubject {
    pub user_name: Option<String>,
    pub emotion: Option<String>,
    pub severity: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl AlertSubject {
    pub fn from_result(user_name: Option<&str>, result: &FusionResult) -> Self {
        Self {
            user_name: user_name.map(str::to_string),
            emotion: Some(result.primary_emotion.clone()),
            severity: Some(result.severity.to_string()),
            timestamp: result.timestamp,
        }
    }
}

fn or_default<'a>(value: Option<&'a str>, default: &'a str) -> &'a str {
    value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default)
}

/// Replace `{{name}}` placeholders in one left-to-right pass. Inserted
/// values are never rescanned; unknown placeholders are kept verbatim.
fn substitute<'a>(template: &str, value: impl Fn(&str) -> Option<&'a str>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}").and_then(|end| value(&after[..end]).map(|v| (end, v))) {
            Some((end, v)) => {
                out.push_str(v);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Renders alert titles and bodies
pub struct MessageComposer {
    config: ComposerConfig,
    catalog: Arc<dyn LocalizationProvider>,
}

impl MessageComposer {
    pub fn new(config: ComposerConfig, catalog: Arc<dyn LocalizationProvider>) -> Self {
        Self { config, catalog }
    }

    pub fn compose(&self, subject: &AlertSubject, language: Option<&str>) -> AlertMessage {
        let language = or_default(language, &self.config.default_language);
        let title = self.template(language, TITLE_KEY, FALLBACK_TITLE);
        let timestamp = subject.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string();
        let template = self.template(language, MESSAGE_KEY, FALLBACK_MESSAGE);
        let body = substitute(&template, |name| match name {
            "userName" => Some(or_default(subject.user_name.as_deref(), "User")),
            "emotion" => Some(or_default(subject.emotion.as_deref(), "distress")),
            "severity" => Some(or_default(subject.severity.as_deref(), "high")),
            "timestamp" => Some(timestamp.as_str()),
            _ => None,
        });
        AlertMessage { title, body }
    }

    /// Requested language, then the default language, then built-in English
    fn template(&self, language: &str, key: &str, fallback: &str) -> String {
        self.catalog
            .get_template(language, key)
            .or_else(|| {
                debug!(language, key, "Template missing, trying default language");
                self.catalog.get_template(&self.config.default_language, key)
            })
            .unwrap_or_else(|| fallback.to_string())
    }
}

impl Default for MessageComposer {
    fn default() -> Self {
        Self::new(ComposerConfig::default(), Arc::new(StaticCatalog::builtin()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use distress_fusion::Severity;

    fn subject() -> AlertSubject {
        AlertSubject {
            user_name: Some("Sam".to_string()),
            emotion: Some("sad".to_string()),
            severity: Some("critical".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
        }
    }

    #[test]
    fn test_english_template() {
        let message = MessageComposer::default().compose(&subject(), Some("en"));
        assert_eq!(message.title, "URGENT: Mental Health Alert");
        assert_eq!(
            message.body,
            "Possible crisis detected for Sam. Emotion: sad, Severity: critical, \
Time: 2024-03-01 12:30:00 UTC. Please reach out immediately."
        );
    }

    #[test]
    fn test_localized_template() {
        let message = MessageComposer::default().compose(&subject(), Some("ES"));
        assert_eq!(message.title, "URGENTE: Alerta de salud mental");
        assert!(message.body.contains("Emoción: sad"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_default() {
        let composer = MessageComposer::default();
        assert_eq!(composer.compose(&subject(), Some("ja")).title, FALLBACK_TITLE);
        assert_eq!(composer.compose(&subject(), None).title, FALLBACK_TITLE);
    }

    #[test]
    fn test_configured_default_language() {
        let config = ComposerConfig {
            default_language: "de".to_string(),
        };
        let composer = MessageComposer::new(config, Arc::new(StaticCatalog::builtin()));
        assert!(composer.compose(&subject(), Some("ja")).title.starts_with("DRINGEND"));
    }

    #[test]
    fn test_empty_catalog_uses_builtin_english() {
        let composer = MessageComposer::new(ComposerConfig::default(), Arc::new(StaticCatalog::new()));
        let message = composer.compose(&subject(), Some("fr"));
        assert_eq!(message.title, FALLBACK_TITLE);
        assert!(message.body.starts_with("Possible crisis detected for Sam."));
    }

    #[test]
    fn test_missing_data_defaults() {
        let subject = AlertSubject {
            user_name: None,
            emotion: Some(String::new()),
            severity: None,
            timestamp: Utc::now(),
        };
        let body = MessageComposer::default().compose(&subject, None).body;
        assert!(body.contains("for User."));
        assert!(body.contains("Emotion: distress"));
        assert!(body.contains("Severity: high"));
    }

    #[test]
    fn test_every_placeholder_occurrence_replaced() {
        let catalog = StaticCatalog::new().with_template("en", MESSAGE_KEY, "{{userName}}/{{userName}}");
        let composer = MessageComposer::new(ComposerConfig::default(), Arc::new(catalog));
        assert_eq!(composer.compose(&subject(), None).body, "Sam/Sam");
    }

    #[test]
    fn test_substituted_values_are_not_rescanned() {
        let subject = AlertSubject {
            user_name: Some("{{severity}}".to_string()),
            emotion: Some("{{timestamp}}".to_string()),
            ..subject()
        };
        let body = MessageComposer::default().compose(&subject, None).body;
        assert!(body.starts_with("Possible crisis detected for {{severity}}. Emotion: {{timestamp}}, Severity: critical"));
    }

    #[test]
    fn test_unknown_placeholder_kept() {
        let catalog = StaticCatalog::new().with_template("en", MESSAGE_KEY, "{{other}} {{userName}} {{");
        let composer = MessageComposer::new(ComposerConfig::default(), Arc::new(catalog));
        assert_eq!(composer.compose(&subject(), None).body, "{{other}} Sam {{");
    }

    #[test]
    fn test_subject_from_manual_result() {
        let subject = AlertSubject::from_result(Some("Ana"), &FusionResult::manual());
        assert_eq!(subject.emotion.as_deref(), Some("manual"));
        assert_eq!(subject.severity.as_deref(), Some(Severity::High.as_str()));
    }
}
