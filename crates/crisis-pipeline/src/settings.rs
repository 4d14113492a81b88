//! Pipeline configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional
//! TOML file, then `CRISIS__`-prefixed environment variables with `__`
//! between nested keys (e.g. `CRISIS__DISPATCH__MAX_PASSES=5`).

use crate::ConfigError;
use alerting::{ComposerConfig, DispatchConfig};
use distress_detector::DecisionConfig;
use distress_fusion::FusionConfig;
use serde::{Deserialize, Serialize};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "CRISIS";

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset (default: info)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Complete pipeline configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub fusion: FusionConfig,
    pub decision: DecisionConfig,
    pub dispatch: DispatchConfig,
    pub composer: ComposerConfig,
    pub log: LogConfig,
}

impl PipelineConfig {
    /// Load defaults, the optional file at `path`, then the environment
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let file = path.map(|p| config::File::with_name(p).required(true));
        Self::load_from(file, Self::environment())
    }

    /// Load from a TOML document layered over the defaults
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        let file = config::File::from_str(toml, config::FileFormat::Toml);
        Self::load_from(Some(file), Self::environment().source(Some(Default::default())))
    }

    fn environment() -> config::Environment {
        config::Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("__")
            .separator("__")
            .try_parsing(true)
    }

    fn load_from<F>(file: Option<F>, env: config::Environment) -> Result<Self, ConfigError>
    where
        F: config::Source + Send + Sync + 'static,
    {
        let mut builder = config::Config::builder().add_source(config::Config::try_from(&Self::default())?);
        if let Some(file) = file {
            builder = builder.add_source(file);
        }
        let config: Self = builder.add_source(env).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.fusion.validate()?;

        let threshold = self.decision.alert_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "decision.alert_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if self.decision.history_capacity == 0 {
            return Err(ConfigError::Invalid("decision.history_capacity must be at least 1".to_string()));
        }
        let sustained = &self.decision.sustained;
        if sustained.enabled && self.decision.history_idle_secs < sustained.max_age_secs {
            return Err(ConfigError::Invalid(format!(
                "decision.history_idle_secs ({}) must cover the sustained-distress window ({}s)",
                self.decision.history_idle_secs, sustained.max_age_secs
            )));
        }
        if self.dispatch.max_passes == 0 {
            return Err(ConfigError::Invalid("dispatch.max_passes must be at least 1".to_string()));
        }
        if self.dispatch.call_timeout_ms == 0 {
            return Err(ConfigError::Invalid("dispatch.call_timeout_ms must be positive".to_string()));
        }
        if self.composer.default_language.trim().is_empty() {
            return Err(ConfigError::Invalid("composer.default_language must not be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.dispatch.max_passes, 3);
        assert_eq!(config.dispatch.backoff_base_ms, 1000);
        assert_eq!(config.dispatch.call_timeout_ms, 10_000);
        assert_eq!(config.decision.alert_threshold, 0.80);
        assert_eq!(config.decision.history_capacity, 10);
        assert_eq!(config.composer.default_language, "en");
        assert_eq!(config.log.format, LogFormat::Pretty);
        assert_eq!(config.fusion.weights.text, 0.30);
    }

    #[test]
    fn test_toml_overrides() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [dispatch]
            max_passes = 5

            [decision.sustained]
            enabled = false

            [log]
            format = "json"
            "#,
        )
        .unwrap();
        assert_eq!(config.dispatch.max_passes, 5);
        assert_eq!(config.dispatch.backoff_base_ms, 1000);
        assert!(!config.decision.sustained.enabled);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<String, String> = [
            ("CRISIS__DISPATCH__CALL_TIMEOUT_MS", "2500"),
            ("CRISIS__COMPOSER__DEFAULT_LANGUAGE", "de"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let env = PipelineConfig::environment().source(Some(vars));

        let file = config::File::from_str("", config::FileFormat::Toml);
        let config = PipelineConfig::load_from(Some(file), env).unwrap();
        assert_eq!(config.dispatch.call_timeout_ms, 2500);
        assert_eq!(config.composer.default_language, "de");
    }

    #[test]
    fn test_invalid_weights_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [fusion.weights]
            facial = 0.5
            voice = 0.5
            text = 0.5
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Fusion(_)));
    }

    #[test]
    fn test_zero_passes_rejected() {
        let err = PipelineConfig::from_toml_str("[dispatch]\nmax_passes = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_idle_ttl_must_cover_sustained_window() {
        let err = PipelineConfig::from_toml_str("[decision]\nhistory_idle_secs = 60").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let config = PipelineConfig::from_toml_str(
            "[decision]\nhistory_idle_secs = 60\n\n[decision.sustained]\nenabled = false",
        )
        .unwrap();
        assert_eq!(config.decision.history_idle_secs, 60);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(matches!(
            PipelineConfig::load(Some("/nonexistent/crisis-pipeline")),
            Err(ConfigError::Load(_))
        ));
    }
}
