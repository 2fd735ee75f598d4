//! TOML configuration for fixtures, analysis, validation, coordination and the model.

use crate::analysis::ProblemRules;
use crate::fixtures::FixtureSet;
use crate::validator::{ValidatorConfig, ValidatorError};
use chrono::{DateTime, Utc};
use model::OllamaConfig;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

/// Fixture directory relative to the workspace root, where the binary is run from.
pub const DEFAULT_DATA_DIR: &str = "insights/data";

/// Longest incident look-back accepted from configuration.
pub const MAX_INCIDENT_WINDOW_DAYS: u32 = 36_500;

/// Overrides `[model].name` when set.
pub const MODEL_ENV_VAR: &str = "QUALITY_INSIGHTS_MODEL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error(transparent)]
    Validator(#[from] ValidatorError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureSettings {
    /// Directory holding jira_data.json, zephyr_data.json and incident_data.json
    pub data_dir: PathBuf,
}

impl Default for FixtureSettings {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    /// Reference instant for look-back windows; the newest fixture timestamp when unset
    pub as_of: Option<DateTime<Utc>>,
    pub incident_window_days: u32,
    pub velocity_window: usize,
    /// Pass ratio (0.0 to 1.0) below which a test counts as flaky
    pub flaky_threshold: f64,
    pub flaky_min_executions: usize,
    pub rules: ProblemRules,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            as_of: None,
            incident_window_days: 30,
            velocity_window: 6,
            flaky_threshold: 0.7,
            flaky_min_executions: 3,
            rules: ProblemRules::default(),
        }
    }
}

impl AnalysisSettings {
    pub fn resolve_as_of(&self, fixtures: &FixtureSet) -> DateTime<Utc> {
        self.as_of
            .or_else(|| fixtures.latest_timestamp())
            .unwrap_or_else(Utc::now)
    }
}

/// Exponential backoff with jitter for narrator calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    /// Random extra delay as a fraction of the backoff (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
            jitter_factor: 0.1,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = Duration::from_millis(self.base_delay_ms);
        let exponential = base.saturating_mul(2_u32.saturating_pow(attempt));
        let delay = exponential.min(Duration::from_millis(self.max_delay_ms));

        if self.jitter_factor > 0.0 {
            let jitter = rand::thread_rng().gen_range(0.0..=self.jitter_factor);
            delay + Duration::from_millis((delay.as_millis() as f64 * jitter) as u64)
        } else {
            delay
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    pub team_name: String,
    /// Revisions attempted after a failing draft
    pub max_revisions: u32,
    pub retry: RetryPolicy,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            team_name: "Engineering".to_string(),
            max_revisions: 2,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Use the chat model for prose instead of the offline templates
    pub enabled: bool,
    pub name: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Tool-call rounds allowed per narrator request
    pub max_tool_rounds: usize,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            name: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.2,
            timeout_secs: 120,
            max_tool_rounds: 4,
        }
    }
}

impl ModelSettings {
    pub fn ollama_config(&self) -> OllamaConfig {
        OllamaConfig::new()
            .with_base_url(self.base_url.clone())
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_temperature(self.temperature)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightsConfig {
    pub fixtures: FixtureSettings,
    pub analysis: AnalysisSettings,
    pub validator: ValidatorConfig,
    pub coordinator: CoordinatorSettings,
    pub model: ModelSettings,
}

impl InsightsConfig {
    /// Read, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&raw)?.with_env_overrides();
        config.validate()?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(raw: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(name) = std::env::var(MODEL_ENV_VAR) {
            if !name.trim().is_empty() {
                debug!("Model name overridden by {}", MODEL_ENV_VAR);
                self.model.name = name.trim().to_string();
            }
        }
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.fixtures.data_dir = dir.into();
        self
    }

    pub fn with_as_of(mut self, as_of: DateTime<Utc>) -> Self {
        self.analysis.as_of = Some(as_of);
        self
    }

    pub fn with_team_name(mut self, team: impl Into<String>) -> Self {
        self.coordinator.team_name = team.into();
        self
    }

    pub fn with_max_revisions(mut self, max_revisions: u32) -> Self {
        self.coordinator.max_revisions = max_revisions;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.coordinator.retry = retry;
        self
    }

    pub fn with_model_enabled(mut self, enabled: bool) -> Self {
        self.model.enabled = enabled;
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        let analysis = &self.analysis;
        if !(0.0..=1.0).contains(&analysis.flaky_threshold) {
            return Err(invalid(format!(
                "analysis.flaky_threshold must be between 0.0 and 1.0, got {}",
                analysis.flaky_threshold
            )));
        }
        if analysis.incident_window_days > MAX_INCIDENT_WINDOW_DAYS {
            return Err(invalid(format!(
                "analysis.incident_window_days must be at most {}, got {}",
                MAX_INCIDENT_WINDOW_DAYS, analysis.incident_window_days
            )));
        }
        if analysis.velocity_window == 0 {
            return Err(invalid("analysis.velocity_window must be at least 1".to_string()));
        }
        if analysis.flaky_min_executions == 0 {
            return Err(invalid(
                "analysis.flaky_min_executions must be at least 1".to_string(),
            ));
        }
        analysis
            .rules
            .validate()
            .map_err(|message| invalid(format!("analysis.rules: {}", message)))?;

        self.validator.validate()?;

        let retry = &self.coordinator.retry;
        if !(0.0..=1.0).contains(&retry.jitter_factor) {
            return Err(invalid(format!(
                "coordinator.retry.jitter_factor must be between 0.0 and 1.0, got {}",
                retry.jitter_factor
            )));
        }
        if retry.base_delay_ms > retry.max_delay_ms {
            return Err(invalid(
                "coordinator.retry.base_delay_ms must not exceed max_delay_ms".to_string(),
            ));
        }
        if self.coordinator.team_name.trim().is_empty() {
            return Err(invalid("coordinator.team_name must not be empty".to_string()));
        }

        if self.model.name.trim().is_empty() {
            return Err(invalid("model.name must not be empty".to_string()));
        }
        self.model
            .ollama_config()
            .validate()
            .map_err(|message| invalid(format!("model: {}", message)))?;

        Ok(())
    }
}

fn invalid(message: String) -> ConfigError {
    ConfigError::Invalid { message }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = InsightsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.analysis.incident_window_days, 30);
        assert_eq!(config.analysis.velocity_window, 6);
        assert_eq!(config.coordinator.max_revisions, 2);
        assert!(!config.model.enabled);
        assert_eq!(config.fixtures.data_dir, PathBuf::from("insights/data"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = InsightsConfig::from_toml_str(
            r#"
            [fixtures]
            data_dir = "fixtures/acme"

            [analysis]
            as_of = "2024-12-18T17:30:00Z"
            flaky_threshold = 0.5

            [analysis.rules]
            completion_target = 90.0

            [coordinator]
            max_revisions = 4

            [coordinator.retry]
            max_retries = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.fixtures.data_dir, PathBuf::from("fixtures/acme"));
        assert_eq!(config.analysis.flaky_threshold, 0.5);
        assert_eq!(config.analysis.rules.completion_target, 90.0);
        assert_eq!(config.analysis.rules.completion_floor, 70.0);
        assert_eq!(config.coordinator.max_revisions, 4);
        assert_eq!(config.coordinator.retry.max_retries, 1);
        assert_eq!(config.coordinator.retry.max_delay_ms, 5000);
        assert_eq!(
            config.analysis.as_of.unwrap().to_rfc3339(),
            "2024-12-18T17:30:00+00:00"
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let config = InsightsConfig::from_toml_str("[analysis]\nflaky_threshold = 1.5\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let config =
            InsightsConfig::from_toml_str("[analysis]\nincident_window_days = 4000000000\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        let config = InsightsConfig::from_toml_str("[validator.grades]\na = 70\nb = 80\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Validator(_))));

        let config = InsightsConfig::default().with_team_name("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            InsightsConfig::from_toml_str("[analysis\nvelocity_window = 3"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("insights.toml");
        std::fs::write(&path, "[coordinator]\nteam_name = \"Payments\"\n").unwrap();

        let config = InsightsConfig::load(&path).unwrap();
        assert_eq!(config.coordinator.team_name, "Payments");

        let missing = InsightsConfig::load(dir.path().join("absent.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_retry_delay_grows_and_caps() {
        let policy = RetryPolicy {
            jitter_factor: 0.0,
            ..Default::default()
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(10), Duration::from_millis(5000));

        let jittered = RetryPolicy::default().delay_for(2);
        assert!(jittered >= Duration::from_millis(400));
        assert!(jittered <= Duration::from_millis(440));
    }

    #[test]
    fn test_resolve_as_of_prefers_configured_instant() {
        let fixed: DateTime<Utc> = "2025-01-01T00:00:00Z".parse().unwrap();
        let settings = AnalysisSettings {
            as_of: Some(fixed),
            ..Default::default()
        };
        assert_eq!(settings.resolve_as_of(&FixtureSet::default()), fixed);
    }
}
