//! Crew configuration, loadable from TOML.
//!
//! Missing fields take their defaults, so an empty file (or no file) is a
//! valid configuration.

use crate::errors::ConfigError;
use crate::pipeline::{BackoffStrategy, RetryConfig};
use crate::presets::PresetKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Settings for one crew invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrewConfig {
    /// Upper bound on clarification questions; 0 skips clarification.
    pub max_clarification_questions: usize,

    /// Whole-run attempts, including the first. Must be at least 1.
    pub max_retry_attempts: usize,

    /// Delay between attempts in milliseconds.
    pub retry_delay_ms: u64,

    /// Delay strategy between attempts.
    pub backoff: BackoffStrategy,

    /// Delay cap for exponential backoff in milliseconds.
    pub max_retry_delay_ms: u64,

    /// Per-question operator timeout. Unset waits indefinitely.
    pub operator_timeout_secs: Option<u64>,

    /// Where the file sink writes artifacts.
    pub output_dir: PathBuf,

    /// Which crew to run.
    pub preset: PresetKind,

    /// Generation model override.
    pub model: Option<String>,
}

impl Default for CrewConfig {
    fn default() -> Self {
        Self {
            max_clarification_questions: 3,
            max_retry_attempts: 3,
            retry_delay_ms: 5000,
            backoff: BackoffStrategy::Fixed,
            max_retry_delay_ms: 60_000,
            operator_timeout_secs: None,
            output_dir: PathBuf::from("output"),
            preset: PresetKind::default(),
            model: None,
        }
    }
}

impl CrewConfig {
    /// Creates a config with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the clarification question budget.
    #[must_use]
    pub fn with_max_clarification_questions(mut self, questions: usize) -> Self {
        self.max_clarification_questions = questions;
        self
    }

    /// Sets the whole-run attempt budget.
    #[must_use]
    pub fn with_max_retry_attempts(mut self, attempts: usize) -> Self {
        self.max_retry_attempts = attempts;
        self
    }

    /// Sets the delay between attempts.
    #[must_use]
    pub fn with_retry_delay_ms(mut self, delay: u64) -> Self {
        self.retry_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the operator timeout.
    #[must_use]
    pub fn with_operator_timeout_secs(mut self, secs: Option<u64>) -> Self {
        self.operator_timeout_secs = secs;
        self
    }

    /// Sets the output directory.
    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the preset.
    #[must_use]
    pub fn with_preset(mut self, preset: PresetKind) -> Self {
        self.preset = preset;
        self
    }

    /// The retry policy for whole runs.
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.max_retry_attempts)
            .with_delay_ms(self.retry_delay_ms)
            .with_max_delay_ms(self.max_retry_delay_ms)
            .with_backoff(self.backoff)
    }

    /// The operator timeout as a duration.
    #[must_use]
    pub fn operator_timeout(&self) -> Option<Duration> {
        self.operator_timeout_secs.map(Duration::from_secs)
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a zero attempt budget or a zero
    /// operator timeout.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retry_attempts == 0 {
            return Err(ConfigError::Invalid(
                "max_retry_attempts must be >= 1".to_string(),
            ));
        }
        if self.operator_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "operator_timeout_secs must be > 0 when set".to_string(),
            ));
        }
        if self.backoff == BackoffStrategy::Exponential && self.max_retry_delay_ms < self.retry_delay_ms {
            return Err(ConfigError::Invalid(
                "max_retry_delay_ms must be >= retry_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `CrewConfig::default()`.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML, or fails
/// validation.
pub fn load_config(path: &Path) -> Result<CrewConfig, ConfigError> {
    if !path.exists() {
        let cfg = CrewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: CrewConfig = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_returns_default() {
        let temp = tempfile::tempdir().unwrap();
        let cfg = load_config(&temp.path().join("missing.toml")).unwrap();
        assert_eq!(cfg, CrewConfig::default());
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("crewflow.toml");
        std::fs::write(
            &path,
            "max_retry_attempts = 5\nbackoff = \"exponential\"\npreset = \"coding-prompt\"\noperator_timeout_secs = 60\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();

        assert_eq!(cfg.max_retry_attempts, 5);
        assert_eq!(cfg.backoff, BackoffStrategy::Exponential);
        assert_eq!(cfg.preset, PresetKind::CodingPrompt);
        assert_eq!(cfg.operator_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(cfg.max_clarification_questions, 3);
        assert_eq!(cfg.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("crewflow.toml");
        std::fs::write(&path, "max_retry_attempts = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_bad_toml_is_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("crewflow.toml");
        std::fs::write(&path, "max_retry_attempts = \"many\"\n").unwrap();

        assert!(matches!(load_config(&path).unwrap_err(), ConfigError::Parse { .. }));
    }

    #[test]
    fn test_retry_config_mapping() {
        let cfg = CrewConfig::new()
            .with_max_retry_attempts(4)
            .with_retry_delay_ms(250)
            .with_backoff(BackoffStrategy::Exponential);
        let retry = cfg.retry_config();

        assert_eq!(retry.max_attempts, 4);
        assert_eq!(retry.delay_ms, 250);
        assert_eq!(retry.backoff, BackoffStrategy::Exponential);
    }
}
