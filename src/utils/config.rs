use core::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use duration_string::DurationString;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::retry::RetryPolicy;
use crate::waiter::WaitConfig;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Settings file for the `converge` binary.
///
/// ```yaml
/// region: us-east-1
/// wait:
///   poll_interval: 10s
///   timeout: 30m
/// retry:
///   max_attempts: 5
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    pub region: Option<String>,
    pub wait: WaitProfile,
    pub retry: RetryProfile,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WaitProfile {
    pub initial_delay: DurationString,
    pub poll_interval: DurationString,
    pub backoff_factor: f64,
    pub max_interval: DurationString,
    pub jitter: f64,
    pub timeout: DurationString,
    pub unknown_status_tolerance: u32,
    pub not_found_tolerance: u32,
    pub target_occurrences: u32,
}

impl Default for WaitProfile {
    fn default() -> Self {
        let defaults = WaitConfig::default();
        Self {
            initial_delay: DurationString::new(defaults.initial_delay),
            poll_interval: DurationString::new(defaults.poll_interval),
            backoff_factor: defaults.backoff_factor,
            max_interval: DurationString::new(defaults.max_interval),
            jitter: defaults.jitter,
            timeout: DurationString::new(defaults.timeout),
            unknown_status_tolerance: defaults.unknown_status_tolerance,
            not_found_tolerance: defaults.not_found_tolerance,
            target_occurrences: defaults.target_occurrences,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RetryProfile {
    pub max_attempts: u32,
    pub initial_delay: DurationString,
    pub max_delay: DurationString,
    pub multiplier: f64,
    pub jitter: f64,
    pub max_elapsed: Option<DurationString>,
}

impl Default for RetryProfile {
    fn default() -> Self {
        let defaults = RetryPolicy::default();
        Self {
            max_attempts: defaults.max_attempts,
            initial_delay: DurationString::new(defaults.initial_delay),
            max_delay: DurationString::new(defaults.max_delay),
            multiplier: defaults.multiplier,
            jitter: defaults.jitter,
            max_elapsed: defaults.max_elapsed.map(DurationString::new),
        }
    }
}

fn duration(value: &DurationString) -> Duration {
    value.clone().into()
}

fn check_jitter(jitter: f64) -> Result<(), ConfigError> {
    if !(0.0..=1.0).contains(&jitter) {
        return Err(ConfigError::Invalid(format!("jitter must be between 0.0 and 1.0, got {}", jitter)));
    }
    Ok(())
}

impl WaitProfile {
    pub fn to_wait_config(&self, cancel: CancellationToken) -> Result<WaitConfig, ConfigError> {
        if self.backoff_factor < 1.0 {
            return Err(ConfigError::Invalid(format!(
                "wait.backoff_factor must be at least 1.0, got {}",
                self.backoff_factor
            )));
        }
        if self.target_occurrences == 0 {
            return Err(ConfigError::Invalid("wait.target_occurrences must be at least 1".to_string()));
        }
        check_jitter(self.jitter)?;

        Ok(WaitConfig::new(duration(&self.timeout))
            .with_initial_delay(duration(&self.initial_delay))
            .with_poll_interval(duration(&self.poll_interval))
            .with_backoff(self.backoff_factor, duration(&self.max_interval))
            .with_jitter(self.jitter)
            .with_unknown_status_tolerance(self.unknown_status_tolerance)
            .with_not_found_tolerance(self.not_found_tolerance)
            .with_target_occurrences(self.target_occurrences)
            .with_cancellation(cancel))
    }
}

impl RetryProfile {
    pub fn to_retry_policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("retry.max_attempts must be at least 1".to_string()));
        }
        check_jitter(self.jitter)?;

        let mut policy = RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_initial_delay(duration(&self.initial_delay))
            .with_max_delay(duration(&self.max_delay))
            .with_multiplier(self.multiplier)
            .with_jitter(self.jitter);
        if let Some(budget) = &self.max_elapsed {
            policy = policy.with_max_elapsed(duration(budget));
        }
        Ok(policy)
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Waiting up to {} (poll every {}), {} attempts per call",
            self.wait.timeout, self.wait.poll_interval, self.retry.max_attempts
        )
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let file = write_config(
            "region: us-east-1\nwait:\n  poll_interval: 10s\n  timeout: 30m\nretry:\n  max_attempts: 5\n",
        );

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.region.as_deref(), Some("us-east-1"));
        assert_eq!(config.retry.max_attempts, 5);

        let wait = config.wait.to_wait_config(CancellationToken::new()).unwrap();
        assert_eq!(wait.poll_interval, Duration::from_secs(10));
        assert_eq!(wait.timeout, Duration::from_secs(1800));
        assert_eq!(wait.unknown_status_tolerance, 2);
        assert_eq!(wait.not_found_tolerance, 20);

        let retry = config.retry.to_retry_policy().unwrap();
        assert_eq!(retry.jitter, crate::retry::DEFAULT_JITTER);
    }

    #[test]
    fn test_empty_file_is_default() {
        let file = write_config("{}\n");
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_retry_profile() {
        let file = write_config(
            "retry:\n  max_attempts: 8\n  initial_delay: 500ms\n  max_delay: 20s\n  max_elapsed: 2m\n",
        );
        let config = Config::from_file(file.path()).unwrap();
        let policy = config.retry.to_retry_policy().unwrap();
        assert_eq!(policy.max_attempts, 8);
        assert_eq!(policy.initial_delay, Duration::from_millis(500));
        assert_eq!(policy.max_delay, Duration::from_secs(20));
        assert_eq!(policy.max_elapsed, Some(Duration::from_secs(120)));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut profile = WaitProfile::default();
        profile.backoff_factor = 0.5;
        assert!(matches!(
            profile.to_wait_config(CancellationToken::new()),
            Err(ConfigError::Invalid(_))
        ));

        let mut profile = WaitProfile::default();
        profile.jitter = 1.5;
        assert!(profile.to_wait_config(CancellationToken::new()).is_err());

        let mut profile = WaitProfile::default();
        profile.target_occurrences = 0;
        assert!(profile.to_wait_config(CancellationToken::new()).is_err());

        let mut retry = RetryProfile::default();
        retry.max_attempts = 0;
        assert!(matches!(retry.to_retry_policy(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_malformed_yaml() {
        let file = write_config("wait: [1, 2\n");
        assert!(matches!(Config::from_file(file.path()), Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/converge.yaml"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_cancellation_is_shared() {
        let cancel = CancellationToken::new();
        let wait = WaitProfile::default().to_wait_config(cancel.clone()).unwrap();
        cancel.cancel();
        assert!(wait.cancel.is_cancelled());
    }
}
