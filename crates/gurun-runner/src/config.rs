//! Runner configuration.
//!
//! A [`RunnerConfig`] can be built in code or loaded from a TOML file:
//!
//! ```toml
//! interval_secs = 2.5
//! max_iterations = 100
//! verbose = true
//! handle_signals = false
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, RunnerError};

/// Default pause between loop iterations, in seconds.
pub const DEFAULT_INTERVAL_SECS: f64 = 5.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunnerConfig {
    /// Pause after each pass over the nodes.
    pub interval_secs: f64,
    /// Stop after this many passes.  `None` runs until interrupted.
    pub max_iterations: Option<u64>,
    /// Log every child run at `info` instead of `debug`.
    pub verbose: bool,
    /// Install SIGINT/SIGTERM handlers when the run starts.
    pub handle_signals: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_INTERVAL_SECS,
            max_iterations: None,
            verbose: false,
            handle_signals: true,
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval_secs(mut self, secs: f64) -> Self {
        self.interval_secs = secs;
        self
    }

    pub fn with_max_iterations(mut self, max: u64) -> Self {
        self.max_iterations = Some(max);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn with_handle_signals(mut self, handle: bool) -> Self {
        self.handle_signals = handle;
        self
    }

    /// The iteration pause as a [`Duration`].
    ///
    /// Call [`validate`](Self::validate) first; out-of-range values
    /// collapse to zero here.
    pub fn interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.interval_secs).unwrap_or(Duration::ZERO)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.interval_secs.is_finite() || self.interval_secs < 0.0 {
            return Err(RunnerError::Config {
                reason: format!(
                    "interval_secs must be a non-negative number, got {}",
                    self.interval_secs
                ),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!(path = ?path, "runner configuration loaded");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.interval(), Duration::from_secs(5));
        assert_eq!(config.max_iterations, None);
        assert!(!config.verbose);
        assert!(config.handle_signals);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = RunnerConfig::from_toml_str("max_iterations = 3").unwrap();
        assert_eq!(config.max_iterations, Some(3));
        assert_eq!(config.interval_secs, DEFAULT_INTERVAL_SECS);
    }

    #[test]
    fn fractional_interval() {
        let config = RunnerConfig::from_toml_str("interval_secs = 0.25").unwrap();
        assert_eq!(config.interval(), Duration::from_millis(250));
    }

    #[test]
    fn negative_interval_rejected() {
        let err = RunnerConfig::from_toml_str("interval_secs = -1.0").unwrap_err();
        assert!(matches!(err, RunnerError::Config { .. }));

        let err = RunnerConfig::new()
            .with_interval_secs(f64::NAN)
            .validate()
            .unwrap_err();
        assert!(matches!(err, RunnerError::Config { .. }));
    }

    #[test]
    fn unknown_key_is_a_parse_error() {
        let err = RunnerConfig::from_toml_str("intervall = 3").unwrap_err();
        assert!(matches!(err, RunnerError::Toml(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "interval_secs = 1\nverbose = true").unwrap();

        let config = RunnerConfig::load(file.path()).unwrap();
        assert_eq!(config.interval(), Duration::from_secs(1));
        assert!(config.verbose);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = RunnerConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, RunnerError::Io(_)));
    }
}
