//! Configuration loading and parsing
//!
//! An optional TOML file supplies defaults for the run; positional arguments
//! and flags on the command line take precedence over it.

use anyhow::{Context, Result};
use change_detector::config::{
    DEFAULT_EXECUTION_TIME_SECS, DEFAULT_GRACE_PERIOD_US, DEFAULT_REQUESTED_THREADS,
    DEFAULT_TIME_MULTIPLIER_US,
};
use change_detector::{AckMode, DetectorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Main application configuration (loaded from a TOML file)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub run: RunConfig,
}

/// `[run]` section; every field is optional
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RunConfig {
    pub signals: Option<usize>,
    pub time_multiplier_us: Option<u64>,
    pub execution_time_secs: Option<u64>,
    pub requested_threads: Option<usize>,
    pub ack: Option<AckMode>,
    pub grace_period_us: Option<u64>,
    pub seed: Option<u64>,
}

/// Values taken from the command line, each overriding the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub signals: Option<usize>,
    pub time_multiplier_us: Option<u64>,
    pub execution_time_secs: Option<u64>,
    pub requested_threads: Option<usize>,
    pub ack: Option<AckMode>,
    pub grace_period_us: Option<u64>,
    pub seed: Option<u64>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

impl AppConfig {
    /// Merge command-line overrides over file values over built-in defaults
    ///
    /// Returns `None` if no signal count was given anywhere.
    pub fn resolve(&self, overrides: &Overrides) -> Option<DetectorConfig> {
        let run = &self.run;
        let signals = overrides.signals.or(run.signals)?;

        let mut config = DetectorConfig::new(signals)
            .with_time_multiplier_us(
                overrides
                    .time_multiplier_us
                    .or(run.time_multiplier_us)
                    .unwrap_or(DEFAULT_TIME_MULTIPLIER_US),
            )
            .with_execution_time_secs(
                overrides
                    .execution_time_secs
                    .or(run.execution_time_secs)
                    .unwrap_or(DEFAULT_EXECUTION_TIME_SECS),
            )
            .with_requested_threads(
                overrides
                    .requested_threads
                    .or(run.requested_threads)
                    .unwrap_or(DEFAULT_REQUESTED_THREADS),
            )
            .with_ack_mode(overrides.ack.or(run.ack).unwrap_or_default())
            .with_grace_period_us(
                overrides
                    .grace_period_us
                    .or(run.grace_period_us)
                    .unwrap_or(DEFAULT_GRACE_PERIOD_US),
            );

        if let Some(seed) = overrides.seed.or(run.seed) {
            config = config.with_seed(seed);
        }
        Some(config)
    }
}
