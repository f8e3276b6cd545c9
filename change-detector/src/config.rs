//! Detector configuration types
//!
//! This module defines the knobs the engine exposes: signal count, timing
//! constants, requested thread count and the acknowledgement mode. Argument
//! parsing and file loading live in the application layer.

use crate::types::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default generator time multiplier in microseconds
pub const DEFAULT_TIME_MULTIPLIER_US: u64 = 100_000;

/// Default run duration in seconds
pub const DEFAULT_EXECUTION_TIME_SECS: u64 = 20;

/// Default number of detector threads
pub const DEFAULT_REQUESTED_THREADS: usize = 4;

/// Default pause between stopping the generator and stopping the detectors
pub const DEFAULT_GRACE_PERIOD_US: u64 = 500;

/// Generator/detector acknowledgement protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AckMode {
    /// No handshake; a detector may miss a change that is overwritten
    #[default]
    None,
    /// Generator busy-waits on a per-signal flag
    Spin,
    /// Generator blocks on a per-signal condition variable
    Condvar,
}

impl AckMode {
    pub fn is_enabled(self) -> bool {
        !matches!(self, AckMode::None)
    }
}

impl fmt::Display for AckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckMode::None => write!(f, "none"),
            AckMode::Spin => write!(f, "spin"),
            AckMode::Condvar => write!(f, "condvar"),
        }
    }
}

impl FromStr for AckMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "off" => Ok(AckMode::None),
            "spin" => Ok(AckMode::Spin),
            "condvar" | "cv" => Ok(AckMode::Condvar),
            other => Err(format!(
                "unknown acknowledgement mode {:?} (expected none, spin or condvar)",
                other
            )),
        }
    }
}

/// Configuration for a single detector run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Number of signals to monitor
    pub signals: usize,

    /// Generator sleeps between `1 * T` and `10 * T` microseconds (0 = no sleep)
    #[serde(default = "default_time_multiplier")]
    pub time_multiplier_us: u64,

    /// How long the generator runs, in milliseconds
    #[serde(default = "default_execution_time_ms")]
    pub execution_time_ms: u64,

    /// Requested number of detector threads
    #[serde(default = "default_requested_threads")]
    pub requested_threads: usize,

    /// Acknowledgement protocol between generator and detectors
    #[serde(default)]
    pub ack_mode: AckMode,

    /// Pause before stopping detectors when acknowledgement is disabled
    #[serde(default = "default_grace_period")]
    pub grace_period_us: u64,

    /// Optional: fixed seed for the generator's random source
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_time_multiplier() -> u64 {
    DEFAULT_TIME_MULTIPLIER_US
}

fn default_execution_time_ms() -> u64 {
    DEFAULT_EXECUTION_TIME_SECS * 1000
}

fn default_requested_threads() -> usize {
    DEFAULT_REQUESTED_THREADS
}

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD_US
}

impl DetectorConfig {
    /// Create a configuration for `signals` signals with default settings
    pub fn new(signals: usize) -> Self {
        Self {
            signals,
            time_multiplier_us: default_time_multiplier(),
            execution_time_ms: default_execution_time_ms(),
            requested_threads: default_requested_threads(),
            ack_mode: AckMode::default(),
            grace_period_us: default_grace_period(),
            seed: None,
        }
    }

    /// Builder method: set the generator time multiplier
    pub fn with_time_multiplier_us(mut self, micros: u64) -> Self {
        self.time_multiplier_us = micros;
        self
    }

    /// Builder method: set the run duration in whole seconds
    pub fn with_execution_time_secs(mut self, secs: u64) -> Self {
        self.execution_time_ms = secs.saturating_mul(1000);
        self
    }

    /// Builder method: set the run duration in milliseconds
    pub fn with_execution_time_ms(mut self, millis: u64) -> Self {
        self.execution_time_ms = millis;
        self
    }

    /// Builder method: set the requested detector thread count
    pub fn with_requested_threads(mut self, threads: usize) -> Self {
        self.requested_threads = threads;
        self
    }

    /// Builder method: set the acknowledgement mode
    pub fn with_ack_mode(mut self, mode: AckMode) -> Self {
        self.ack_mode = mode;
        self
    }

    /// Builder method: set the shutdown grace period
    pub fn with_grace_period_us(mut self, micros: u64) -> Self {
        self.grace_period_us = micros;
        self
    }

    /// Builder method: seed the generator
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn execution_time(&self) -> Duration {
        Duration::from_millis(self.execution_time_ms)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_micros(self.grace_period_us)
    }

    /// Reject configurations that cannot start a run
    pub fn validate(&self) -> Result<()> {
        if self.signals == 0 {
            return Err(DetectorError::InvalidConfig(
                "signal count must be at least 1".to_string(),
            ));
        }
        if self.requested_threads == 0 {
            return Err(DetectorError::InvalidConfig(
                "requested thread count must be at least 1".to_string(),
            ));
        }
        if u32::try_from(self.signals).is_err() {
            return Err(DetectorError::InvalidConfig(format!(
                "signal count {} does not fit in 32 bits",
                self.signals
            )));
        }
        Ok(())
    }
}
