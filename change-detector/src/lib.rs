//! Multiple Change Detector Library
//!
//! Monitors N boolean signals that a generator thread toggles at random
//! intervals, and reports every inactive→active transition with a microsecond
//! timestamp.
//!
//! # Architecture
//!
//! - A single generator thread toggles random signals in a shared
//!   [`SignalBank`] and writes `C <signal> <usec>` for each activation
//! - A pool of detector threads busy-polls disjoint ranges of the bank and
//!   writes `D <signal> <usec>` for each activation it observes
//! - When there are at least 32 signals per thread the bank is bit-packed
//!   and detectors poll whole words
//! - An optional acknowledgement handshake stops the generator from
//!   overwriting a change its detector has not consumed yet
//!
//! Argument parsing, configuration files and logging setup live in the
//! application layer (change-detector-cli).
//!
//! # Example Usage
//!
//! ```no_run
//! use change_detector::{AckMode, DetectorConfig, Supervisor, WriterSink};
//!
//! let config = DetectorConfig::new(200)
//!     .with_requested_threads(4)
//!     .with_time_multiplier_us(1000)
//!     .with_execution_time_secs(2)
//!     .with_ack_mode(AckMode::Spin);
//!
//! let sink = WriterSink::new(std::io::stdout());
//! let summary = Supervisor::new(config, &sink).unwrap().run().unwrap();
//! eprintln!("{} detections", summary.detections());
//! ```

// Public modules
pub mod analysis;
pub mod bank;
pub mod bits;
pub mod config;
pub mod detector;
pub mod generator;
pub mod handshake;
pub mod plan;
pub mod sink;
pub mod supervisor;
pub mod types;

// Re-export main types for convenience
pub use analysis::{check_handshake, latency_report, HandshakeViolation, LatencyReport};
pub use bank::{LastSeenTable, SignalBank};
pub use config::{AckMode, DetectorConfig};
pub use detector::{DetectorStats, RangeDetector};
pub use generator::{GeneratorStats, SignalGenerator};
pub use plan::{Plan, Range, Strategy};
pub use sink::{EventSink, MemorySink, WriterSink};
pub use supervisor::{RunSummary, Supervisor};
pub use types::{DetectorError, EventKind, Result, SignalEvent, TimestampUs};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
