//! Core types for the change detector library
//!
//! This module defines the events emitted on the output stream, the error type
//! shared by every component, and the microsecond clock used for timestamps.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Timestamp in microseconds since the Unix epoch
pub type TimestampUs = u64;

/// Result type for detector operations
pub type Result<T> = std::result::Result<T, DetectorError>;

/// Errors that can occur while configuring or running the detector
#[derive(Debug, thiserror::Error)]
pub enum DetectorError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to allocate {table} table with {len} entries")]
    Allocation { table: &'static str, len: usize },

    #[error("Failed to spawn thread {name}: {source}")]
    ThreadSpawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Thread panicked: {0}")]
    ThreadPanic(String),

    #[error("Failed to parse event line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Current wall-clock time in microseconds since the epoch
///
/// Computed as `seconds * 1_000_000 + microseconds_of_second`.
pub fn now_us() -> TimestampUs {
    let now = Utc::now();
    let secs = now.timestamp() as u64;
    let micros = u64::from(now.timestamp_subsec_micros());
    secs * 1_000_000 + micros
}

/// Kind of line on the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// Generator toggled a signal into the active state (`C`)
    Change,
    /// Detector observed a signal becoming active (`D`)
    Detection,
}

impl EventKind {
    /// Single-letter tag used on the wire
    pub fn tag(self) -> char {
        match self {
            EventKind::Change => 'C',
            EventKind::Detection => 'D',
        }
    }
}

/// One line of the output protocol: `<tag> <signal_index> <timestamp_usec>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalEvent {
    pub kind: EventKind,
    pub signal: usize,
    pub timestamp: TimestampUs,
}

impl SignalEvent {
    pub fn change(signal: usize, timestamp: TimestampUs) -> Self {
        Self {
            kind: EventKind::Change,
            signal,
            timestamp,
        }
    }

    pub fn detection(signal: usize, timestamp: TimestampUs) -> Self {
        Self {
            kind: EventKind::Detection,
            signal,
            timestamp,
        }
    }
}

impl fmt::Display for SignalEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.kind.tag(), self.signal, self.timestamp)
    }
}

impl FromStr for SignalEvent {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let mut fields = s.split_whitespace();

        let kind = match fields.next() {
            Some("C") => EventKind::Change,
            Some("D") => EventKind::Detection,
            Some(other) => return Err(format!("unknown event tag {:?}", other)),
            None => return Err("empty line".to_string()),
        };

        let signal = fields
            .next()
            .ok_or("missing signal index")?
            .parse::<usize>()
            .map_err(|e| format!("bad signal index: {}", e))?;

        let timestamp = fields
            .next()
            .ok_or("missing timestamp")?
            .parse::<TimestampUs>()
            .map_err(|e| format!("bad timestamp: {}", e))?;

        if fields.next().is_some() {
            return Err("trailing fields".to_string());
        }

        Ok(Self {
            kind,
            signal,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_display() {
        assert_eq!(SignalEvent::change(3, 1_500_000).to_string(), "C 3 1500000");
        assert_eq!(SignalEvent::detection(0, 42).to_string(), "D 0 42");
    }

    #[test]
    fn test_event_parse() {
        let event: SignalEvent = "D 17 1445000000123456".parse().unwrap();
        assert_eq!(event.kind, EventKind::Detection);
        assert_eq!(event.signal, 17);
        assert_eq!(event.timestamp, 1_445_000_000_123_456);

        assert!("X 1 2".parse::<SignalEvent>().is_err());
        assert!("C 1".parse::<SignalEvent>().is_err());
        assert!("C one 2".parse::<SignalEvent>().is_err());
        assert!("C 1 2 3".parse::<SignalEvent>().is_err());
    }

    #[test]
    fn test_now_is_microseconds() {
        let a = now_us();
        let b = now_us();
        assert!(b >= a);
        // Sanity: after 2015-01-01 in microseconds
        assert!(a > 1_420_070_400_000_000);
    }
}
