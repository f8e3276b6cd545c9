//! Offline analysis of a captured event stream
//!
//! Pairs the k-th `C` line of each signal with its k-th `D` line to measure
//! detection latency, and checks the acknowledgement property: with a
//! handshake in place no signal is activated twice without a detection in
//! between.

use crate::types::{DetectorError, EventKind, Result, SignalEvent, TimestampUs};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::io::BufRead;

/// Parse an event stream; blank lines are skipped
pub fn parse_events(input: &str) -> Result<Vec<SignalEvent>> {
    read_events(input.as_bytes())
}

/// Read an event stream line by line
pub fn read_events<R: BufRead>(reader: R) -> Result<Vec<SignalEvent>> {
    let mut events = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let event = line.parse::<SignalEvent>().map_err(|reason| DetectorError::Parse {
            line: index + 1,
            reason,
        })?;
        events.push(event);
    }
    Ok(events)
}

/// Detection latency over a stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyReport {
    /// `C` lines considered
    pub changes: usize,
    /// `D` lines considered
    pub detections: usize,
    /// `C`/`D` pairs measured
    pub matched: usize,
    /// Sum of positive `D - C` delays
    pub total_delay_us: u64,
    /// `total_delay_us / changes`
    pub average_delay_us: f64,
    /// Largest single delay
    pub max_delay_us: u64,
    /// Signals whose `C` and `D` counts differ
    pub unmatched_signals: Vec<usize>,
    /// True if an odd trailing line was ignored
    pub dropped_trailing: bool,
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "total delay = {}, average delay = {}",
            self.total_delay_us, self.average_delay_us
        )
    }
}

#[derive(Default)]
struct SignalTimes {
    changes: Vec<TimestampUs>,
    detections: Vec<TimestampUs>,
}

/// Measure latency between changes and their detections
///
/// A run cut short may end with an activation that was never detected; when
/// the stream has an odd number of lines the last one is ignored. Negative
/// delays (detector clock read before the generator's) count as zero.
pub fn latency_report(events: &[SignalEvent]) -> LatencyReport {
    let dropped_trailing = events.len() % 2 == 1;
    let events = if dropped_trailing {
        &events[..events.len() - 1]
    } else {
        events
    };

    let mut per_signal: BTreeMap<usize, SignalTimes> = BTreeMap::new();
    for event in events {
        let times = per_signal.entry(event.signal).or_default();
        match event.kind {
            EventKind::Change => times.changes.push(event.timestamp),
            EventKind::Detection => times.detections.push(event.timestamp),
        }
    }

    let mut report = LatencyReport {
        changes: 0,
        detections: 0,
        matched: 0,
        total_delay_us: 0,
        average_delay_us: 0.0,
        max_delay_us: 0,
        unmatched_signals: Vec::new(),
        dropped_trailing,
    };

    for (signal, times) in &per_signal {
        report.changes += times.changes.len();
        report.detections += times.detections.len();
        if times.changes.len() != times.detections.len() {
            report.unmatched_signals.push(*signal);
        }
        for (changed, detected) in times.changes.iter().zip(&times.detections) {
            let delay = detected.saturating_sub(*changed);
            report.total_delay_us += delay;
            report.max_delay_us = report.max_delay_us.max(delay);
            report.matched += 1;
        }
    }

    if report.changes > 0 {
        report.average_delay_us = report.total_delay_us as f64 / report.changes as f64;
    }
    report
}

/// A second activation of `signal` before the first was detected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeViolation {
    pub signal: usize,
    /// Position of the offending `C` event in the stream
    pub position: usize,
}

impl fmt::Display for HandshakeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "signal {} activated again at event {} without a detection",
            self.signal, self.position
        )
    }
}

/// Find every `C` that follows another `C` of the same signal with no `D` between
pub fn check_handshake(events: &[SignalEvent]) -> Vec<HandshakeViolation> {
    let mut pending = HashSet::new();
    let mut violations = Vec::new();

    for (position, event) in events.iter().enumerate() {
        match event.kind {
            EventKind::Change => {
                if !pending.insert(event.signal) {
                    violations.push(HandshakeViolation {
                        signal: event.signal,
                        position,
                    });
                }
            }
            EventKind::Detection => {
                pending.remove(&event.signal);
            }
        }
    }
    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    const STREAM: &str = "\
C 0 100
D 0 130
C 3 200

D 3 260
C 0 400
D 0 390
";

    #[test]
    fn test_parse_skips_blank_lines() {
        let events = parse_events(STREAM).unwrap();
        assert_eq!(events.len(), 6);
        assert_eq!(events[3], SignalEvent::detection(3, 260));
    }

    #[test]
    fn test_parse_reports_line_number() {
        let err = parse_events("C 0 1\nD x 2\n").unwrap_err();
        assert!(matches!(err, DetectorError::Parse { line: 2, .. }));
    }

    #[test]
    fn test_latency_totals() {
        let events = parse_events(STREAM).unwrap();
        let report = latency_report(&events);

        assert_eq!(report.changes, 3);
        assert_eq!(report.detections, 3);
        assert_eq!(report.matched, 3);
        // 30 + 60 + 0 (negative delay clamps)
        assert_eq!(report.total_delay_us, 90);
        assert_eq!(report.average_delay_us, 30.0);
        assert_eq!(report.max_delay_us, 60);
        assert!(report.unmatched_signals.is_empty());
        assert!(!report.dropped_trailing);
        assert_eq!(report.to_string(), "total delay = 90, average delay = 30");
    }

    #[test]
    fn test_odd_trailing_line_dropped() {
        let mut events = parse_events(STREAM).unwrap();
        events.push(SignalEvent::change(7, 999));

        let report = latency_report(&events);
        assert!(report.dropped_trailing);
        assert_eq!(report.changes, 3);
    }

    #[test]
    fn test_unmatched_signals() {
        let events = vec![
            SignalEvent::change(1, 10),
            SignalEvent::change(1, 20),
            SignalEvent::detection(1, 15),
            SignalEvent::change(2, 30),
        ];
        let report = latency_report(&events);
        assert_eq!(report.unmatched_signals, vec![1, 2]);
        assert_eq!(report.matched, 1);
    }

    #[test]
    fn test_empty_stream() {
        let report = latency_report(&[]);
        assert_eq!(report.changes, 0);
        assert_eq!(report.average_delay_us, 0.0);
    }

    #[test]
    fn test_handshake_check() {
        let ok = vec![
            SignalEvent::change(0, 1),
            SignalEvent::change(1, 2),
            SignalEvent::detection(0, 3),
            SignalEvent::change(0, 4),
            // detection may be written before its change line
            SignalEvent::detection(1, 5),
            SignalEvent::change(1, 4),
        ];
        assert!(check_handshake(&ok).is_empty());

        let bad = vec![
            SignalEvent::change(4, 1),
            SignalEvent::detection(5, 2),
            SignalEvent::change(4, 3),
        ];
        assert_eq!(
            check_handshake(&bad),
            vec![HandshakeViolation { signal: 4, position: 2 }]
        );
    }
}
