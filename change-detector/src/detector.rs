//! Range detectors
//!
//! Each detector thread owns a contiguous range of slots and the matching
//! slice of last-seen values. It polls the slots round-robin, compares each
//! with its last-seen value and reports `D` lines for activations.
//!
//! The three strategies differ only in what a slot is:
//! - `Single`: a range of exactly one signal
//! - `Multi`: a range of several signals
//! - `BitPacked`: a range of 32-signal words; one changed bit is consumed per
//!   poll, the most significant one, and the remaining bits stay visible for
//!   later polls

use crate::bank::SignalBank;
use crate::bits;
use crate::plan::{Range, Strategy};
use crate::sink::EventSink;
use crate::types::{now_us, SignalEvent};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Counters reported by a detector when it stops
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorStats {
    pub id: usize,
    pub range: Range,
    /// Changes consumed (activations and deactivations)
    pub changes: u64,
    /// Activations reported with a `D` line
    pub detections: u64,
}

/// A change consumed by one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observed {
    pub signal: usize,
    pub activated: bool,
}

pub struct RangeDetector<'a> {
    id: usize,
    strategy: Strategy,
    range: Range,
    bank: &'a SignalBank,
    last_seen: &'a mut [u32],
    sink: &'a dyn EventSink,
    /// Offset of the next slot to poll, relative to `range.start`
    cursor: usize,
    changes: u64,
    detections: u64,
}

impl<'a> RangeDetector<'a> {
    pub fn new(
        id: usize,
        strategy: Strategy,
        range: Range,
        bank: &'a SignalBank,
        last_seen: &'a mut [u32],
        sink: &'a dyn EventSink,
    ) -> Self {
        debug_assert!(!range.is_empty(), "detector {} has an empty range", id);
        debug_assert_eq!(range.len(), last_seen.len());
        debug_assert!(range.end <= bank.slots());

        Self {
            id,
            strategy,
            range,
            bank,
            last_seen,
            sink,
            cursor: 0,
            changes: 0,
            detections: 0,
        }
    }

    /// Poll until `stop` is raised
    pub fn run(mut self, stop: &AtomicBool) -> DetectorStats {
        log::debug!(
            "Detector {} started: {} slots {}..{}",
            self.id,
            self.strategy,
            self.range.start,
            self.range.end
        );

        while !stop.load(Ordering::Relaxed) {
            self.poll();
        }

        log::debug!(
            "Detector {} stopped: {} changes, {} detections",
            self.id,
            self.changes,
            self.detections
        );
        self.stats()
    }

    /// Check the slot under the cursor and advance
    ///
    /// Returns the change consumed, if the slot differed from its last-seen value.
    pub fn poll(&mut self) -> Option<Observed> {
        let offset = self.cursor;
        let slot = self.range.start + offset;
        self.cursor = if offset + 1 < self.range.len() { offset + 1 } else { 0 };

        let current = self.bank.load(slot);
        let old = self.last_seen[offset];
        if current == old {
            return None;
        }

        let (signal, bit) = match self.strategy {
            Strategy::BitPacked => {
                let bit = bits::msb_changed(current, old);
                (bits::global_index(slot, bit), bit)
            }
            Strategy::Single | Strategy::Multi => (slot, 0),
        };
        let activated = (current >> bit) & 1 == 1;

        let last_seen = &mut self.last_seen[offset];
        let sink = self.sink;
        self.bank.handshake().consume(signal, || {
            // Only the consumed bit; other changed bits in the word stay pending.
            *last_seen ^= 1 << bit;
            if activated {
                sink.emit(SignalEvent::detection(signal, now_us()));
            }
        });

        self.changes += 1;
        if activated {
            self.detections += 1;
        }
        Some(Observed { signal, activated })
    }

    pub fn stats(&self) -> DetectorStats {
        DetectorStats {
            id: self.id,
            range: self.range,
            changes: self.changes,
            detections: self.detections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bank::LastSeenTable;
    use crate::config::AckMode;
    use crate::plan::Plan;
    use crate::sink::MemorySink;
    use crate::types::EventKind;

    fn detector<'a>(
        plan: &Plan,
        tid: usize,
        bank: &'a SignalBank,
        table: &'a mut LastSeenTable,
        sink: &'a MemorySink,
    ) -> RangeDetector<'a> {
        let ranges = plan.ranges();
        let range = ranges[tid];
        let last_seen = table.split(&ranges).swap_remove(tid);
        RangeDetector::new(tid, plan.strategy, range, bank, last_seen, sink)
    }

    #[test]
    fn test_single_detects_activation_only() {
        let plan = Plan::select(1, 4);
        let bank = SignalBank::new(plan, AckMode::None).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        let mut det = detector(&plan, 0, &bank, &mut table, &sink);

        assert_eq!(det.poll(), None);

        let toggle = bank.toggle(0);
        assert_eq!(det.poll(), Some(Observed { signal: 0, activated: true }));
        assert_eq!(det.poll(), None);

        bank.toggle(0);
        assert_eq!(det.poll(), Some(Observed { signal: 0, activated: false }));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Detection);
        assert!(events[0].timestamp >= toggle.timestamp);
        assert_eq!(det.stats().detections, 1);
        assert_eq!(det.stats().changes, 2);
    }

    #[test]
    fn test_multi_round_robin() {
        // 10 signals over 4 threads: thread 1 owns 3..6
        let plan = Plan::select(10, 4);
        let bank = SignalBank::new(plan, AckMode::None).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        let mut det = detector(&plan, 1, &bank, &mut table, &sink);

        bank.toggle(5);
        bank.toggle(0); // owned by thread 0

        let observed: Vec<_> = (0..6).filter_map(|_| det.poll()).collect();
        assert_eq!(observed, vec![Observed { signal: 5, activated: true }]);
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_bit_packed_drains_msb_first() {
        let plan = Plan::select(200, 4);
        let bank = SignalBank::new(plan, AckMode::None).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        // 7 words over 4 threads: thread 0 owns words 0..2
        let mut det = detector(&plan, 0, &bank, &mut table, &sink);

        bank.toggle(33);
        bank.toggle(40);
        bank.toggle(2);

        let observed: Vec<usize> = (0..8).filter_map(|_| det.poll()).map(|o| o.signal).collect();
        // word 0 first (bit 2), then word 1 MSB first across passes
        assert_eq!(observed, vec![2, 40, 33]);

        let signals: Vec<usize> = sink.events().iter().map(|e| e.signal).collect();
        assert_eq!(signals, vec![2, 40, 33]);
        assert_eq!(det.poll(), None);
    }

    #[test]
    fn test_bit_packed_deactivation_not_reported() {
        let plan = Plan::select(128, 4);
        let bank = SignalBank::new(plan, AckMode::None).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        let mut det = detector(&plan, 3, &bank, &mut table, &sink);

        bank.toggle(127);
        assert_eq!(det.poll(), Some(Observed { signal: 127, activated: true }));
        bank.toggle(127);
        assert_eq!(det.poll(), Some(Observed { signal: 127, activated: false }));
        assert_eq!(sink.len(), 1);
    }

    #[test]
    fn test_consume_acknowledges() {
        let plan = Plan::select(4, 4);
        let bank = SignalBank::new(plan, AckMode::Spin).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        let stop = AtomicBool::new(false);
        let mut det = detector(&plan, 2, &bank, &mut table, &sink);

        bank.handshake().produce(2, &stop, || bank.toggle(2)).unwrap();
        assert!(!bank.handshake().is_acknowledged(2));

        det.poll();
        assert!(bank.handshake().is_acknowledged(2));
    }

    #[test]
    fn test_run_exits_on_stop() {
        let plan = Plan::select(2, 2);
        let bank = SignalBank::new(plan, AckMode::None).unwrap();
        let mut table = LastSeenTable::new(plan.total_n).unwrap();
        let sink = MemorySink::new();
        let det = detector(&plan, 1, &bank, &mut table, &sink);

        let stop = AtomicBool::new(true);
        let stats = det.run(&stop);
        assert_eq!(stats.id, 1);
        assert_eq!(stats.detections, 0);
    }
}
