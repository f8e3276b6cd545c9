//! Shared signal tables
//!
//! The [`SignalBank`] holds the values written by the generator and read by
//! the detectors, the toggle timestamps, and the acknowledgement handshake.
//! The last-seen values live in a separate [`LastSeenTable`] that is split
//! into one mutable slice per detector range, so each slot has exactly one
//! owner.

use crate::bits;
use crate::config::AckMode;
use crate::handshake::Handshake;
use crate::plan::{Plan, Range};
use crate::types::{now_us, DetectorError, Result, TimestampUs};
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Allocate a table of `len` entries, failing instead of aborting on OOM
pub(crate) fn allocate<T>(table: &'static str, len: usize, mut init: impl FnMut() -> T) -> Result<Vec<T>> {
    let mut values = Vec::new();
    values
        .try_reserve_exact(len)
        .map_err(|_| DetectorError::Allocation { table, len })?;
    values.extend((0..len).map(|_| init()));
    Ok(values)
}

/// Result of one generator toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toggle {
    /// True if the signal is now active
    pub activated: bool,
    /// Time recorded just before the new value became visible
    pub timestamp: TimestampUs,
}

/// Values, timestamps and handshake shared between generator and detectors
pub struct SignalBank {
    plan: Plan,
    /// One entry per signal, or one 32-signal word per entry when bit-packed
    current: Vec<AtomicU32>,
    /// Last toggle time per signal
    timestamps: Vec<AtomicU64>,
    handshake: Handshake,
}

impl SignalBank {
    /// Allocate all shared tables for `plan`
    pub fn new(plan: Plan, ack_mode: AckMode) -> Result<Self> {
        let current = allocate("signal", plan.total_n, || AtomicU32::new(0))?;
        let timestamps = allocate("timestamp", plan.signals, || AtomicU64::new(0))?;
        let handshake = Handshake::new(ack_mode, plan.signals)?;

        log::debug!(
            "Allocated signal bank: {} slots, {} signals, ack={}",
            plan.total_n,
            plan.signals,
            ack_mode
        );

        Ok(Self {
            plan,
            current,
            timestamps,
            handshake,
        })
    }

    pub fn handshake(&self) -> &Handshake {
        &self.handshake
    }

    /// Number of signals
    pub fn signals(&self) -> usize {
        self.plan.signals
    }

    /// Number of value slots
    pub fn slots(&self) -> usize {
        self.current.len()
    }

    /// Flip `signal`; generator only
    pub fn toggle(&self, signal: usize) -> Toggle {
        self.toggle_with(signal, |_| {})
    }

    /// Flip `signal`, running `announce` before the new value is published
    ///
    /// The timestamp is stored and `announce` runs before the flip becomes
    /// visible, so a detector that sees the new value also sees the new
    /// timestamp, and anything `announce` writes precedes the detector's output.
    pub fn toggle_with(&self, signal: usize, announce: impl FnOnce(Toggle)) -> Toggle {
        let timestamp = now_us();
        self.timestamps[signal].store(timestamp, Ordering::Relaxed);

        let (slot, bit) = if self.plan.is_bit_packed() {
            bits::locate(signal)
        } else {
            (signal, 0)
        };
        // The generator is the only writer, so its own load is current.
        let previous = self.current[slot].load(Ordering::Relaxed);
        let (_, activated) = bits::toggle(previous, bit);
        let toggle = Toggle {
            activated,
            timestamp,
        };

        announce(toggle);
        self.current[slot].fetch_xor(1 << bit, Ordering::Release);
        toggle
    }

    /// Current raw value of `slot` (a 0/1 signal, or a packed word)
    #[inline]
    pub fn load(&self, slot: usize) -> u32 {
        self.current[slot].load(Ordering::Acquire)
    }

    /// Current logical value of `signal`
    pub fn value(&self, signal: usize) -> bool {
        if self.plan.is_bit_packed() {
            let (word, bit) = bits::locate(signal);
            (self.load(word) >> bit) & 1 == 1
        } else {
            self.load(signal) != 0
        }
    }

    /// Time of the most recent toggle of `signal` (0 if never toggled)
    pub fn timestamp(&self, signal: usize) -> TimestampUs {
        self.timestamps[signal].load(Ordering::Relaxed)
    }
}

/// Detector-private last-seen values, one per slot
pub struct LastSeenTable {
    values: Vec<u32>,
}

impl LastSeenTable {
    pub fn new(slots: usize) -> Result<Self> {
        Ok(Self {
            values: allocate("last-seen", slots, || 0)?,
        })
    }

    /// Split into disjoint slices, one per range
    ///
    /// `ranges` must tile the table in order, as produced by [`Plan::ranges`].
    pub fn split(&mut self, ranges: &[Range]) -> Vec<&mut [u32]> {
        let mut rest: &mut [u32] = &mut self.values;
        let mut chunks = Vec::with_capacity(ranges.len());
        for range in ranges {
            let (chunk, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
            chunks.push(chunk);
            rest = tail;
        }
        debug_assert!(rest.is_empty(), "ranges do not cover the last-seen table");
        chunks
    }
}
