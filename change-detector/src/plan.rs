//! Strategy selection and range partitioning
//!
//! A [`Plan`] fixes, once at startup, which detector strategy runs, how many
//! detector threads are opened and how many slots (signals or words) the shared
//! tables hold. Slots are split into contiguous ranges, one per thread.

use crate::bits::{words_for, WORD_BITS};
use crate::config::DetectorConfig;
use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Detector strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One thread per signal
    Single,
    /// Each thread round-robins over several signals
    Multi,
    /// Each thread round-robins over several 32-signal words
    BitPacked,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Single => write!(f, "single"),
            Strategy::Multi => write!(f, "multi"),
            Strategy::BitPacked => write!(f, "bit-packed"),
        }
    }
}

/// Contiguous, half-open span of slot indices owned by one detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub start: usize,
    pub end: usize,
}

impl Range {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Range owned by thread `tid` when `total` slots are split over `threads`
///
/// Every range holds `total / threads` slots and the first `total % threads`
/// threads take one extra.
pub fn partition(total: usize, threads: usize, tid: usize) -> Range {
    let base = total / threads;
    let extra = total % threads;
    let start = tid * base + tid.min(extra);
    let end = start + base + usize::from(tid < extra);
    Range { start, end }
}

/// All ranges for `threads` threads, in thread order
pub fn partition_all(total: usize, threads: usize) -> Vec<Range> {
    (0..threads)
        .map(|tid| partition(total, threads, tid))
        .collect()
}

/// Resolved layout for a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Plan {
    pub strategy: Strategy,
    /// Number of signals the generator toggles
    pub signals: usize,
    /// Number of detector threads to open
    pub open_threads: usize,
    /// Number of slots in the value tables (signals, or words when bit-packed)
    pub total_n: usize,
}

impl Plan {
    /// Choose a strategy for `signals` signals and `requested_threads` threads
    pub fn select(signals: usize, requested_threads: usize) -> Plan {
        if signals / requested_threads >= WORD_BITS {
            Plan {
                strategy: Strategy::BitPacked,
                signals,
                open_threads: requested_threads,
                total_n: words_for(signals),
            }
        } else if signals > requested_threads {
            Plan {
                strategy: Strategy::Multi,
                signals,
                open_threads: requested_threads,
                total_n: signals,
            }
        } else {
            Plan {
                strategy: Strategy::Single,
                signals,
                open_threads: signals,
                total_n: signals,
            }
        }
    }

    /// Validate `config` and choose a plan for it
    pub fn from_config(config: &DetectorConfig) -> Result<Plan> {
        config.validate()?;
        Ok(Self::select(config.signals, config.requested_threads))
    }

    pub fn is_bit_packed(&self) -> bool {
        self.strategy == Strategy::BitPacked
    }

    /// Slot ranges for every detector thread
    pub fn ranges(&self) -> Vec<Range> {
        partition_all(self.total_n, self.open_threads)
    }
}
