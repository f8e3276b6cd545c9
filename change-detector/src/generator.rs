//! Random signal generator
//!
//! A single thread that repeatedly sleeps a random multiple of the time
//! multiplier, picks a random signal and toggles it, reporting activations
//! with `C` lines.

use crate::bank::SignalBank;
use crate::sink::EventSink;
use crate::types::SignalEvent;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

/// Counters reported by the generator when it stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratorStats {
    /// Total toggles applied
    pub toggles: u64,
    /// Toggles that left the signal active (one `C` line each)
    pub activations: u64,
}

pub struct SignalGenerator<'a> {
    bank: &'a SignalBank,
    sink: &'a dyn EventSink,
    time_multiplier_us: u64,
    rng: StdRng,
    stats: GeneratorStats,
}

impl<'a> SignalGenerator<'a> {
    pub fn new(bank: &'a SignalBank, sink: &'a dyn EventSink, time_multiplier_us: u64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            bank,
            sink,
            time_multiplier_us,
            rng,
            stats: GeneratorStats::default(),
        }
    }

    /// Run iterations until `stop` is raised
    pub fn run(mut self, stop: &AtomicBool) -> GeneratorStats {
        log::debug!(
            "Generator started: {} signals, multiplier {} us",
            self.bank.signals(),
            self.time_multiplier_us
        );

        while !stop.load(Ordering::Relaxed) {
            self.step(stop);
        }

        log::debug!(
            "Generator stopped after {} toggles ({} activations)",
            self.stats.toggles,
            self.stats.activations
        );
        self.stats
    }

    /// One iteration: sleep, pick a signal, toggle it
    ///
    /// Returns the toggled signal, or `None` if `stop` was raised while
    /// waiting for an acknowledgement.
    pub fn step(&mut self, stop: &AtomicBool) -> Option<usize> {
        let ticks = draw_ticks(&mut self.rng);
        if let Some(pause) = pause_for(self.time_multiplier_us, ticks) {
            thread::sleep(pause);
        }

        let signal = self.rng.gen_range(0..self.bank.signals());
        let bank = self.bank;
        let sink = self.sink;

        let toggle = bank.handshake().produce(signal, stop, || {
            bank.toggle_with(signal, |toggle| {
                if toggle.activated {
                    sink.emit(SignalEvent::change(signal, toggle.timestamp));
                }
            })
        })?;

        self.stats.toggles += 1;
        if toggle.activated {
            self.stats.activations += 1;
        }
        Some(signal)
    }

    pub fn stats(&self) -> GeneratorStats {
        self.stats
    }
}

/// Multiplier ticks to sleep before the next toggle, uniform in 1..=10
fn draw_ticks(rng: &mut impl Rng) -> u64 {
    rng.gen_range(1..=10)
}

/// Pause of `ticks * T` microseconds; none when `T` is 0
fn pause_for(time_multiplier_us: u64, ticks: u64) -> Option<Duration> {
    (time_multiplier_us > 0).then(|| Duration::from_micros(ticks.saturating_mul(time_multiplier_us)))
}
