//! Run lifecycle
//!
//! The [`Supervisor`] chooses the plan, allocates the shared tables, starts
//! the detector threads and the generator thread, and after the configured
//! run duration stops them in order: generator first, then (after a short
//! grace period when no acknowledgement is used) the detectors.

use crate::bank::{LastSeenTable, SignalBank};
use crate::config::{AckMode, DetectorConfig};
use crate::detector::{DetectorStats, RangeDetector};
use crate::generator::{GeneratorStats, SignalGenerator};
use crate::plan::{Plan, Strategy};
use crate::sink::EventSink;
use crate::types::{DetectorError, Result};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Instant;

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub plan: Plan,
    pub ack_mode: AckMode,
    pub elapsed_ms: u64,
    pub generator: GeneratorStats,
    pub detectors: Vec<DetectorStats>,
}

impl RunSummary {
    /// Total `D` lines emitted by all detectors
    pub fn detections(&self) -> u64 {
        self.detectors.iter().map(|d| d.detections).sum()
    }
}

/// Raises a stop flag when dropped, so an early return from the thread
/// scope never leaves a polling loop running
struct StopOnDrop<'a>(&'a AtomicBool);

impl Drop for StopOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Relaxed);
    }
}

pub struct Supervisor<'s> {
    config: DetectorConfig,
    plan: Plan,
    sink: &'s dyn EventSink,
}

impl<'s> Supervisor<'s> {
    /// Validate `config` and choose a plan; nothing is started yet
    pub fn new(config: DetectorConfig, sink: &'s dyn EventSink) -> Result<Self> {
        let plan = Plan::from_config(&config)?;

        log::info!(
            "open threads: {} array elements: {} actual signals: {}",
            plan.open_threads,
            plan.total_n,
            plan.signals
        );
        log::info!(
            "strategy: {} (bit-packed: {}, multi: {}) ack: {}",
            plan.strategy,
            plan.strategy == Strategy::BitPacked,
            plan.strategy == Strategy::Multi,
            config.ack_mode
        );

        Ok(Self { config, plan, sink })
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Run generator and detectors for the configured duration
    pub fn run(&self) -> Result<RunSummary> {
        let bank = SignalBank::new(self.plan, self.config.ack_mode)?;
        let mut last_seen = LastSeenTable::new(self.plan.total_n)?;
        let ranges = self.plan.ranges();

        let generator_stop = AtomicBool::new(false);
        let detector_stop = AtomicBool::new(false);
        let started = Instant::now();

        let (generator, detectors) = thread::scope(|scope| -> Result<_> {
            let _stop_detectors = StopOnDrop(&detector_stop);
            let _stop_generator = StopOnDrop(&generator_stop);

            let mut handles = Vec::with_capacity(ranges.len());
            for (id, (range, slice)) in ranges.iter().zip(last_seen.split(&ranges)).enumerate() {
                let detector = RangeDetector::new(id, self.plan.strategy, *range, &bank, slice, self.sink);
                let stop = &detector_stop;
                let name = format!("detector-{}", id);
                let handle = thread::Builder::new()
                    .name(name.clone())
                    .spawn_scoped(scope, move || detector.run(stop))
                    .map_err(|source| DetectorError::ThreadSpawn { name, source })?;
                handles.push(handle);
            }

            let generator = SignalGenerator::new(
                &bank,
                self.sink,
                self.config.time_multiplier_us,
                self.config.seed,
            );
            let stop = &generator_stop;
            let generator_handle = thread::Builder::new()
                .name("generator".to_string())
                .spawn_scoped(scope, move || generator.run(stop))
                .map_err(|source| DetectorError::ThreadSpawn {
                    name: "generator".to_string(),
                    source,
                })?;

            thread::sleep(self.config.execution_time());
            generator_stop.store(true, Ordering::Relaxed);

            log::info!("joining generator");
            let generator = generator_handle.join();
            log::info!("generator joined");

            if !self.config.ack_mode.is_enabled() {
                // Let the detectors pick up the final toggles.
                thread::sleep(self.config.grace_period());
            }
            detector_stop.store(true, Ordering::Relaxed);

            let mut detectors = Vec::with_capacity(handles.len());
            let mut panicked = None;
            for handle in handles {
                match handle.join() {
                    Ok(stats) => detectors.push(stats),
                    Err(payload) => panicked = Some(panic_message(payload)),
                }
            }

            let generator = generator.map_err(|payload| DetectorError::ThreadPanic(panic_message(payload)))?;
            if let Some(message) = panicked {
                return Err(DetectorError::ThreadPanic(message));
            }
            Ok((generator, detectors))
        })?;

        self.sink.flush();

        let summary = RunSummary {
            plan: self.plan,
            ack_mode: self.config.ack_mode,
            elapsed_ms: started.elapsed().as_millis() as u64,
            generator,
            detectors,
        };
        log::info!(
            "run finished: {} toggles, {} activations, {} detections",
            summary.generator.toggles,
            summary.generator.activations,
            summary.detections()
        );
        Ok(summary)
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
