//! Generator/detector acknowledgement protocol
//!
//! With acknowledgement enabled the generator may not toggle a signal again
//! until the detector owning it has consumed the previous change. Two
//! implementations exist: a busy-wait on an atomic flag and a blocking wait on
//! a per-signal condition variable.

use crate::bank::allocate;
use crate::config::AckMode;
use crate::types::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Upper bound on one condition-variable wait before the stop flag is rechecked
const STOP_CHECK_INTERVAL: Duration = Duration::from_millis(1);

/// Per-signal handshake state, selected by [`AckMode`]
pub enum Handshake {
    Disabled,
    Spin(SpinAck),
    Condvar(CondvarAck),
}

impl Handshake {
    /// Allocate handshake state for `signals` signals, all initially acknowledged
    pub fn new(mode: AckMode, signals: usize) -> Result<Self> {
        Ok(match mode {
            AckMode::None => Handshake::Disabled,
            AckMode::Spin => Handshake::Spin(SpinAck {
                acknowledged: allocate("acknowledgement", signals, || AtomicBool::new(true))?,
            }),
            AckMode::Condvar => Handshake::Condvar(CondvarAck {
                slots: allocate("condition variable", signals, AckSlot::new)?,
            }),
        })
    }

    /// Generator side: wait until `signal` is acknowledged, clear the flag and run `toggle`
    ///
    /// Returns `None` without running `toggle` if `stop` is raised while waiting.
    pub fn produce<R>(&self, signal: usize, stop: &AtomicBool, toggle: impl FnOnce() -> R) -> Option<R> {
        match self {
            Handshake::Disabled => Some(toggle()),
            Handshake::Spin(ack) => ack.produce(signal, stop, toggle),
            Handshake::Condvar(ack) => ack.produce(signal, stop, toggle),
        }
    }

    /// Detector side: run `record` and then acknowledge `signal`
    pub fn consume<R>(&self, signal: usize, record: impl FnOnce() -> R) -> R {
        match self {
            Handshake::Disabled => record(),
            Handshake::Spin(ack) => ack.consume(signal, record),
            Handshake::Condvar(ack) => ack.consume(signal, record),
        }
    }

    /// Whether `signal` has no change pending; always true when disabled
    pub fn is_acknowledged(&self, signal: usize) -> bool {
        match self {
            Handshake::Disabled => true,
            Handshake::Spin(ack) => ack.acknowledged[signal].load(Ordering::Acquire),
            Handshake::Condvar(ack) => *ack.slots[signal].acknowledged.lock(),
        }
    }
}

/// Busy-wait acknowledgement
pub struct SpinAck {
    acknowledged: Vec<AtomicBool>,
}

impl SpinAck {
    fn produce<R>(&self, signal: usize, stop: &AtomicBool, toggle: impl FnOnce() -> R) -> Option<R> {
        let flag = &self.acknowledged[signal];
        while !flag.load(Ordering::Acquire) {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            std::hint::spin_loop();
        }
        flag.store(false, Ordering::Relaxed);
        Some(toggle())
    }

    fn consume<R>(&self, signal: usize, record: impl FnOnce() -> R) -> R {
        let result = record();
        self.acknowledged[signal].store(true, Ordering::Release);
        result
    }
}

struct AckSlot {
    acknowledged: Mutex<bool>,
    cv: Condvar,
}

impl AckSlot {
    fn new() -> Self {
        Self {
            acknowledged: Mutex::new(true),
            cv: Condvar::new(),
        }
    }
}

/// Blocking acknowledgement on a per-signal mutex and condition variable
///
/// The mutex is held by the generator across wait, clear and toggle, and by
/// the detector across recording and acknowledging.
pub struct CondvarAck {
    slots: Vec<AckSlot>,
}

impl CondvarAck {
    fn produce<R>(&self, signal: usize, stop: &AtomicBool, toggle: impl FnOnce() -> R) -> Option<R> {
        let slot = &self.slots[signal];
        let mut acknowledged = slot.acknowledged.lock();
        while !*acknowledged {
            if stop.load(Ordering::Relaxed) {
                return None;
            }
            slot.cv.wait_for(&mut acknowledged, STOP_CHECK_INTERVAL);
        }
        *acknowledged = false;
        Some(toggle())
    }

    fn consume<R>(&self, signal: usize, record: impl FnOnce() -> R) -> R {
        let slot = &self.slots[signal];
        let mut acknowledged = slot.acknowledged.lock();
        let result = record();
        *acknowledged = true;
        slot.cv.notify_one();
        result
    }
}
