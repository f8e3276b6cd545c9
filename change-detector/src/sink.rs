//! Output stream for generator and detector events

use crate::types::SignalEvent;
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};

/// Destination for `C`/`D` events, shared by all threads
pub trait EventSink: Sync {
    /// Record one event; must not block for long
    fn emit(&self, event: SignalEvent);

    /// Flush any buffered output
    fn flush(&self) {}
}

/// Writes one line per event to any `Write`r (usually stdout)
///
/// Write failures are logged once and further output is dropped.
pub struct WriterSink<W: Write + Send> {
    writer: Mutex<W>,
    failed: AtomicBool,
}

impl<W: Write + Send> WriterSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
            failed: AtomicBool::new(false),
        }
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn report(&self, err: std::io::Error) {
        if !self.failed.swap(true, Ordering::Relaxed) {
            log::error!("Failed to write event stream: {}", err);
        }
    }
}

impl<W: Write + Send> EventSink for WriterSink<W> {
    fn emit(&self, event: SignalEvent) {
        if self.failed.load(Ordering::Relaxed) {
            return;
        }
        let result = writeln!(self.writer.lock(), "{}", event);
        if let Err(err) = result {
            self.report(err);
        }
    }

    fn flush(&self) {
        if let Err(err) = self.writer.lock().flush() {
            self.report(err);
        }
    }
}

/// Collects events in memory, in emission order
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<SignalEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything emitted so far
    pub fn events(&self) -> Vec<SignalEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: SignalEvent) {
        self.events.lock().push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writer_sink_lines() {
        let sink = WriterSink::new(Vec::new());
        sink.emit(SignalEvent::change(4, 100));
        sink.emit(SignalEvent::detection(4, 130));
        sink.flush();

        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(output, "C 4 100\nD 4 130\n");
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_writer_sink_swallows_errors() {
        let sink = WriterSink::new(BrokenPipe);
        sink.emit(SignalEvent::change(0, 1));
        sink.emit(SignalEvent::change(0, 2));
        assert!(sink.failed.load(Ordering::Relaxed));
    }

    #[test]
    fn test_memory_sink_order() {
        let sink = MemorySink::new();
        assert!(sink.is_empty());
        sink.emit(SignalEvent::change(1, 10));
        sink.emit(SignalEvent::detection(1, 11));
        assert_eq!(
            sink.events(),
            vec![SignalEvent::change(1, 10), SignalEvent::detection(1, 11)]
        );
    }
}
