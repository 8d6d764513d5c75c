//! Observation hooks for the two units.
//!
//! The units report every span they write and every checkpoint they signal
//! or pass. [`NoProbe`] compiles to nothing; [`RecordingProbe`] keeps a
//! totally ordered log that tests use to check the partition and the
//! midpoint barrier.

use core::ops::Range;

use parking_lot::Mutex;

use crate::checkpoint::Event;

/// Which unit performed an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    /// Uppercase/gap unit, never blocks.
    Driver,
    /// Digit expansion unit, blocks on both checkpoints.
    Expander,
}

impl Unit {
    /// Lowercase name used in logs and errors.
    pub fn name(self) -> &'static str {
        match self {
            Unit::Driver => "driver",
            Unit::Expander => "expander",
        }
    }
}

/// Hooks called by the units. All methods default to no-ops.
pub trait Probe: Sync {
    /// `unit` wrote `span` of the region for input byte `index`.
    /// Called after the write; never called for empty spans.
    #[inline(always)]
    fn on_write(&self, _unit: Unit, _index: usize, _span: Range<usize>) {}

    /// The driver is about to set `event`.
    #[inline(always)]
    fn on_signal(&self, _event: Event) {}

    /// The expander observed `event` as set and is resuming.
    #[inline(always)]
    fn on_resume(&self, _event: Event) {}
}

/// Probe that records nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProbe;

impl Probe for NoProbe {}

/// One entry of a [`RecordingProbe`] log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A span write.
    Write {
        /// Writing unit
        unit: Unit,
        /// Input index the span belongs to
        index: usize,
        /// Output offsets written
        span: Range<usize>,
    },
    /// The driver signalled an event.
    Signal(Event),
    /// The expander resumed past an event.
    Resume(Event),
}

/// Probe keeping every record in the order the calls were made.
#[derive(Debug, Default)]
pub struct RecordingProbe {
    log: Mutex<Vec<Record>>,
}

impl RecordingProbe {
    /// Empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the log.
    pub fn records(&self) -> Vec<Record> {
        self.log.lock().clone()
    }

    /// Position of the first `Signal(event)` record, if any.
    pub fn signal_position(&self, event: Event) -> Option<usize> {
        self.log
            .lock()
            .iter()
            .position(|r| *r == Record::Signal(event))
    }
}

impl Probe for RecordingProbe {
    fn on_write(&self, unit: Unit, index: usize, span: Range<usize>) {
        self.log.lock().push(Record::Write { unit, index, span });
    }

    fn on_signal(&self, event: Event) {
        self.log.lock().push(Record::Signal(event));
    }

    fn on_resume(&self, event: Event) {
        self.log.lock().push(Record::Resume(event));
    }
}
