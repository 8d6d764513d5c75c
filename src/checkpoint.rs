//! One-shot checkpoint events between the two units.
//!
//! A checkpoint goes from unset to set exactly once and never resets. Waits
//! are level-triggered: a wait that starts after the signal returns at once,
//! so an event can never be missed.
//!
//! Two implementations share the [`Checkpoint`] seam:
//! - [`Latch`]: in-process, for units running on threads. The mutex guards
//!   only the latch bit, never the output region.
//! - [`PipeLatch`]: cross-process, for a unit running in a forked child.
//!   Signalling writes one byte into a pipe, waiting blocks in `read(2)`.

use core::fmt;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::errors::{Result, TransformError};

/// The two events of the protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Event {
    /// Driver reached the input midpoint; the expander may start.
    FirstHalf,
    /// Driver processed the whole input; the expander may cross the midpoint.
    DriverDone,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::FirstHalf => f.write_str("first-half"),
            Event::DriverDone => f.write_str("driver-done"),
        }
    }
}

/// A set-once, level-triggered notification.
pub trait Checkpoint: Sync {
    /// Event this checkpoint carries.
    fn event(&self) -> Event;

    /// Set the checkpoint. Setting it again is a no-op.
    fn signal(&self);

    /// Block until the checkpoint is set.
    ///
    /// Returns [`TransformError::CheckpointAbandoned`] only when the
    /// signalling side can provably never set it anymore.
    fn wait(&self) -> Result<()>;

    /// Whether the set has been observed by this side.
    fn is_set(&self) -> bool;
}

/// In-process latch built on a mutex-guarded bit and a condvar.
#[derive(Debug)]
pub struct Latch {
    event: Event,
    set: Mutex<bool>,
    cond: Condvar,
}

impl Latch {
    /// Create an unset latch for `event`.
    pub fn new(event: Event) -> Self {
        Latch {
            event,
            set: Mutex::new(false),
            cond: Condvar::new(),
        }
    }
}

impl Checkpoint for Latch {
    fn event(&self) -> Event {
        self.event
    }

    fn signal(&self) {
        let mut set = self.set.lock();
        if !*set {
            *set = true;
            self.cond.notify_all();
            debug!(event = %self.event, "checkpoint signalled");
        }
    }

    fn wait(&self) -> Result<()> {
        let mut set = self.set.lock();
        while !*set {
            self.cond.wait(&mut set);
        }
        Ok(())
    }

    fn is_set(&self) -> bool {
        *self.set.lock()
    }
}

/// Cross-process latch backed by an anonymous pipe.
///
/// Create it before `fork(2)`, then keep only the signalling end in the
/// driver ([`PipeLatch::keep_signal_end`]) and only the waiting end in the
/// expander ([`PipeLatch::keep_wait_end`]). Once the signalling end is gone
/// without a byte in the pipe, `read(2)` returns end-of-file and the wait
/// fails instead of blocking forever.
///
/// `wait` neither allocates nor logs, so it is usable in a forked child.
#[derive(Debug)]
pub struct PipeLatch {
    event: Event,
    read_end: Option<OwnedFd>,
    write_end: Option<OwnedFd>,
    latched: AtomicBool,
}

impl PipeLatch {
    /// Open the pipe for `event`. Both ends are close-on-exec.
    pub fn new(event: Event) -> io::Result<Self> {
        let mut fds = [0 as libc::c_int; 2];
        if unsafe { libc::pipe(fds.as_mut_ptr()) } == -1 {
            return Err(io::Error::last_os_error());
        }
        // Owned right away so both ends close on every error path below
        let read_end = unsafe { OwnedFd::from_raw_fd(fds[0]) };
        let write_end = unsafe { OwnedFd::from_raw_fd(fds[1]) };
        for fd in [&read_end, &write_end] {
            if unsafe { libc::fcntl(fd.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC) } == -1 {
                return Err(io::Error::last_os_error());
            }
        }
        Ok(PipeLatch {
            event,
            read_end: Some(read_end),
            write_end: Some(write_end),
            latched: AtomicBool::new(false),
        })
    }

    /// Drop the waiting end (driver side after fork).
    pub fn keep_signal_end(&mut self) {
        self.read_end = None;
    }

    /// Drop the signalling end (expander side after fork).
    pub fn keep_wait_end(&mut self) {
        self.write_end = None;
    }
}

impl Checkpoint for PipeLatch {
    fn event(&self) -> Event {
        self.event
    }

    fn signal(&self) {
        if self.latched.swap(true, Ordering::AcqRel) {
            return;
        }
        let Some(fd) = self.write_end.as_ref() else {
            warn!(event = %self.event, "checkpoint has no signalling end");
            return;
        };
        let token = [1u8];
        loop {
            let n = unsafe { libc::write(fd.as_raw_fd(), token.as_ptr().cast(), 1) };
            if n == 1 {
                debug!(event = %self.event, "checkpoint signalled");
                return;
            }
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            // EPIPE: the waiting side already exited; its exit status reports why
            warn!(event = %self.event, error = %err, "checkpoint receiver is gone");
            return;
        }
    }

    fn wait(&self) -> Result<()> {
        if self.latched.load(Ordering::Acquire) {
            return Ok(());
        }
        let abandoned = TransformError::CheckpointAbandoned { event: self.event };
        let Some(fd) = self.read_end.as_ref() else {
            return Err(abandoned);
        };
        let mut token = [0u8];
        loop {
            let n = unsafe { libc::read(fd.as_raw_fd(), token.as_mut_ptr().cast(), 1) };
            if n == 1 {
                self.latched.store(true, Ordering::Release);
                return Ok(());
            }
            if n == -1 && io::Error::last_os_error().kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(abandoned);
        }
    }

    fn is_set(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }
}

/// The pair of checkpoints one run uses.
#[derive(Debug)]
pub struct Handoff<C> {
    /// Gates the expander's start.
    pub first_half: C,
    /// Gates the expander's crossing of the midpoint.
    pub driver_done: C,
}

impl<C: Checkpoint> Handoff<C> {
    /// Checkpoint carrying `event`.
    pub fn get(&self, event: Event) -> &C {
        match event {
            Event::FirstHalf => &self.first_half,
            Event::DriverDone => &self.driver_done,
        }
    }
}

impl Handoff<Latch> {
    /// Two unset in-process latches.
    pub fn in_process() -> Self {
        Handoff {
            first_half: Latch::new(Event::FirstHalf),
            driver_done: Latch::new(Event::DriverDone),
        }
    }
}

impl Handoff<PipeLatch> {
    /// Two unset pipe latches, to be split across `fork(2)`.
    pub fn pipes() -> io::Result<Self> {
        Ok(Handoff {
            first_half: PipeLatch::new(Event::FirstHalf)?,
            driver_done: PipeLatch::new(Event::DriverDone)?,
        })
    }

    /// Keep only the signalling ends (driver side).
    pub fn keep_signal_ends(&mut self) {
        self.first_half.keep_signal_end();
        self.driver_done.keep_signal_end();
    }

    /// Keep only the waiting ends (expander side).
    pub fn keep_wait_ends(&mut self) {
        self.first_half.keep_wait_end();
        self.driver_done.keep_wait_end();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_event_display() {
        assert_eq!(Event::FirstHalf.to_string(), "first-half");
        assert_eq!(Event::DriverDone.to_string(), "driver-done");
    }

    #[test]
    fn test_latch_level_triggered() {
        let latch = Latch::new(Event::FirstHalf);
        assert!(!latch.is_set());
        latch.signal();
        assert!(latch.is_set());
        // Wait after signal must not block
        latch.wait().unwrap();
        latch.wait().unwrap();
    }

    #[test]
    fn test_latch_signal_idempotent() {
        let latch = Latch::new(Event::DriverDone);
        latch.signal();
        latch.signal();
        assert!(latch.is_set());
        assert_eq!(latch.event(), Event::DriverDone);
    }

    #[test]
    fn test_latch_wakes_blocked_waiter() {
        let latch = Arc::new(Latch::new(Event::FirstHalf));
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        latch.signal();
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn test_pipe_latch_level_triggered() {
        let latch = PipeLatch::new(Event::FirstHalf).unwrap();
        latch.signal();
        latch.signal();
        latch.wait().unwrap();
        latch.wait().unwrap();
        assert!(latch.is_set());
    }

    #[test]
    fn test_pipe_latch_wakes_blocked_waiter() {
        let latch = Arc::new(PipeLatch::new(Event::DriverDone).unwrap());
        let waiter = {
            let latch = Arc::clone(&latch);
            thread::spawn(move || latch.wait())
        };
        thread::sleep(Duration::from_millis(20));
        assert!(!waiter.is_finished());
        latch.signal();
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn test_pipe_latch_abandoned_on_closed_signal_end() {
        let mut latch = PipeLatch::new(Event::DriverDone).unwrap();
        latch.keep_wait_end();
        match latch.wait() {
            Err(TransformError::CheckpointAbandoned { event }) => {
                assert_eq!(event, Event::DriverDone)
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!latch.is_set());
    }

    #[test]
    fn test_handoff_get_maps_events() {
        let handoff = Handoff::in_process();
        assert_eq!(handoff.get(Event::FirstHalf).event(), Event::FirstHalf);
        assert_eq!(handoff.get(Event::DriverDone).event(), Event::DriverDone);
        handoff.get(Event::DriverDone).signal();
        assert!(handoff.driver_done.is_set());
        assert!(!handoff.first_half.is_set());
    }

    #[test]
    fn test_handoff_pipes_split_ends() {
        let mut waiter = Handoff::pipes().unwrap();
        waiter.keep_wait_ends();
        assert!(matches!(
            waiter.first_half.wait(),
            Err(TransformError::CheckpointAbandoned {
                event: Event::FirstHalf
            })
        ));
    }

    #[test]
    fn test_pipe_latch_signal_without_receiver_does_not_fail() {
        let mut latch = PipeLatch::new(Event::FirstHalf).unwrap();
        latch.keep_signal_end();
        // EPIPE is swallowed and logged
        latch.signal();
        assert!(latch.is_set());
    }
}
