//! The two transform units.
//!
//! Both walk the whole input from index 0 with their own [`Cursor`], so
//! they agree on every span without talking to each other. Write ownership
//! is fixed by byte class:
//!
//! | input byte | driver                        | expander                  |
//! |------------|-------------------------------|---------------------------|
//! | digit `d`  | skips `d` bytes               | writes `d` markers        |
//! | other      | writes the uppercased byte    | skips 1 byte              |
//!
//! Handoff sequence, with `m = L / 2`:
//! 1. driver processes `[0, m)`, signals [`Event::FirstHalf`]
//! 2. expander wakes, processes `[0, m)` while the driver finishes `[m, L)`
//! 3. driver signals [`Event::DriverDone`]
//! 4. expander waits for it at index `m`, then processes `[m, L)`
//!
//! The barrier at `m` is kept even though the offsets alone would let the
//! expander run ahead.

use crate::checkpoint::{Checkpoint, Event, Handoff};
use crate::errors::Result;
use crate::layout::{Cursor, is_digit};
use crate::probe::{Probe, Unit};
use crate::region::SharedRegion;

/// Run the driving unit: uppercase letters, pass other non-digits through,
/// leave digit spans as gaps.
///
/// Never blocks. Returns the final cursor offset, which equals the layout's
/// output length.
///
/// # Safety
/// - `region.len()` is at least the output length of `input`'s layout.
/// - The only unit writing `region` concurrently is [`expand`] over the same
///   `input`, paired through the same `handoff`.
pub unsafe fn drive<C, P>(
    input: &[u8],
    region: SharedRegion<'_>,
    handoff: &Handoff<C>,
    probe: &P,
) -> usize
where
    C: Checkpoint,
    P: Probe + ?Sized,
{
    let midpoint = input.len() / 2;
    let mut cursor = Cursor::new();

    for (i, &b) in input.iter().enumerate() {
        if i == midpoint {
            raise(handoff, Event::FirstHalf, probe);
        }
        let span = cursor.advance(b);
        if is_digit(b) {
            continue;
        }
        unsafe { region.put(span.start, b.to_ascii_uppercase()) };
        probe.on_write(Unit::Driver, i, span);
    }

    // Empty input never reaches the midpoint index
    raise(handoff, Event::FirstHalf, probe);
    raise(handoff, Event::DriverDone, probe);

    cursor.position()
}

/// Run the expansion unit: fill each digit span with `marker`, skip the
/// rest.
///
/// Blocks on [`Event::FirstHalf`] before its first write and on
/// [`Event::DriverDone`] before processing the midpoint index. Returns the
/// final cursor offset.
///
/// Does not allocate and does not log, so it can run in a forked child when
/// `probe` does neither.
///
/// # Safety
/// Same contract as [`drive`], from the expander's side.
pub unsafe fn expand<C, P>(
    input: &[u8],
    region: SharedRegion<'_>,
    handoff: &Handoff<C>,
    marker: u8,
    probe: &P,
) -> Result<usize>
where
    C: Checkpoint,
    P: Probe + ?Sized,
{
    pass(handoff, Event::FirstHalf, probe)?;

    let midpoint = input.len() / 2;
    let mut cursor = Cursor::new();

    for (i, &b) in input.iter().enumerate() {
        if i == midpoint {
            pass(handoff, Event::DriverDone, probe)?;
        }
        let span = cursor.advance(b);
        if !is_digit(b) || span.is_empty() {
            continue;
        }
        unsafe { region.fill(span.clone(), marker) };
        probe.on_write(Unit::Expander, i, span);
    }

    Ok(cursor.position())
}

#[inline]
fn raise<C, P>(handoff: &Handoff<C>, event: Event, probe: &P)
where
    C: Checkpoint,
    P: Probe + ?Sized,
{
    let checkpoint = handoff.get(event);
    if !checkpoint.is_set() {
        probe.on_signal(event);
        checkpoint.signal();
    }
}

#[inline]
fn pass<C, P>(handoff: &Handoff<C>, event: Event, probe: &P) -> Result<()>
where
    C: Checkpoint,
    P: Probe + ?Sized,
{
    handoff.get(event).wait()?;
    probe.on_resume(event);
    Ok(())
}
