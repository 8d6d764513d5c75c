//! Output layout computation.
//!
//! The output length and the offset at which every input byte's transformed
//! form begins are pure functions of the input prefix. Both units rely on
//! this: each one walks the input with its own [`Cursor`] and lands on the
//! same offsets without sharing any state.
//!
//! # Widths
//!
//! - ASCII digit `d`: `d` bytes (so `0` occupies an empty span)
//! - any other byte: 1 byte

use core::ops::Range;

use crate::errors::{Result, TransformError};

/// Default marker written into digit spans.
pub const DEFAULT_MARKER: u8 = b'*';

/// Fast check if a byte is an ASCII digit
#[inline(always)]
pub fn is_digit(b: u8) -> bool {
    b'0' <= b && b <= b'9'
}

/// Numeric value of an ASCII digit, `None` for every other byte.
///
/// # Example
/// ```
/// # use duplex_expand::digit_value;
/// assert_eq!(digit_value(b'7'), Some(7));
/// assert_eq!(digit_value(b'x'), None);
/// ```
#[inline(always)]
pub fn digit_value(b: u8) -> Option<usize> {
    if is_digit(b) {
        Some((b - b'0') as usize)
    } else {
        None
    }
}

/// Number of output bytes produced for one input byte.
#[inline(always)]
pub fn span_width(b: u8) -> usize {
    match digit_value(b) {
        Some(v) => v,
        None => 1,
    }
}

/// Summary of a single scan over the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Input length `L`
    pub input_len: usize,
    /// Exact output length before the summary record
    pub output_len: usize,
    /// Split index `L / 2` shared by both units
    pub midpoint: usize,
    /// Number of digit bytes in the input
    pub digits: usize,
    /// Sum of all digit values, i.e. markers the expansion unit will write
    pub markers: usize,
}

impl Layout {
    /// Scan `input` once and compute its layout.
    ///
    /// Fails with [`TransformError::LayoutOverflow`] if the output length
    /// does not fit in `usize`.
    ///
    /// # Example
    /// ```
    /// # use duplex_expand::Layout;
    /// let layout = Layout::scan(b"a1b2").unwrap();
    /// assert_eq!(layout.output_len, 5);
    /// assert_eq!(layout.midpoint, 2);
    /// assert_eq!(layout.markers, 3);
    /// ```
    pub fn scan(input: &[u8]) -> Result<Self> {
        let (output_len, digits, markers) = scan_from(0, input)?;
        Ok(Layout {
            input_len: input.len(),
            output_len,
            midpoint: input.len() / 2,
            digits,
            markers,
        })
    }

    /// Iterate over `(index, span)` for every input byte, in input order.
    ///
    /// The spans partition `[0, output_len)`; digit `0` yields an empty span.
    pub fn spans<'a>(&self, input: &'a [u8]) -> Spans<'a> {
        Spans {
            input,
            index: 0,
            cursor: Cursor::new(),
        }
    }
}

/// Checked accumulation of span widths starting at `base`.
///
/// Returns `(total, digit_count, marker_count)`.
fn scan_from(base: usize, input: &[u8]) -> Result<(usize, usize, usize)> {
    let mut total = base;
    let mut digits = 0usize;
    let mut markers = 0usize;
    for (index, &b) in input.iter().enumerate() {
        total = total
            .checked_add(span_width(b))
            .ok_or(TransformError::LayoutOverflow { index })?;
        if let Some(v) = digit_value(b) {
            digits += 1;
            // markers <= total - base, so it cannot overflow once total did not
            markers += v;
        }
    }
    Ok((total, digits, markers))
}

/// Unit-local running offset into the output region.
///
/// Two cursors fed the same bytes always agree; that is what lets the units
/// write without coordination outside the two checkpoints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor {
    pos: usize,
}

impl Cursor {
    /// Cursor at offset 0.
    #[inline]
    pub const fn new() -> Self {
        Cursor { pos: 0 }
    }

    /// Current offset.
    #[inline(always)]
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Span occupied by `b` at the current offset, advancing past it.
    ///
    /// Only called after [`Layout::scan`] succeeded, so the sum is bounded
    /// by `output_len`.
    #[inline(always)]
    pub fn advance(&mut self, b: u8) -> Range<usize> {
        let start = self.pos;
        self.pos = start + span_width(b);
        start..self.pos
    }
}

/// Iterator returned by [`Layout::spans`].
pub struct Spans<'a> {
    input: &'a [u8],
    index: usize,
    cursor: Cursor,
}

impl Iterator for Spans<'_> {
    type Item = (usize, Range<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let b = *self.input.get(self.index)?;
        let index = self.index;
        self.index += 1;
        Some((index, self.cursor.advance(b)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let rest = self.input.len() - self.index;
        (rest, Some(rest))
    }
}

impl ExactSizeIterator for Spans<'_> {}
