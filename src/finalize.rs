//! Summary record appended after both units have terminated.
//!
//! Record layout: `"\nTotal markers: {count}\n"`. The count covers every
//! marker byte in the finished region, including marker bytes that were
//! already present in the input and passed through unchanged.

use tracing::debug;

use crate::errors::Result;
use crate::region::MappedOutput;

/// Prefix of the summary record.
pub const SUMMARY_PREFIX: &[u8] = b"\nTotal markers: ";

/// Count occurrences of `marker` in `region`.
///
/// # Example
/// ```
/// # use duplex_expand::count_markers;
/// assert_eq!(count_markers(b"A*B**", b'*'), 3);
/// ```
#[inline]
pub fn count_markers(region: &[u8], marker: u8) -> usize {
    region.iter().filter(|&&b| b == marker).count()
}

/// Render the summary record for `count` markers.
///
/// # Example
/// ```
/// # use duplex_expand::summary_record;
/// assert_eq!(summary_record(3), b"\nTotal markers: 3\n");
/// ```
pub fn summary_record(count: usize) -> Vec<u8> {
    let digits = count.to_string();
    let mut record = Vec::with_capacity(SUMMARY_PREFIX.len() + digits.len() + 1);
    record.extend_from_slice(SUMMARY_PREFIX);
    record.extend_from_slice(digits.as_bytes());
    record.push(b'\n');
    record
}

/// Append the summary to an in-memory result. Returns the marker count.
pub fn finalize_buffer(buf: &mut Vec<u8>, marker: u8) -> usize {
    let count = count_markers(buf, marker);
    buf.extend_from_slice(&summary_record(count));
    count
}

/// Append the summary to a mapped output file. Returns the marker count.
///
/// The file grows by exactly the record length; with `sync` the new bytes
/// are flushed synchronously. Failures are reported and leave the
/// transformed content in place.
pub fn finalize_mapped(output: &mut MappedOutput, marker: u8, sync: bool) -> Result<usize> {
    let count = count_markers(output.as_slice(), marker);
    let record = summary_record(count);
    output.append(&record, sync)?;
    debug!(
        path = %output.path().display(),
        markers = count,
        record_len = record.len(),
        "summary record appended"
    );
    Ok(count)
}
