//! End-to-end runs: layout, region, both units, finalizer.
//!
//! The driver always runs on the initiating thread/process. The expander
//! runs either on a scoped thread ([`run_threads`]) or in a forked child
//! over a shared file mapping ([`run_forked`]). Either way the initiator
//! blocks exactly once, after signalling [`Event::DriverDone`], until the
//! expander has terminated.
//!
//! [`Event::DriverDone`]: crate::checkpoint::Event::DriverDone

use std::path::Path;
use std::thread;

use tracing::{debug, info};

use crate::checkpoint::Handoff;
use crate::config::{Strategy, TransformConfig};
use crate::errors::{Result, TransformError};
use crate::finalize::{finalize_buffer, finalize_mapped};
use crate::layout::Layout;
use crate::probe::{NoProbe, Probe};
use crate::region::{MappedOutput, SharedRegion};
use crate::units::{drive, expand};

/// Outcome of [`transform_file`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Report {
    /// Layout of the input
    pub layout: Layout,
    /// Markers counted by the finalizer
    pub markers: usize,
    /// Final output size, summary record included
    pub bytes_written: usize,
}

/// Transform `input` in memory and append the summary record.
///
/// Always runs the units on threads; [`Strategy::Processes`] needs a
/// file-backed region and is only honoured by [`transform_file`].
///
/// # Example
/// ```
/// # use duplex_expand::{transform, TransformConfig};
/// let out = transform(b"a1b2", &TransformConfig::default()).unwrap();
/// assert_eq!(out, b"A*B**\nTotal markers: 3\n");
/// ```
pub fn transform(input: &[u8], config: &TransformConfig) -> Result<Vec<u8>> {
    let layout = Layout::scan(input)?;
    let mut buf = vec![0u8; layout.output_len];
    run_threads(input, &mut buf, config.marker, &NoProbe)?;
    finalize_buffer(&mut buf, config.marker);
    Ok(buf)
}

/// Run both units on threads over `region`.
///
/// `region` must be exactly as long as the layout of `input`. Every byte of
/// it is overwritten.
pub fn run_threads<P>(input: &[u8], region: &mut [u8], marker: u8, probe: &P) -> Result<()>
where
    P: Probe + ?Sized,
{
    let layout = checked_layout(input, region.len())?;
    let region = SharedRegion::new(region);
    let handoff = Handoff::in_process();

    thread::scope(|s| {
        let expander = thread::Builder::new()
            .name("duplex-expander".to_string())
            .spawn_scoped(s, || unsafe { expand(input, region, &handoff, marker, probe) })
            .map_err(TransformError::Spawn)?;

        let end = unsafe { drive(input, region, &handoff, probe) };
        debug_assert_eq!(end, layout.output_len);
        debug!(end, "driver finished");

        let end = expander
            .join()
            .map_err(|_| TransformError::UnitPanicked("expander"))??;
        debug_assert_eq!(end, layout.output_len);
        debug!(end, "expander finished");
        Ok(())
    })
}

/// Run the expander in a forked child over the shared mapping of `output`.
///
/// The child keeps only the waiting ends of the checkpoints, writes its
/// digit spans straight into the `MAP_SHARED` pages and exits with
/// `_exit(2)`; a failed wait exits with status 1. The parent drives, then
/// reaps the child with `waitpid(2)`.
pub fn run_forked(input: &[u8], output: &mut MappedOutput, marker: u8) -> Result<()> {
    let layout = checked_layout(input, output.len())?;
    let mut handoff = Handoff::pipes().map_err(TransformError::Spawn)?;
    let region = SharedRegion::new(output.as_mut_slice());

    let pid = unsafe { libc::fork() };
    if pid == -1 {
        return Err(TransformError::Spawn(std::io::Error::last_os_error()));
    }

    if pid == 0 {
        // Child: no allocation, no logging, no unwinding past this point.
        handoff.keep_wait_ends();
        let ok = unsafe { expand(input, region, &handoff, marker, &NoProbe) }.is_ok();
        unsafe { libc::_exit(if ok { 0 } else { 1 }) }
    }

    handoff.keep_signal_ends();
    debug!(pid, "expander forked");

    let end = unsafe { drive(input, region, &handoff, &NoProbe) };
    debug_assert_eq!(end, layout.output_len);
    debug!(end, "driver finished");

    let status = wait_child(pid)?;
    if !(libc::WIFEXITED(status) && libc::WEXITSTATUS(status) == 0) {
        return Err(TransformError::ExpanderFailed { status });
    }
    debug!(pid, "expander exited");
    Ok(())
}

/// Read `input_path`, transform it into `output_path` and append the
/// summary record.
///
/// The output file is created or truncated, sized to the exact layout,
/// mapped, filled by both units, then grown once for the summary.
pub fn transform_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &TransformConfig,
) -> Result<Report> {
    let input_path = input_path.as_ref();
    let output_path = output_path.as_ref();

    let input = std::fs::read(input_path)
        .map_err(|e| TransformError::io("cannot read input", input_path, e))?;
    let layout = Layout::scan(&input)?;
    info!(
        input = %input_path.display(),
        output = %output_path.display(),
        input_len = layout.input_len,
        output_len = layout.output_len,
        midpoint = layout.midpoint,
        strategy = ?config.strategy,
        "starting transform"
    );

    let mut output = MappedOutput::create(output_path, layout.output_len)?;
    match config.strategy {
        Strategy::Threads => run_threads(&input, output.as_mut_slice(), config.marker, &NoProbe)?,
        Strategy::Processes => run_forked(&input, &mut output, config.marker)?,
    }

    let markers = finalize_mapped(&mut output, config.marker, config.sync_on_finish)?;
    let report = Report {
        layout,
        markers,
        bytes_written: output.len(),
    };
    info!(
        markers,
        bytes_written = report.bytes_written,
        "transform finished"
    );
    Ok(report)
}

fn checked_layout(input: &[u8], region_len: usize) -> Result<Layout> {
    let layout = Layout::scan(input)?;
    if layout.output_len != region_len {
        return Err(TransformError::RegionMismatch {
            needed: layout.output_len,
            len: region_len,
        });
    }
    Ok(layout)
}

fn wait_child(pid: libc::pid_t) -> Result<libc::c_int> {
    let mut status: libc::c_int = 0;
    loop {
        let rc = unsafe { libc::waitpid(pid, &mut status, 0) };
        if rc == pid {
            return Ok(status);
        }
        let err = std::io::Error::last_os_error();
        if err.kind() != std::io::ErrorKind::Interrupted {
            return Err(TransformError::Spawn(err));
        }
    }
}
