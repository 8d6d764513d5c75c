//! Error types for layout computation, the two-unit protocol and finalization.
//!
//! Every failure in the pipeline is terminal: nothing is retried and nothing
//! written to the output region before the failure is rolled back.

use std::path::PathBuf;
use thiserror::Error;

use crate::checkpoint::Event;

/// Error type for every fallible operation in the crate.
#[derive(Debug, Error)]
pub enum TransformError {
    /// The output length does not fit in `usize`.
    #[error("output layout overflows usize at input index {index}")]
    LayoutOverflow {
        /// Input index whose width pushed the running total past `usize::MAX`
        index: usize,
    },

    /// A caller-supplied region does not match the computed layout.
    #[error("output region holds {len} bytes but the layout needs exactly {needed}")]
    RegionMismatch {
        /// Bytes required by the layout
        needed: usize,
        /// Bytes actually available
        len: usize,
    },

    /// Resource acquisition failed (open, read, size, map).
    #[error("{context} {}: {source}", .path.display())]
    Io {
        /// What was being attempted
        context: &'static str,
        /// File the operation targeted
        path: PathBuf,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },

    /// The peer side of a checkpoint went away before setting it.
    #[error("checkpoint {event} abandoned before it was signalled")]
    CheckpointAbandoned {
        /// Event that can no longer be observed
        event: Event,
    },

    /// Creating the expansion unit (pipe or fork) failed.
    #[error("failed to start expansion unit: {0}")]
    Spawn(#[source] std::io::Error),

    /// The expansion unit process terminated abnormally.
    #[error("expansion unit exited abnormally (wait status {status:#x})")]
    ExpanderFailed {
        /// Raw status reported by `waitpid(2)`
        status: i32,
    },

    /// A unit thread panicked.
    #[error("{0} unit panicked")]
    UnitPanicked(&'static str),

    /// Growing, remapping or flushing the output while appending the summary.
    #[error("finalize failed while trying to {stage}: {source}")]
    Finalize {
        /// Step that failed
        stage: &'static str,
        /// Underlying OS error
        #[source]
        source: std::io::Error,
    },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, TransformError>;

impl TransformError {
    /// Build an [`TransformError::Io`] from a path and a failing step.
    pub(crate) fn io(
        context: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        TransformError::Io {
            context,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_overflow_display() {
        let error = TransformError::LayoutOverflow { index: 42 };
        assert_eq!(
            error.to_string(),
            "output layout overflows usize at input index 42"
        );
    }

    #[test]
    fn test_io_display_includes_path_and_cause() {
        let error = TransformError::io(
            "cannot open input",
            "/nope/in.txt",
            std::io::Error::from(std::io::ErrorKind::NotFound),
        );
        let text = error.to_string();
        assert!(text.starts_with("cannot open input /nope/in.txt: "));
        assert!(std::error::Error::source(&error).is_some());
    }

    #[test]
    fn test_checkpoint_abandoned_names_event() {
        let error = TransformError::CheckpointAbandoned {
            event: Event::DriverDone,
        };
        assert_eq!(
            error.to_string(),
            "checkpoint driver-done abandoned before it was signalled"
        );
    }

    #[test]
    fn test_region_mismatch_display() {
        let error = TransformError::RegionMismatch { needed: 5, len: 3 };
        assert_eq!(
            error.to_string(),
            "output region holds 3 bytes but the layout needs exactly 5"
        );
    }
}
