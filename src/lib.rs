//! # duplex-expand
//!
//! Two cooperating units transform a byte buffer into a differently-sized
//! output region, writing into it at the same time without any lock on the
//! region itself.
//!
//! Transformation rule:
//! - ASCII digit `d` becomes `d` marker bytes (`*` by default)
//! - ASCII letters are uppercased
//! - every other byte passes through unchanged
//!
//! After both units finish, a summary record `"\nTotal markers: N\n"` is
//! appended.
//!
//! ## Platform Support
//!
//! **Unix/Linux Only** - This crate requires Unix-like systems and will NOT compile on Windows.
//! The process strategy uses `fork(2)`, `pipe(2)` and `MAP_SHARED` file mappings.
//!
//! ## How the units share the region
//!
//! - Output offsets are a pure function of the input prefix ([`Layout`], [`Cursor`])
//! - The driver owns non-digit spans, the expander owns digit spans
//! - Two one-shot checkpoints order the handoff ([`Handoff`]); nothing else
//!   synchronizes the units
//!
//! # Example
//!
//! ```rust
//! use duplex_expand::*;
//!
//! let out = transform(b"a1b2", &TransformConfig::default()).unwrap();
//! assert_eq!(out, b"A*B**\nTotal markers: 3\n");
//!
//! let layout = Layout::scan(b"a1b2").unwrap();
//! assert_eq!(layout.output_len, 5);
//! ```

// Compile-time platform check
#[cfg(not(unix))]
compile_error!(
    "duplex-expand requires a Unix-like operating system (Linux, macOS, BSD). Windows is not supported due to the use of fork(2), pipe(2) and MAP_SHARED mappings. Consider using WSL2 or a containerized Linux environment for Windows development."
);

pub mod checkpoint;
pub mod config;
pub mod errors;
pub mod finalize;
pub mod layout;
pub mod pipeline;
pub mod probe;
pub mod region;
pub mod units;

// Re-export all public items for convenience
pub use checkpoint::*;
pub use config::*;
pub use errors::*;
pub use finalize::*;
pub use layout::*;
pub use pipeline::*;
pub use probe::*;
pub use region::*;
pub use units::*;
