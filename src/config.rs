//! Run configuration.

use crate::layout::DEFAULT_MARKER;

/// How the two units are executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Strategy {
    /// Two scoped threads over one buffer, in-process latches.
    #[default]
    Threads,
    /// Expander in a `fork(2)`ed child over a `MAP_SHARED` file mapping,
    /// pipe latches. Only available for file-backed output.
    Processes,
}

/// Options for one transform run.
#[derive(Debug, Clone)]
pub struct TransformConfig {
    /// Byte written into digit spans.
    pub marker: u8,
    /// Execution strategy for the units.
    pub strategy: Strategy,
    /// Whether the summary record is flushed with `msync(MS_SYNC)`.
    pub sync_on_finish: bool,
}

impl Default for TransformConfig {
    fn default() -> Self {
        Self {
            marker: DEFAULT_MARKER,
            strategy: Strategy::Threads,
            sync_on_finish: true,
        }
    }
}

impl TransformConfig {
    /// Use `marker` for digit spans.
    pub fn with_marker(mut self, marker: u8) -> Self {
        self.marker = marker;
        self
    }

    /// Run the units with `strategy`.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enable or disable the final synchronous flush.
    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync_on_finish = sync;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TransformConfig::default();
        assert_eq!(config.marker, b'*');
        assert_eq!(config.strategy, Strategy::Threads);
        assert!(config.sync_on_finish);
    }

    #[test]
    fn test_builder() {
        let config = TransformConfig::default()
            .with_marker(b'#')
            .with_strategy(Strategy::Processes)
            .with_sync(false);
        assert_eq!(config.marker, b'#');
        assert_eq!(config.strategy, Strategy::Processes);
        assert!(!config.sync_on_finish);
    }
}
