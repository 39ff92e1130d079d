/// Trait for reporting scan progress.
///
/// The CLI implements it with indicatif bars. Extraction callbacks arrive on
/// pool threads but are serialized by the engine, so `processed` is
/// monotonic. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    fn on_discovery_start(&self) {}
    fn on_discovery_complete(&self, _total_files: usize, _duration_secs: f64) {}
    fn on_extract_progress(&self, _processed: usize, _total: usize) {}
    fn on_batch_flushed(&self, _rows: usize) {}
    fn on_extract_complete(&self, _occurrences: usize, _duration_secs: f64) {}
    fn on_resolution_start(&self, _fonts: usize) {}
    fn on_resolution_complete(&self, _installed: usize, _resolved: usize) {}
}

/// No-op progress reporter for silent operation.
pub struct SilentReporter;

impl ProgressReporter for SilentReporter {}

/// Decides which extraction completions are worth reporting: roughly one
/// per percent, always including the last file.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProgressThrottle {
    total: usize,
    step: usize,
}

impl ProgressThrottle {
    pub(crate) fn new(total: usize) -> Self {
        Self {
            total,
            step: (total / 100).max(1),
        }
    }

    pub(crate) fn should_report(&self, processed: usize) -> bool {
        processed >= self.total || processed % self.step == 0
    }
}
