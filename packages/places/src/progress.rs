//! Progress reporting for the grid survey.
//!
//! Collection walks thousands of grid points with a mandatory pause
//! between result pages, so a run takes long enough that the operator
//! needs a live indicator. [`ProgressCallback`] keeps the collector free
//! of any terminal rendering; the CLI plugs in an `indicatif` bar.

use std::sync::Arc;

/// Receives progress updates from long-running survey stages.
pub trait ProgressCallback: Send + Sync {
    /// Sets the number of units (grid points) the stage will process.
    fn set_total(&self, total: u64);

    /// Advances progress by `delta` units.
    fn inc(&self, delta: u64);

    /// Replaces the status text shown next to the indicator.
    fn set_message(&self, msg: String);

    /// Marks the stage complete with a closing message.
    fn finish(&self, msg: String);
}

/// Discards every update. Used by tests and non-interactive callers.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

/// Returns a shared [`NullProgress`].
#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
