//! Progress reporting sink consumed by long-running operations.

/// Receives `(label, fraction-complete)` updates from a running operation.
///
/// Called synchronously from the operating thread; when work is dispatched
/// to a worker pool the updates are multiplexed through the same sink.
pub trait ProgressSink: Sync {
    fn report(&self, label: &str, fraction: f32);
}

/// Sink that drops all updates.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn report(&self, _label: &str, _fraction: f32) {}
}
