//! Cooperative cancellation of cook and package runs.

use std::sync::atomic::{AtomicBool, Ordering};

static COOK_INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Request cancellation of the in-flight cook/package run.
///
/// Callable from a signal-handler context: a single atomic store, no
/// blocking, no allocation. The flag is polled between objects and between
/// cook passes, never mid-object, so cooked outputs stay complete-or-absent.
pub fn request_interrupt() {
    COOK_INTERRUPTED.store(true, Ordering::SeqCst);
}

/// Whether cancellation has been requested.
pub fn interrupt_requested() -> bool {
    COOK_INTERRUPTED.load(Ordering::SeqCst)
}

/// Re-arm the flag before starting a fresh run.
pub fn reset_interrupt() {
    COOK_INTERRUPTED.store(false, Ordering::SeqCst);
}
