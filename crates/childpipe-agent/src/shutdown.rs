//! One-way shutdown signal

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Monotonic shutdown flag shared by the listener and the work loop.
///
/// Once [`signal`](ShutdownFlag::signal) has been called on any clone,
/// every clone reports `true` from then on.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    set: Arc<AtomicBool>,
}

impl ShutdownFlag {
    /// Create an unset flag
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. Signalling an already set flag is a no-op.
    pub fn signal(&self) {
        self.set.store(true, Ordering::Release);
    }

    /// Whether shutdown has been requested
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }
}
