//! Work counter shared between the work loop and the control channel

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Thread-safe count of completed work iterations.
///
/// Clones share the same count. The only operations are [`increment`]
/// and [`get_and_reset`], and both are single atomic instructions, so
/// every interleaving of them is equivalent to some serial order.
///
/// [`increment`]: SharedCounter::increment
/// [`get_and_reset`]: SharedCounter::get_and_reset
#[derive(Debug, Clone, Default)]
pub struct SharedCounter {
    value: Arc<AtomicU64>,
}

impl SharedCounter {
    /// Create a counter starting at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one completed iteration
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::AcqRel);
    }

    /// Take the current count, leaving zero behind
    pub fn get_and_reset(&self) -> u64 {
        self.value.swap(0, Ordering::AcqRel)
    }
}
