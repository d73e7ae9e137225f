//! Mock clock for testing.

use crate::traits::TimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Mock clock with a controllable value. Clones share the same clock.
#[derive(Debug, Clone)]
pub struct MockTime {
    current_time: Arc<AtomicU64>,
}

impl MockTime {
    /// Create a mock clock starting at `initial_time`.
    pub fn new(initial_time: u64) -> Self {
        Self {
            current_time: Arc::new(AtomicU64::new(initial_time)),
        }
    }

    /// Jump to an absolute timestamp.
    pub fn set(&self, timestamp: u64) {
        self.current_time.store(timestamp, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, seconds: u64) {
        self.current_time.fetch_add(seconds, Ordering::SeqCst);
    }
}

impl Default for MockTime {
    fn default() -> Self {
        Self::new(1_704_067_200) // 2024-01-01 00:00:00 UTC
    }
}

impl TimeProvider for MockTime {
    fn now_unix(&self) -> u64 {
        self.current_time.load(Ordering::SeqCst)
    }
}
