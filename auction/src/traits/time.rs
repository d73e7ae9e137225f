//! Clock abstraction for time-dependent auction logic.

use std::time::{SystemTime, UNIX_EPOCH};

/// Source of the current Unix time in whole seconds.
///
/// Dutch price decay and bid timestamps read time only through this trait,
/// so tests can move the clock explicitly.
pub trait TimeProvider: Send + Sync + Clone + 'static {
    /// Returns the current Unix timestamp in seconds.
    fn now_unix(&self) -> u64;
}

/// Production clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    pub const fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_unix(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
