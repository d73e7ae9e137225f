//! Deterministic random source.

use crate::traits::RandomSource;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Produces a reproducible byte stream from a seed and a shared counter.
#[derive(Debug, Clone)]
pub struct MockRandom {
    counter: Arc<AtomicU64>,
    seed: u64,
}

impl MockRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            counter: Arc::new(AtomicU64::new(0)),
            seed,
        }
    }

    /// Restart the sequence from the beginning.
    pub fn reset(&self) {
        self.counter.store(0, Ordering::SeqCst);
    }

    const fn mix(&self, counter: u64) -> u64 {
        let mut x = self.seed.wrapping_add(counter);
        x = x.wrapping_mul(0x517C_C1B7_2722_0A95);
        x ^= x >> 32;
        x = x.wrapping_mul(0x517C_C1B7_2722_0A95);
        x ^= x >> 32;
        x
    }
}

impl Default for MockRandom {
    fn default() -> Self {
        Self::new(0x1234_5678_9ABC_DEF0)
    }
}

impl RandomSource for MockRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let value = self.mix(self.counter.fetch_add(1, Ordering::SeqCst));
            chunk.copy_from_slice(&value.to_le_bytes()[..chunk.len()]);
        }
    }
}
