//! Random source abstraction used to mint auction identifiers.

use rand::RngCore;

/// Source of random bytes.
pub trait RandomSource: Send + Sync + Clone + 'static {
    /// Fill the destination buffer with random bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    /// A fresh 128-bit identifier, hex encoded.
    fn random_id(&self) -> String {
        let mut bytes = [0u8; 16];
        self.fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// Production implementation using the thread-local RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadRng;

impl ThreadRng {
    pub const fn new() -> Self {
        Self
    }
}

impl RandomSource for ThreadRng {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::thread_rng().fill_bytes(dest);
    }
}
