//! Trait seams for the coordinator's external collaborators.
//!
//! The persistent store, the messaging transport, the clock and the random
//! source are all injected, so the coordination engine runs unchanged over
//! Veilid in production and over the mocks in tests.

pub mod random;
pub mod store;
pub mod time;
pub mod transport;

pub use random::{RandomSource, ThreadRng};
pub use store::KvStore;
pub use time::{SystemTimeProvider, TimeProvider};
pub use transport::{MessageTransport, PeerId};
