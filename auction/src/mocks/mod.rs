//! Mock implementations for testing.
//!
//! These stand in for the Veilid-backed store and transport so the
//! coordination engine can be exercised without a network.

pub mod random;
pub mod store;
pub mod time;
pub mod transport;

pub use random::MockRandom;
pub use store::{MockStore, MockStoreFailure};
pub use time::MockTime;
pub use transport::{MockTransport, PeerBehavior, RecordedRequest};
