#![recursion_limit = "256"]
//! Coordination engine for English and Dutch auctions among Veilid peers.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod marketplace;
pub mod peer;
pub mod protocol;
pub mod store;
pub mod traits;
pub mod util;
pub mod veilid;

#[cfg(any(test, feature = "test-support"))]
pub mod mocks;

pub use config::CoordinatorConfig;
pub use coordinator::{
    AuctionCoordinator, AuctionStateMachine, ClientDirectory, DirectoryOps, DutchPriceScheduler,
    NotificationFanout,
};
pub use error::{AuctionError, AuctionResult};
pub use marketplace::{Auction, AuctionId, AuctionType, Bid, CloseResult, HighestBid};
pub use peer::{PeerClient, PeerEventHandler, RegistrationClient};
pub use protocol::{Event, Request, Response, WireMessage};
pub use store::MemoryStore;
pub use traits::{KvStore, MessageTransport, PeerId, RandomSource, TimeProvider};
pub use veilid::{NodeConfig, VeilidNode, VeilidTableStore, VeilidTransport};

/// Coordinator wired to the production collaborators.
pub type VeilidCoordinator<S = VeilidTableStore> =
    AuctionCoordinator<S, VeilidTransport, traits::SystemTimeProvider, traits::ThreadRng>;
