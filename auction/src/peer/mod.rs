//! Peer side of the protocol: registration, requests, and pushed events.

pub mod client;
pub mod events;
pub mod registration;

pub use client::PeerClient;
pub use events::{AuctionView, PeerEventHandler};
pub use registration::RegistrationClient;
