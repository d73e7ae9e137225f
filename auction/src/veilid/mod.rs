//! Production collaborators over Veilid: node lifecycle, transport and store.

pub mod node;
pub mod table_store;
pub mod transport;

pub use node::{NodeConfig, NodeState, VeilidNode};
pub use table_store::VeilidTableStore;
pub use transport::{decode_peer_address, VeilidTransport};
