//! Registry of peers subscribed to one coordinator's fan-out.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::AuctionResult;
use crate::traits::{KvStore, PeerId};
use crate::util::{from_cbor, to_cbor};

/// Registered peers of a coordinator, stored under the coordinator id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientDirectory {
    pub clients: Vec<PeerId>,
}

impl ClientDirectory {
    pub const fn new() -> Self {
        Self {
            clients: Vec::new(),
        }
    }

    /// Add a peer. Returns `false` if it was already present.
    pub fn add(&mut self, peer_id: &str) -> bool {
        // Avoid duplicates
        if self.contains(peer_id) {
            return false;
        }
        self.clients.push(peer_id.to_string());
        true
    }

    pub fn contains(&self, peer_id: &str) -> bool {
        self.clients.iter().any(|c| c == peer_id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

/// Store-backed operations on a [`ClientDirectory`].
///
/// Registrations are read-modify-write sequences on a single key, so they
/// are serialized through an internal lock.
#[derive(Clone)]
pub struct DirectoryOps<S: KvStore> {
    store: S,
    coordinator_id: String,
    write_lock: Arc<Mutex<()>>,
}

impl<S: KvStore> DirectoryOps<S> {
    pub fn new(store: S, coordinator_id: impl Into<String>) -> Self {
        Self {
            store,
            coordinator_id: coordinator_id.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn coordinator_id(&self) -> &str {
        &self.coordinator_id
    }

    /// Load the directory, or an empty one if none was persisted yet.
    pub async fn load(&self) -> AuctionResult<ClientDirectory> {
        match self.store.get(&self.coordinator_id).await? {
            Some(data) => from_cbor(&data),
            None => {
                debug!(
                    "No client directory for {}, starting empty",
                    self.coordinator_id
                );
                Ok(ClientDirectory::new())
            }
        }
    }

    /// Register a peer. Repeat registrations succeed without writing.
    ///
    /// Returns whether the peer was newly added.
    pub async fn register_client(&self, peer_id: &str) -> AuctionResult<bool> {
        let _guard = self.write_lock.lock().await;
        let mut directory = self.load().await?;
        if !directory.add(peer_id) {
            debug!("Peer {} already registered", short_id(peer_id));
            return Ok(false);
        }
        self.store
            .put(&self.coordinator_id, to_cbor(&directory)?)
            .await?;
        info!(
            "Registered peer {} ({} total)",
            short_id(peer_id),
            directory.len()
        );
        Ok(true)
    }

    /// Current set of registered peers.
    pub async fn peers(&self) -> AuctionResult<Vec<PeerId>> {
        Ok(self.load().await?.clients)
    }
}

/// Route-blob addresses are long; logs show a prefix.
pub(crate) fn short_id(peer_id: &str) -> &str {
    peer_id.get(..16).unwrap_or(peer_id)
}
