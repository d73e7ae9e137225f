//! Event fan-out to every registered peer.

use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::directory::{short_id, DirectoryOps};
use crate::error::{AuctionError, AuctionResult};
use crate::protocol::{Event, WireMessage};
use crate::traits::{KvStore, MessageTransport, PeerId};

/// Per-broadcast delivery tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanoutReport {
    pub delivered: usize,
    pub failed: usize,
}

impl FanoutReport {
    pub const fn attempted(&self) -> usize {
        self.delivered + self.failed
    }
}

/// Pushes events to the peers of one coordinator's directory.
///
/// Deliveries run concurrently, each under its own timeout. A failing peer
/// is logged and counted; it never fails the broadcast or delays the other
/// peers beyond its own timeout. Nothing is retried.
#[derive(Clone)]
pub struct NotificationFanout<S: KvStore, T: MessageTransport> {
    directory: DirectoryOps<S>,
    transport: T,
    peer_timeout: Duration,
}

impl<S: KvStore, T: MessageTransport> NotificationFanout<S, T> {
    pub const fn new(directory: DirectoryOps<S>, transport: T, peer_timeout: Duration) -> Self {
        Self {
            directory,
            transport,
            peer_timeout,
        }
    }

    /// Broadcast `event` and wait until every peer's attempt has finished.
    pub async fn broadcast(&self, event: &Event) -> FanoutReport {
        let event_type = event.event_type();
        let auction_id = event.auction_id().to_string();

        let peers = match self.directory.peers().await {
            Ok(peers) => peers,
            Err(e) => {
                warn!("Cannot read client directory for {event_type} on {auction_id}: {e}");
                return FanoutReport::default();
            }
        };
        if peers.is_empty() {
            debug!("No registered peers, {event_type} for {auction_id} not sent");
            return FanoutReport::default();
        }

        let data = match WireMessage::Event(event.clone()).to_bytes() {
            Ok(data) => data,
            Err(e) => {
                warn!("Failed to encode {event_type} for {auction_id}: {e}");
                return FanoutReport {
                    delivered: 0,
                    failed: peers.len(),
                };
            }
        };

        let mut deliveries = JoinSet::new();
        for peer in peers {
            let transport = self.transport.clone();
            let data = data.clone();
            let timeout = self.peer_timeout;
            deliveries.spawn(async move {
                let result = deliver(&transport, &peer, data, timeout).await;
                (peer, result)
            });
        }

        let mut report = FanoutReport::default();
        while let Some(joined) = deliveries.join_next().await {
            match joined {
                Ok((peer, Ok(()))) => {
                    debug!("Delivered {event_type} to {}", short_id(&peer));
                    report.delivered += 1;
                }
                Ok((peer, Err(e))) => {
                    warn!("Failed to deliver {event_type} to {}: {e}", short_id(&peer));
                    report.failed += 1;
                }
                Err(e) => {
                    warn!("Delivery task for {event_type} aborted: {e}");
                    report.failed += 1;
                }
            }
        }

        info!(
            "Broadcast {event_type} for {auction_id}: {}/{} peers reached",
            report.delivered,
            report.attempted()
        );
        report
    }
}

async fn deliver<T: MessageTransport>(
    transport: &T,
    peer: &PeerId,
    data: Vec<u8>,
    timeout: Duration,
) -> AuctionResult<()> {
    let reply = tokio::time::timeout(timeout, transport.request(peer, data, timeout))
        .await
        .map_err(|_| AuctionError::Transport(format!("no reply within {timeout:?}")))??;
    if !matches!(WireMessage::from_bytes(&reply), Ok(WireMessage::EventAck)) {
        debug!("Peer {} replied without an ack", short_id(peer));
    }
    Ok(())
}
