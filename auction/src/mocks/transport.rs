//! Mock message transport for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AuctionError, AuctionResult};
use crate::protocol::{Event, Request, WireMessage};
use crate::traits::{MessageTransport, PeerId};

/// A delivered request, kept for test assertions.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub peer: PeerId,
    pub data: Vec<u8>,
    pub sequence_number: u64,
}

impl RecordedRequest {
    /// Decoded frame, if it parses.
    pub fn message(&self) -> Option<WireMessage> {
        WireMessage::from_bytes(&self.data).ok()
    }
}

/// How a simulated peer reacts to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerBehavior {
    /// Accept and acknowledge immediately.
    Ack,
    /// Refuse with a transport error (unreachable peer).
    Fail,
    /// Fail this many requests, then acknowledge.
    FailTimes(u32),
    /// Never answer; the request times out.
    Hang,
    /// Answer after a delay (times out if the delay exceeds the timeout).
    Delay(Duration),
}

type Responder = Arc<dyn Fn(&PeerId, &[u8]) -> AuctionResult<Vec<u8>> + Send + Sync>;

/// Mock transport recording every delivered frame.
///
/// Peers default to [`PeerBehavior::Ack`]; an optional responder produces
/// the reply bytes, otherwise an [`WireMessage::EventAck`] is returned.
#[derive(Clone)]
pub struct MockTransport {
    sent: Arc<RwLock<Vec<RecordedRequest>>>,
    behaviors: Arc<RwLock<HashMap<PeerId, PeerBehavior>>>,
    attempts: Arc<RwLock<HashMap<PeerId, u32>>>,
    responder: Option<Responder>,
    counter: Arc<AtomicU64>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("has_responder", &self.responder.is_some())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            sent: Arc::new(RwLock::new(Vec::new())),
            behaviors: Arc::new(RwLock::new(HashMap::new())),
            attempts: Arc::new(RwLock::new(HashMap::new())),
            responder: None,
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Produce replies with `responder` instead of a bare acknowledgement.
    #[must_use]
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&PeerId, &[u8]) -> AuctionResult<Vec<u8>> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Configure how `peer` reacts.
    pub async fn set_behavior(&self, peer: &str, behavior: PeerBehavior) {
        self.behaviors
            .write()
            .await
            .insert(peer.to_string(), behavior);
    }

    /// Every successfully delivered frame.
    pub async fn get_sent_messages(&self) -> Vec<RecordedRequest> {
        self.sent.read().await.clone()
    }

    pub async fn message_count(&self) -> usize {
        self.sent.read().await.len()
    }

    pub async fn clear_messages(&self) {
        self.sent.write().await.clear();
    }

    /// Number of delivery attempts made to `peer`, failed ones included.
    pub async fn attempts_to(&self, peer: &str) -> u32 {
        self.attempts.read().await.get(peer).copied().unwrap_or(0)
    }

    /// Events delivered to `peer`, in delivery order.
    pub async fn events_to(&self, peer: &str) -> Vec<Event> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|m| m.peer == peer)
            .filter_map(|m| match m.message() {
                Some(WireMessage::Event(event)) => Some(event),
                _ => None,
            })
            .collect()
    }

    /// Requests delivered to `peer`, in delivery order.
    pub async fn requests_to(&self, peer: &str) -> Vec<Request> {
        self.sent
            .read()
            .await
            .iter()
            .filter(|m| m.peer == peer)
            .filter_map(|m| match m.message() {
                Some(WireMessage::Request(request)) => Some(request),
                _ => None,
            })
            .collect()
    }

    async fn record(&self, peer: &PeerId, data: Vec<u8>) {
        let sequence_number = self.counter.fetch_add(1, Ordering::SeqCst);
        self.sent.write().await.push(RecordedRequest {
            peer: peer.clone(),
            data,
            sequence_number,
        });
    }

    fn reply(&self, peer: &PeerId, data: &[u8]) -> AuctionResult<Vec<u8>> {
        match &self.responder {
            Some(responder) => responder(peer, data),
            None => WireMessage::EventAck.to_bytes(),
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageTransport for MockTransport {
    async fn request(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> AuctionResult<Vec<u8>> {
        let attempt = {
            let mut attempts = self.attempts.write().await;
            let entry = attempts.entry(peer.clone()).or_insert(0);
            *entry += 1;
            *entry
        };
        let behavior = self
            .behaviors
            .read()
            .await
            .get(peer)
            .cloned()
            .unwrap_or(PeerBehavior::Ack);

        match behavior {
            PeerBehavior::Ack => {}
            PeerBehavior::Fail => {
                return Err(AuctionError::Transport(format!("peer {peer} unreachable")));
            }
            PeerBehavior::FailTimes(n) if attempt <= n => {
                return Err(AuctionError::Transport(format!(
                    "peer {peer} unreachable (attempt {attempt})"
                )));
            }
            PeerBehavior::FailTimes(_) => {}
            PeerBehavior::Hang => {
                tokio::time::sleep(timeout).await;
                return Err(AuctionError::Transport(format!(
                    "request to {peer} timed out after {timeout:?}"
                )));
            }
            PeerBehavior::Delay(delay) => {
                if delay >= timeout {
                    tokio::time::sleep(timeout).await;
                    return Err(AuctionError::Transport(format!(
                        "request to {peer} timed out after {timeout:?}"
                    )));
                }
                tokio::time::sleep(delay).await;
            }
        }

        let reply = self.reply(peer, &payload)?;
        self.record(peer, payload).await;
        Ok(reply)
    }
}
