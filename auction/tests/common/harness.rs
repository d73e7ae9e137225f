//! Multi-party test harness for integration testing.
//!
//! One coordinator backed by mocks, plus N peers. Peer requests travel
//! through [`Loopback`], which hands the encoded frame to
//! [`AuctionCoordinator::process_call`]. Fan-out goes through a
//! [`MockTransport`] whose responder feeds each frame to the addressed
//! peer's [`PeerEventHandler`], so peers can also be made to fail or hang.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use auction::mocks::{MockRandom, MockStore, MockTime, MockTransport};
use auction::peer::AuctionView;
use auction::protocol::{BidOutcome, CloseOutcome};
use auction::{
    Auction, AuctionCoordinator, AuctionError, AuctionId, AuctionResult, CoordinatorConfig,
    Event, MessageTransport, PeerClient, PeerEventHandler, PeerId, RegistrationClient,
};
use parking_lot::RwLock;
use tokio::task::JoinHandle;

pub type TestCoordinator = AuctionCoordinator<MockStore, MockTransport, MockTime, MockRandom>;

pub const COORDINATOR_ID: &str = "coord";
pub const COORDINATOR_ADDRESS: &str = "coordinator";
pub const DECAY_PERIOD: Duration = Duration::from_secs(5);
pub const FANOUT_TIMEOUT: Duration = Duration::from_secs(5);

/// Peer-to-coordinator transport that calls straight into the coordinator.
///
/// The coordinator behind it can be swapped to simulate a restart.
#[derive(Clone)]
pub struct Loopback {
    coordinator: Arc<RwLock<Arc<TestCoordinator>>>,
}

impl Loopback {
    fn current(&self) -> Arc<TestCoordinator> {
        self.coordinator.read().clone()
    }
}

#[async_trait]
impl MessageTransport for Loopback {
    async fn request(
        &self,
        _peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> AuctionResult<Vec<u8>> {
        let coordinator = self.current();
        tokio::time::timeout(timeout, coordinator.process_call(&payload))
            .await
            .map_err(|_| AuctionError::Transport("coordinator timed out".into()))?
    }
}

/// One simulated peer.
pub struct PeerContext {
    pub peer_id: PeerId,
    pub events: PeerEventHandler,
    pub client: PeerClient<Loopback>,
}

/// Simulates a coordinator with N registered peers.
pub struct AuctionHarness {
    loopback: Loopback,
    fanout: MockTransport,
    store: MockStore,
    time: MockTime,
    handlers: Arc<RwLock<HashMap<PeerId, PeerEventHandler>>>,
    peers: Vec<PeerContext>,
}

#[allow(dead_code)]
impl AuctionHarness {
    /// Start a coordinator and register `num_peers` peers with it.
    pub async fn new(num_peers: usize) -> Self {
        let store = MockStore::new();
        let time = MockTime::new(1000);
        let handlers: Arc<RwLock<HashMap<PeerId, PeerEventHandler>>> = Arc::default();

        let routes = handlers.clone();
        let fanout = MockTransport::new().with_responder(move |peer, data| {
            let handler = routes.read().get(peer).cloned();
            match handler {
                Some(handler) => handler.process_call(data),
                None => Err(AuctionError::Transport(format!("no route to {peer}"))),
            }
        });

        let coordinator = Self::build_coordinator(&store, &fanout, &time, 1);
        coordinator
            .start()
            .await
            .expect("coordinator should start");
        let loopback = Loopback {
            coordinator: Arc::new(RwLock::new(Arc::new(coordinator))),
        };

        let mut harness = Self {
            loopback,
            fanout,
            store,
            time,
            handlers,
            peers: Vec::with_capacity(num_peers),
        };
        for _ in 0..num_peers {
            harness.add_peer().await;
        }
        harness
    }

    fn build_coordinator(
        store: &MockStore,
        fanout: &MockTransport,
        time: &MockTime,
        seed: u64,
    ) -> TestCoordinator {
        let config = CoordinatorConfig {
            coordinator_id: COORDINATOR_ID.into(),
            decay_period: DECAY_PERIOD,
            fanout_timeout: FANOUT_TIMEOUT,
        };
        AuctionCoordinator::new(
            config,
            store.clone(),
            fanout.clone(),
            time.clone(),
            MockRandom::new(seed),
        )
    }

    /// Add a peer that registers through the normal retrying client.
    pub async fn add_peer(&mut self) -> usize {
        let index = self.peers.len();
        let peer_id = format!("peer-{index}");
        let events = PeerEventHandler::new();
        self.handlers.write().insert(peer_id.clone(), events.clone());

        RegistrationClient::new(self.loopback.clone())
            .with_retry(1, Duration::ZERO)
            .register(&COORDINATOR_ADDRESS.to_string(), &peer_id)
            .await
            .expect("registration should succeed");

        let client = PeerClient::new(self.loopback.clone(), COORDINATOR_ADDRESS);
        self.peers.push(PeerContext {
            peer_id,
            events,
            client,
        });
        index
    }

    /// Replace the coordinator with a fresh one over the same store, as
    /// after a process restart.
    pub async fn restart_coordinator(&self) {
        let old = self.loopback.current();
        old.shutdown().await;

        let fresh = Self::build_coordinator(&self.store, &self.fanout, &self.time, 2);
        fresh.start().await.expect("coordinator should restart");
        *self.loopback.coordinator.write() = Arc::new(fresh);
    }

    /// Transport peers use to reach the coordinator.
    pub fn loopback(&self) -> Loopback {
        self.loopback.clone()
    }

    pub fn coordinator(&self) -> Arc<TestCoordinator> {
        self.loopback.current()
    }

    pub fn peer(&self, index: usize) -> &PeerContext {
        &self.peers[index]
    }

    pub fn num_peers(&self) -> usize {
        self.peers.len()
    }

    pub const fn time(&self) -> &MockTime {
        &self.time
    }

    pub const fn store(&self) -> &MockStore {
        &self.store
    }

    /// Transport the coordinator uses for fan-out.
    pub const fn fanout(&self) -> &MockTransport {
        &self.fanout
    }

    pub fn advance_time(&self, seconds: u64) {
        self.time.advance(seconds);
    }

    pub async fn open_english(&self, seller: usize, item: &str, price: u64) -> AuctionId {
        self.peer(seller)
            .client
            .open_auction(item, price, "english", None, None)
            .await
            .expect("open english auction")
    }

    pub async fn open_dutch(
        &self,
        seller: usize,
        item: &str,
        price: u64,
        decrement_rate: u64,
        minimum_price: u64,
    ) -> AuctionId {
        self.peer(seller)
            .client
            .open_auction(
                item,
                price,
                "dutch",
                Some(decrement_rate),
                Some(minimum_price),
            )
            .await
            .expect("open dutch auction")
    }

    /// Peer `bidder` bids under its own peer id.
    pub async fn bid(
        &self,
        bidder: usize,
        auction_id: &str,
        amount: u64,
    ) -> AuctionResult<BidOutcome> {
        let peer = self.peer(bidder);
        peer.client
            .place_bid(auction_id, &peer.peer_id, amount)
            .await
    }

    /// Like [`Self::bid`], but on its own task.
    pub fn spawn_bid(
        &self,
        bidder: usize,
        auction_id: &str,
        amount: u64,
    ) -> JoinHandle<AuctionResult<BidOutcome>> {
        let peer = self.peer(bidder);
        let client = peer.client.clone();
        let bidder = peer.peer_id.clone();
        let auction_id = auction_id.to_string();
        tokio::spawn(async move { client.place_bid(&auction_id, &bidder, amount).await })
    }

    pub async fn close(&self, caller: usize, auction_id: &str) -> AuctionResult<CloseOutcome> {
        self.peer(caller).client.close_auction(auction_id).await
    }

    pub async fn details(&self, caller: usize, auction_id: &str) -> AuctionResult<Auction> {
        self.peer(caller).client.get_auction_details(auction_id).await
    }

    /// Events delivered to peer `index`, in delivery order.
    pub async fn events_of(&self, index: usize) -> Vec<Event> {
        self.fanout.events_to(&self.peer(index).peer_id).await
    }

    /// Event type names delivered to peer `index` for one auction.
    pub async fn event_kinds(&self, index: usize, auction_id: &str) -> Vec<&'static str> {
        self.events_of(index)
            .await
            .iter()
            .filter(|e| e.auction_id() == auction_id)
            .map(Event::event_type)
            .collect()
    }

    /// What peer `index` has learned about an auction from events.
    pub fn view(&self, index: usize, auction_id: &str) -> Option<AuctionView> {
        self.peer(index).events.view(auction_id)
    }

    /// Wait (in virtual time) until every peer has seen the auction close.
    pub async fn wait_for_close(&self, auction_id: &str, max_ticks: u32) -> bool {
        for _ in 0..max_ticks {
            let all_closed = self
                .peers
                .iter()
                .all(|p| p.events.view(auction_id).is_some_and(|v| v.closed));
            if all_closed {
                return true;
            }
            tokio::time::sleep(DECAY_PERIOD).await;
        }
        false
    }

    pub async fn shutdown(&self) {
        self.coordinator().shutdown().await;
    }
}
