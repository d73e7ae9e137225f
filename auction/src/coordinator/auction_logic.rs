//! Auction lifecycle: open, bid, close, read, and Dutch decay ticks.
//!
//! Every mutation of one auction (bid, close, decay tick) runs under that
//! auction's lock, so the read-modify-write of its record and the fan-out
//! that follows are serialized. Different auctions never contend.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::fanout::NotificationFanout;
use super::scheduler::{DutchPriceScheduler, TickOutcome};
use crate::config::{dutch_index_key, CLOSE_HEADROOM, MAX_AUCTION_RECORD_SIZE, MAX_BIDDER_LEN};
use crate::error::{AuctionError, AuctionResult};
use crate::marketplace::{Auction, AuctionId, AuctionTerms, AuctionType, Bid};
use crate::protocol::{BidOutcome, CloseOutcome, Event};
use crate::traits::{KvStore, MessageTransport, RandomSource, TimeProvider};
use crate::util::{from_cbor, to_cbor};

/// Open Dutch auctions whose decay must resume after a restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DutchIndex {
    pub auctions: Vec<AuctionId>,
}

/// Owns auction records and enforces bid admission.
///
/// Generic over the store, transport, clock and random source so the same
/// code runs against Veilid in production and against mocks in tests.
/// Clones share all state.
#[derive(Clone)]
pub struct AuctionStateMachine<S, T, C, R>
where
    S: KvStore,
    T: MessageTransport,
    C: TimeProvider,
    R: RandomSource,
{
    store: S,
    time: C,
    rng: R,
    fanout: NotificationFanout<S, T>,
    scheduler: DutchPriceScheduler,
    coordinator_id: String,
    /// One lock per auction id
    locks: Arc<parking_lot::Mutex<HashMap<AuctionId, Arc<Mutex<()>>>>>,
    /// Guards read-modify-write of the Dutch resume index
    index_lock: Arc<Mutex<()>>,
}

impl<S, T, C, R> AuctionStateMachine<S, T, C, R>
where
    S: KvStore,
    T: MessageTransport,
    C: TimeProvider,
    R: RandomSource,
{
    pub fn new(
        store: S,
        time: C,
        rng: R,
        fanout: NotificationFanout<S, T>,
        scheduler: DutchPriceScheduler,
        coordinator_id: impl Into<String>,
    ) -> Self {
        Self {
            store,
            time,
            rng,
            fanout,
            scheduler,
            coordinator_id: coordinator_id.into(),
            locks: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            index_lock: Arc::new(Mutex::new(())),
        }
    }

    pub const fn scheduler(&self) -> &DutchPriceScheduler {
        &self.scheduler
    }

    fn auction_lock(&self, auction_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(auction_id.to_string())
            .or_default()
            .clone()
    }

    async fn load_auction(&self, auction_id: &str) -> AuctionResult<Auction> {
        match self.store.get(auction_id).await? {
            Some(data) => from_cbor(&data),
            None => Err(AuctionError::NotFound(auction_id.to_string())),
        }
    }

    /// Persist a record, keeping `headroom` bytes free below the record
    /// limit. An oversized record is rejected before anything is written.
    async fn save_auction(&self, auction: &Auction, headroom: usize) -> AuctionResult<()> {
        let data = to_cbor(auction)?;
        let limit = MAX_AUCTION_RECORD_SIZE.saturating_sub(headroom);
        if data.len() > limit {
            return Err(AuctionError::InvalidParameter(format!(
                "auction {} is full: record would be {} bytes, limit is {limit}",
                auction.auction_id,
                data.len()
            )));
        }
        self.store.put(&auction.auction_id, data).await
    }

    /// Create an auction, announce it, and start decay for Dutch auctions.
    pub async fn open_auction(
        &self,
        item: &str,
        price: u64,
        auction_type: &str,
        decrement_rate: Option<u64>,
        minimum_price: Option<u64>,
    ) -> AuctionResult<AuctionId> {
        let terms =
            AuctionTerms::validate(item, price, auction_type, decrement_rate, minimum_price)?;
        let auction_id = self.rng.random_id();
        let auction = Auction::open(auction_id.clone(), terms, self.time.now_unix());

        self.save_auction(&auction, CLOSE_HEADROOM).await?;
        info!(
            "Opened {} auction {} for '{}' at {}",
            auction.auction_type, auction_id, auction.item, auction.start_price
        );

        if auction.is_dutch() {
            if let Err(e) = self.index_add(&auction_id).await {
                warn!("Failed to record {auction_id} in the Dutch resume index: {e}");
            }
        }

        self.fanout
            .broadcast(&Event::NewAuction {
                auction_id: auction_id.clone(),
                auction: Box::new(auction.clone()),
            })
            .await;

        if auction.is_dutch() {
            self.start_decay(&auction_id);
        }
        Ok(auction_id)
    }

    /// Admit a bid.
    ///
    /// English bids must strictly exceed the highest earlier bid (or the
    /// start price). The first Dutch bid meeting the live price wins and
    /// closes the auction.
    pub async fn place_bid(
        &self,
        auction_id: &str,
        bidder: &str,
        amount: u64,
    ) -> AuctionResult<BidOutcome> {
        if bidder.trim().is_empty() {
            return Err(AuctionError::InvalidParameter(
                "bidder must not be empty".into(),
            ));
        }
        if bidder.len() > MAX_BIDDER_LEN {
            return Err(AuctionError::InvalidParameter(format!(
                "bidder is {} bytes, limit is {MAX_BIDDER_LEN}",
                bidder.len()
            )));
        }
        if amount == 0 {
            return Err(AuctionError::InvalidParameter(
                "amount must be greater than zero".into(),
            ));
        }

        let lock = self.auction_lock(auction_id);
        let _guard = lock.lock().await;

        let mut auction = self.load_auction(auction_id).await?;
        let now = self.time.now_unix();
        let bid = Bid::new(bidder, amount, now);

        match auction.auction_type {
            AuctionType::English => {
                auction.apply_english_bid(bid.clone())?;
                self.save_auction(&auction, CLOSE_HEADROOM).await?;
                info!("Accepted bid of {amount} from {bidder} on {auction_id}");
                self.fanout
                    .broadcast(&Event::NewBid {
                        auction_id: auction_id.to_string(),
                        bid,
                        auction_type: auction.auction_type,
                        closed: auction.closed,
                        current_price: auction.current_price,
                    })
                    .await;
            }
            AuctionType::Dutch => {
                auction.apply_dutch_bid(bid, now)?;
                self.save_auction(&auction, 0).await?;
                info!("Dutch auction {auction_id} won by {bidder} at {amount}");
                self.scheduler.cancel(auction_id);
                self.index_remove_logged(auction_id).await;
                self.fanout.broadcast(&Event::closed_from(&auction)).await;
            }
        }

        Ok(BidOutcome {
            success: true,
            current_price: auction.current_price,
            closed: auction.closed,
        })
    }

    /// Close an auction. Closing a closed auction returns its stored result
    /// and sends nothing.
    pub async fn close_auction(&self, auction_id: &str) -> AuctionResult<CloseOutcome> {
        let lock = self.auction_lock(auction_id);
        let _guard = lock.lock().await;

        let mut auction = self.load_auction(auction_id).await?;
        if auction.closed {
            debug!("Auction {auction_id} already closed, returning stored result");
            return Ok(CloseOutcome {
                result: auction.close_result(),
                already_closed: true,
            });
        }

        let result = auction.close(self.time.now_unix())?;
        self.save_auction(&auction, 0).await?;
        info!("Closed {} auction {}", auction.auction_type, auction_id);

        if auction.is_dutch() {
            self.scheduler.cancel(auction_id);
            self.index_remove_logged(auction_id).await;
        }
        self.fanout.broadcast(&Event::closed_from(&auction)).await;

        Ok(CloseOutcome {
            result,
            already_closed: false,
        })
    }

    /// The stored record with the live Dutch price filled in. Read-only.
    pub async fn get_auction_details(&self, auction_id: &str) -> AuctionResult<Auction> {
        let auction = self.load_auction(auction_id).await?;
        Ok(auction.with_live_price(self.time.now_unix()))
    }

    /// One decay step. Errors are logged and end the auction's task.
    pub async fn decay_tick(&self, auction_id: &str) -> TickOutcome {
        match self.try_decay_tick(auction_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Decay tick for {auction_id} failed, stopping its scheduler: {e}");
                TickOutcome::Stop
            }
        }
    }

    async fn try_decay_tick(&self, auction_id: &str) -> AuctionResult<TickOutcome> {
        let lock = self.auction_lock(auction_id);
        let _guard = lock.lock().await;

        let mut auction = self.load_auction(auction_id).await?;
        if auction.closed {
            debug!("Auction {auction_id} closed, ending decay");
            return Ok(TickOutcome::Stop);
        }

        let reached_floor = auction.apply_decay(self.time.now_unix())?;
        self.save_auction(&auction, 0).await?;

        if reached_floor {
            info!(
                "Dutch auction {auction_id} reached its minimum price {}",
                auction.current_price
            );
            self.index_remove_logged(auction_id).await;
            self.fanout.broadcast(&Event::closed_from(&auction)).await;
            return Ok(TickOutcome::Stop);
        }

        debug!("Auction {auction_id} price now {}", auction.current_price);
        self.fanout
            .broadcast(&Event::PriceUpdate {
                auction_id: auction_id.to_string(),
                current_price: auction.current_price,
            })
            .await;
        Ok(TickOutcome::Continue)
    }

    fn start_decay(&self, auction_id: &str) -> bool {
        let machine = self.clone();
        let id = auction_id.to_string();
        self.scheduler.start(auction_id, move || {
            let machine = machine.clone();
            let id = id.clone();
            async move { machine.decay_tick(&id).await }
        })
    }

    /// Restart decay for every open Dutch auction in the resume index and
    /// prune entries that are closed or gone. Returns the number resumed.
    pub async fn resume_dutch_auctions(&self) -> AuctionResult<usize> {
        let _guard = self.index_lock.lock().await;
        let index = self.load_index().await?;
        let mut kept = DutchIndex::default();

        for auction_id in index.auctions {
            match self.load_auction(&auction_id).await {
                Ok(auction) if auction.is_dutch() && !auction.closed => {
                    if self.start_decay(&auction_id) {
                        info!("Resumed decay for {auction_id}");
                    }
                    kept.auctions.push(auction_id);
                }
                Ok(_) => debug!("Dropping closed auction {auction_id} from resume index"),
                Err(AuctionError::NotFound(_)) => {
                    warn!("Resume index lists unknown auction {auction_id}");
                }
                Err(e) => {
                    warn!("Cannot load {auction_id} for resume: {e}");
                    kept.auctions.push(auction_id);
                }
            }
        }

        let resumed = self.scheduler.active_count();
        self.save_index(&kept).await?;
        Ok(resumed)
    }

    async fn load_index(&self) -> AuctionResult<DutchIndex> {
        match self.store.get(&dutch_index_key(&self.coordinator_id)).await? {
            Some(data) => from_cbor(&data),
            None => Ok(DutchIndex::default()),
        }
    }

    async fn save_index(&self, index: &DutchIndex) -> AuctionResult<()> {
        self.store
            .put(&dutch_index_key(&self.coordinator_id), to_cbor(index)?)
            .await
    }

    async fn index_add(&self, auction_id: &str) -> AuctionResult<()> {
        let _guard = self.index_lock.lock().await;
        let mut index = self.load_index().await?;
        if !index.auctions.iter().any(|a| a == auction_id) {
            index.auctions.push(auction_id.to_string());
            self.save_index(&index).await?;
        }
        Ok(())
    }

    async fn index_remove_logged(&self, auction_id: &str) {
        let result = async {
            let _guard = self.index_lock.lock().await;
            let mut index = self.load_index().await?;
            let before = index.auctions.len();
            index.auctions.retain(|a| a != auction_id);
            if index.auctions.len() != before {
                self.save_index(&index).await?;
            }
            Ok::<(), AuctionError>(())
        }
        .await;
        if let Err(e) = result {
            warn!("Failed to drop {auction_id} from the Dutch resume index: {e}");
        }
    }

    /// Stop every decay task and wait for them.
    pub async fn shutdown(&self) {
        self.scheduler.shutdown().await;
    }
}
