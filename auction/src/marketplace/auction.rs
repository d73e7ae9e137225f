use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::bid::{Bid, HighestBid};
use crate::config::{DEFAULT_DECREMENT_RATE, DEFAULT_MINIMUM_PRICE, MAX_ITEM_LEN};
use crate::error::{AuctionError, AuctionResult};

/// Opaque auction identifier, assigned at creation and never reused.
pub type AuctionId = String;

/// Auction format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuctionType {
    /// Ascending bids, ended by an explicit close
    English,
    /// Descending price, ended by the first bid meeting it or by the floor
    Dutch,
}

impl fmt::Display for AuctionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::English => f.write_str("english"),
            Self::Dutch => f.write_str("dutch"),
        }
    }
}

impl FromStr for AuctionType {
    type Err = AuctionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "english" => Ok(Self::English),
            "dutch" => Ok(Self::Dutch),
            other => Err(AuctionError::InvalidParameter(format!(
                "unknown auction type '{other}' (expected 'english' or 'dutch')"
            ))),
        }
    }
}

/// Why an auction reached the closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    ClosedBySeller,
    WinningBid,
    MinimumPriceReached,
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClosedBySeller => f.write_str("closed by seller"),
            Self::WinningBid => f.write_str("winning bid accepted"),
            Self::MinimumPriceReached => f.write_str("minimum price reached"),
        }
    }
}

/// Decay parameters of a Dutch auction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DutchTerms {
    /// Price units removed per elapsed second
    pub decrement_rate: u64,
    /// Floor at which the auction closes on its own
    pub minimum_price: u64,
}

/// `max(start_price - decrement_rate * elapsed, minimum_price)`, saturating.
pub fn decayed_price(start_price: u64, terms: &DutchTerms, elapsed_secs: u64) -> u64 {
    start_price
        .saturating_sub(terms.decrement_rate.saturating_mul(elapsed_secs))
        .max(terms.minimum_price)
}

/// Validated parameters of an `openAuction` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionTerms {
    pub item: String,
    pub start_price: u64,
    pub auction_type: AuctionType,
    pub dutch: Option<DutchTerms>,
}

impl AuctionTerms {
    /// Validate raw opener input.
    ///
    /// Dutch auctions default to a decrement of 1 per second and a floor of 0
    /// when the caller omits them. Decay terms on an English auction are
    /// ignored.
    pub fn validate(
        item: impl Into<String>,
        price: u64,
        auction_type: &str,
        decrement_rate: Option<u64>,
        minimum_price: Option<u64>,
    ) -> AuctionResult<Self> {
        let item = item.into();
        let auction_type: AuctionType = auction_type.parse()?;
        if item.trim().is_empty() {
            return Err(AuctionError::InvalidParameter(
                "item must not be empty".into(),
            ));
        }
        if item.len() > MAX_ITEM_LEN {
            return Err(AuctionError::InvalidParameter(format!(
                "item is {} bytes, limit is {MAX_ITEM_LEN}",
                item.len()
            )));
        }
        if price == 0 {
            return Err(AuctionError::InvalidParameter(
                "price must be greater than zero".into(),
            ));
        }
        let dutch = match auction_type {
            AuctionType::English => None,
            AuctionType::Dutch => {
                let decrement_rate = decrement_rate.unwrap_or(DEFAULT_DECREMENT_RATE);
                let minimum_price = minimum_price.unwrap_or(DEFAULT_MINIMUM_PRICE);
                if decrement_rate == 0 {
                    return Err(AuctionError::InvalidParameter(
                        "decrementRate must be greater than zero".into(),
                    ));
                }
                if minimum_price > price {
                    return Err(AuctionError::InvalidParameter(format!(
                        "minimumPrice {minimum_price} exceeds start price {price}"
                    )));
                }
                Some(DutchTerms {
                    decrement_rate,
                    minimum_price,
                })
            }
        };
        Ok(Self {
            item,
            start_price: price,
            auction_type,
            dutch,
        })
    }
}

/// Terminal outcome reported by `closeAuction`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloseResult {
    pub auction_type: AuctionType,
    pub highest_bid: Option<HighestBid>,
    pub winning_bid: Option<Bid>,
}

/// An auction record as persisted under its id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub auction_id: AuctionId,
    pub item: String,
    pub auction_type: AuctionType,
    pub start_price: u64,
    /// Last written price. For open Dutch auctions the live price is
    /// [`Auction::price_at`], not this field.
    pub current_price: u64,
    /// Unix timestamp of creation
    pub start_time: u64,
    pub closed: bool,
    /// Accepted bids in arrival order
    pub bids: Vec<Bid>,
    /// English only, set at close
    pub highest_bid: Option<HighestBid>,
    /// Dutch only, set by the accepted bid
    pub winning_bid: Option<Bid>,
    pub winner: Option<String>,
    pub final_price: Option<u64>,
    pub dutch: Option<DutchTerms>,
    pub close_reason: Option<CloseReason>,
}

impl Auction {
    /// A freshly opened auction.
    pub fn open(auction_id: AuctionId, terms: AuctionTerms, start_time: u64) -> Self {
        Self {
            auction_id,
            item: terms.item,
            auction_type: terms.auction_type,
            start_price: terms.start_price,
            current_price: terms.start_price,
            start_time,
            closed: false,
            bids: Vec::new(),
            highest_bid: None,
            winning_bid: None,
            winner: None,
            final_price: None,
            dutch: terms.dutch,
            close_reason: None,
        }
    }

    pub const fn is_dutch(&self) -> bool {
        matches!(self.auction_type, AuctionType::Dutch)
    }

    /// Fail with `AlreadyClosed` once the auction is terminal.
    pub fn ensure_open(&self) -> AuctionResult<()> {
        if self.closed {
            return Err(AuctionError::AlreadyClosed(self.auction_id.clone()));
        }
        Ok(())
    }

    /// Live price at `now`: decayed for open Dutch auctions, the stored
    /// price otherwise.
    pub fn price_at(&self, now: u64) -> u64 {
        match (&self.dutch, self.closed) {
            (Some(terms), false) => decayed_price(
                self.start_price,
                terms,
                now.saturating_sub(self.start_time),
            ),
            _ => self.current_price,
        }
    }

    /// Copy of this record with the live price filled in. Nothing is written.
    #[must_use]
    pub fn with_live_price(mut self, now: u64) -> Self {
        self.current_price = self.price_at(now);
        self
    }

    /// Amount an English bid must strictly exceed.
    pub fn english_threshold(&self) -> u64 {
        self.bids
            .iter()
            .map(|b| b.amount)
            .max()
            .unwrap_or(self.start_price)
    }

    /// Admit an English bid: strictly greater than every earlier bid and
    /// than the start price.
    pub fn apply_english_bid(&mut self, bid: Bid) -> AuctionResult<()> {
        self.ensure_open()?;
        let threshold = self.english_threshold();
        if bid.amount <= threshold {
            return Err(AuctionError::BidTooLow {
                threshold,
                strictly_greater: true,
            });
        }
        self.current_price = bid.amount;
        self.bids.push(bid);
        Ok(())
    }

    /// Admit a Dutch bid at `now`. The first bid meeting the live price wins
    /// and closes the auction.
    pub fn apply_dutch_bid(&mut self, bid: Bid, now: u64) -> AuctionResult<()> {
        self.ensure_open()?;
        let price = self.price_at(now);
        if bid.amount < price {
            return Err(AuctionError::BidTooLow {
                threshold: price,
                strictly_greater: false,
            });
        }
        self.closed = true;
        self.current_price = bid.amount;
        self.winner = Some(bid.bidder.clone());
        self.final_price = Some(bid.amount);
        self.winning_bid = Some(bid.clone());
        self.bids.push(bid);
        self.close_reason = Some(CloseReason::WinningBid);
        Ok(())
    }

    /// Close explicitly at `now`. English auctions settle on their highest
    /// bid; Dutch auctions freeze the live price and keep whatever winning
    /// bid they already carry.
    pub fn close(&mut self, now: u64) -> AuctionResult<CloseResult> {
        self.ensure_open()?;
        if self.is_dutch() {
            self.current_price = self.price_at(now);
        } else {
            let highest = self
                .bids
                .iter()
                .max_by_key(|b| b.amount)
                .map_or_else(HighestBid::none, HighestBid::from);
            self.highest_bid = Some(highest);
        }
        self.closed = true;
        self.close_reason = Some(CloseReason::ClosedBySeller);
        Ok(self.close_result())
    }

    /// Advance Dutch decay to `now`. Returns `true` when the floor was
    /// reached and the auction closed itself.
    pub fn apply_decay(&mut self, now: u64) -> AuctionResult<bool> {
        self.ensure_open()?;
        let Some(terms) = self.dutch else {
            return Err(AuctionError::InvalidState(format!(
                "auction {} has no decay terms",
                self.auction_id
            )));
        };
        let price = self.price_at(now);
        if price <= terms.minimum_price {
            self.current_price = terms.minimum_price;
            self.closed = true;
            self.close_reason = Some(CloseReason::MinimumPriceReached);
            return Ok(true);
        }
        self.current_price = price;
        Ok(false)
    }

    /// The stored terminal result, without recomputation.
    pub fn close_result(&self) -> CloseResult {
        CloseResult {
            auction_type: self.auction_type,
            highest_bid: self.highest_bid.clone(),
            winning_bid: self.winning_bid.clone(),
        }
    }
}
