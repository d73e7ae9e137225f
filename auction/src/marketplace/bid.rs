use serde::{Deserialize, Serialize};

/// A single accepted bid. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    /// Opaque bidder identifier
    pub bidder: String,
    /// Bid amount in price units
    pub amount: u64,
    /// Unix timestamp when the bid was accepted
    pub timestamp: u64,
}

impl Bid {
    pub fn new(bidder: impl Into<String>, amount: u64, timestamp: u64) -> Self {
        Self {
            bidder: bidder.into(),
            amount,
            timestamp,
        }
    }
}

/// Result of closing an English auction.
///
/// An auction closed without bids yields the sentinel: amount 0 with no
/// bidder and no timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestBid {
    pub bidder: Option<String>,
    pub amount: u64,
    pub timestamp: Option<u64>,
}

impl HighestBid {
    pub const fn none() -> Self {
        Self {
            bidder: None,
            amount: 0,
            timestamp: None,
        }
    }

    pub const fn is_none(&self) -> bool {
        self.bidder.is_none()
    }
}

impl From<&Bid> for HighestBid {
    fn from(bid: &Bid) -> Self {
        Self {
            bidder: Some(bid.bidder.clone()),
            amount: bid.amount,
            timestamp: Some(bid.timestamp),
        }
    }
}
