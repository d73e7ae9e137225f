//! Configuration constants for the auction coordinator.
//!
//! Timing and retry values live here so they can be tuned in one place;
//! [`CoordinatorConfig`] carries the subset that can be overridden at runtime.

use std::time::Duration;

use crate::error::{AuctionError, AuctionResult};

/// Period between decay ticks of a Dutch auction.
pub const DUTCH_DECAY_PERIOD_SECS: u64 = 5;

/// Per-peer timeout for a single fan-out delivery.
pub const FANOUT_PEER_TIMEOUT_SECS: u64 = 5;

/// Timeout for a peer's request to the coordinator.
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Total registration attempts before a peer gives up.
pub const REGISTRATION_MAX_ATTEMPTS: u32 = 5;

/// Fixed delay between registration attempts.
pub const REGISTRATION_RETRY_DELAY_SECS: u64 = 2;

/// Dutch decrement applied when the opener omits one (units per second).
pub const DEFAULT_DECREMENT_RATE: u64 = 1;

/// Dutch floor applied when the opener omits one.
pub const DEFAULT_MINIMUM_PRICE: u64 = 0;

/// Upper bound for an encoded wire frame.
pub const MAX_WIRE_MESSAGE_SIZE: u64 = 64 * 1024;

/// Upper bound for a persisted CBOR value.
pub const MAX_STORED_VALUE_SIZE: usize = 256 * 1024;

/// Longest accepted item description, in bytes.
pub const MAX_ITEM_LEN: usize = 1024;

/// Longest accepted bidder name, in bytes.
pub const MAX_BIDDER_LEN: usize = 256;

/// Upper bound for an encoded auction record. Kept below the wire frame
/// limit so a `getAuctionDetails` reply always fits in one frame.
pub const MAX_AUCTION_RECORD_SIZE: usize = 48 * 1024;

/// Room an accepting write leaves free so the record can still be closed.
pub const CLOSE_HEADROOM: usize = MAX_BIDDER_LEN + 128;

/// Name of the Veilid table backing the persistent store.
pub const TABLE_STORE_NAME: &str = "auction";

/// Default coordinator identifier (also the directory's store key).
pub const DEFAULT_COORDINATOR_ID: &str = "auction-coordinator";

/// Environment variable overriding the coordinator identifier.
pub const COORDINATOR_ID_ENV: &str = "AUCTION_COORDINATOR_ID";

/// Environment variable overriding the Dutch decay period.
pub const DECAY_PERIOD_ENV: &str = "AUCTION_DECAY_PERIOD_SECS";

/// Environment variable overriding the fan-out timeout.
pub const FANOUT_TIMEOUT_ENV: &str = "AUCTION_FANOUT_TIMEOUT_SECS";

/// Store key of the resume index listing open Dutch auctions.
pub fn dutch_index_key(coordinator_id: &str) -> String {
    format!("{coordinator_id}:dutch")
}

/// Runtime settings of one coordinator instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorConfig {
    /// Identifier under which the client directory is persisted.
    pub coordinator_id: String,
    /// Dutch decay tick period.
    pub decay_period: Duration,
    /// Per-peer fan-out timeout.
    pub fanout_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            coordinator_id: DEFAULT_COORDINATOR_ID.to_string(),
            decay_period: Duration::from_secs(DUTCH_DECAY_PERIOD_SECS),
            fanout_timeout: Duration::from_secs(FANOUT_PEER_TIMEOUT_SECS),
        }
    }
}

impl CoordinatorConfig {
    /// Defaults overridden by whichever `AUCTION_*` variables are set.
    pub fn from_env() -> AuctionResult<Self> {
        let mut config = Self::default();
        if let Ok(id) = std::env::var(COORDINATOR_ID_ENV) {
            if id.trim().is_empty() {
                return Err(AuctionError::Config(format!(
                    "{COORDINATOR_ID_ENV} must not be empty"
                )));
            }
            config.coordinator_id = id;
        }
        if let Some(secs) = env_secs(DECAY_PERIOD_ENV)? {
            config.decay_period = Duration::from_secs(secs);
        }
        if let Some(secs) = env_secs(FANOUT_TIMEOUT_ENV)? {
            config.fanout_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }
}

fn env_secs(var: &str) -> AuctionResult<Option<u64>> {
    match std::env::var(var) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(0) => Err(AuctionError::Config(format!("{var} must be positive"))),
            Ok(secs) => Ok(Some(secs)),
            Err(e) => Err(AuctionError::Config(format!("{var}={raw}: {e}"))),
        },
        Err(_) => Ok(None),
    }
}
