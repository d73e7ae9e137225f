//! Peer-side registration with bounded retry.

use std::time::Duration;

use tracing::{info, warn};

use super::client::PeerClient;
use crate::config::{REGISTRATION_MAX_ATTEMPTS, REGISTRATION_RETRY_DELAY_SECS};
use crate::error::{AuctionError, AuctionResult};
use crate::traits::{MessageTransport, PeerId};

/// Registers this peer with a coordinator.
///
/// Every failure (transport error, error reply, or a refused registration)
/// is retried after a fixed delay until the attempt budget is spent.
pub struct RegistrationClient<T: MessageTransport> {
    transport: T,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<T: MessageTransport> RegistrationClient<T> {
    pub const fn new(transport: T) -> Self {
        Self {
            transport,
            max_attempts: REGISTRATION_MAX_ATTEMPTS,
            retry_delay: Duration::from_secs(REGISTRATION_RETRY_DELAY_SECS),
        }
    }

    /// Override the retry budget. At least one attempt is always made.
    #[must_use]
    pub fn with_retry(mut self, max_attempts: u32, retry_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_delay = retry_delay;
        self
    }

    /// Register `self_id` with the coordinator at `coordinator`.
    ///
    /// Fails with [`AuctionError::RegistrationExhausted`] once every attempt
    /// has failed; the caller decides whether that is fatal.
    pub async fn register(&self, coordinator: &PeerId, self_id: &str) -> AuctionResult<()> {
        let client = PeerClient::new(self.transport.clone(), coordinator.clone());
        let mut last_error = String::new();

        for attempt in 1..=self.max_attempts {
            match client.register_client(self_id).await {
                Ok(true) => {
                    info!(
                        "Registered with coordinator (attempt {}/{})",
                        attempt, self.max_attempts
                    );
                    return Ok(());
                }
                Ok(false) => {
                    last_error = "coordinator refused registration".to_string();
                }
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            warn!(
                "Registration attempt {}/{} failed: {}",
                attempt, self.max_attempts, last_error
            );
            if attempt < self.max_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }

        Err(AuctionError::RegistrationExhausted {
            attempts: self.max_attempts,
            last_error,
        })
    }
}
