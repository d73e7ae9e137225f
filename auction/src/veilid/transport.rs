//! Request/response transport over Veilid private routes.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;
use veilid_core::{Target, VeilidAPI};

use crate::error::{AuctionError, AuctionResult};
use crate::traits::{MessageTransport, PeerId};

/// Sends `app_call`s to peers addressed by their hex-encoded route blob.
///
/// Each request imports the peer's route, waits for the reply under the
/// caller's timeout, and releases the route again.
#[derive(Clone)]
pub struct VeilidTransport {
    api: VeilidAPI,
}

impl VeilidTransport {
    pub const fn new(api: VeilidAPI) -> Self {
        Self { api }
    }
}

/// Decode a peer address into its route blob.
pub fn decode_peer_address(peer: &str) -> AuctionResult<Vec<u8>> {
    let blob = hex::decode(peer.trim())
        .map_err(|e| AuctionError::InvalidParameter(format!("Invalid peer address: {e}")))?;
    if blob.is_empty() {
        return Err(AuctionError::InvalidParameter(
            "Invalid peer address: empty route blob".into(),
        ));
    }
    Ok(blob)
}

#[async_trait]
impl MessageTransport for VeilidTransport {
    async fn request(
        &self,
        peer: &PeerId,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> AuctionResult<Vec<u8>> {
        let blob = decode_peer_address(peer)?;
        let route_id = self
            .api
            .import_remote_private_route(blob)
            .map_err(|e| AuctionError::Transport(format!("Failed to import peer route: {e}")))?;
        let routing_context = self.api.routing_context()?;

        let result = tokio::time::timeout(
            timeout,
            routing_context.app_call(Target::RouteId(route_id.clone()), payload),
        )
        .await;
        let _ = self.api.release_private_route(route_id);

        match result {
            Ok(Ok(reply)) => {
                debug!("app_call answered with {} bytes", reply.len());
                Ok(reply)
            }
            Ok(Err(e)) => Err(AuctionError::Transport(format!("app_call failed: {e}"))),
            Err(_) => Err(AuctionError::Transport(format!(
                "app_call timed out after {timeout:?}"
            ))),
        }
    }
}
