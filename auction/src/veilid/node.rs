//! Veilid node lifecycle: configuration, startup, network attachment, and shutdown.
//!
//! [`VeilidNode`] wraps the Veilid API for an auction process and forwards
//! every `VeilidUpdate` into a channel the entry point consumes.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use veilid_core::{
    api_startup, PrivateSpec, Sequencing, Stability, VeilidAPI, VeilidConfig,
    VeilidConfigInternal, VeilidConfigInternalNetwork, VeilidConfigInternalRPC,
    VeilidConfigNetwork, VeilidConfigProtectedStore, VeilidConfigRoutingTable,
    VeilidConfigTableStore, VeilidUpdate, CRYPTO_KIND_VLD0,
};

use crate::error::{AuctionError, AuctionResult};

/// Snapshot of Veilid node connectivity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeState {
    pub is_attached: bool,
    pub peer_count: usize,
    pub node_ids: Vec<String>,
}

/// Settings for one Veilid node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Directory holding the protected store and table store
    pub data_dir: PathBuf,
    /// Private network key; `None` joins the public network
    pub network_key: Option<String>,
    /// Bootstrap overrides (empty keeps Veilid's defaults)
    pub bootstrap: Vec<String>,
    /// Unencrypted protected storage, for local testing only
    pub insecure_storage: bool,
    pub rpc_timeout_ms: u32,
    pub update_channel_capacity: usize,
}

impl NodeConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            network_key: None,
            bootstrap: Vec::new(),
            insecure_storage: false,
            rpc_timeout_ms: 10_000,
            update_channel_capacity: 1024,
        }
    }
}

/// Manages the Veilid node lifecycle: startup, network attachment, update
/// forwarding, and shutdown.
pub struct VeilidNode {
    api: Option<VeilidAPI>,
    state: Arc<RwLock<NodeState>>,
    config: NodeConfig,
    update_tx: mpsc::Sender<VeilidUpdate>,
    update_rx: Option<mpsc::Receiver<VeilidUpdate>>,
}

impl VeilidNode {
    pub fn new(config: NodeConfig) -> Self {
        let (update_tx, update_rx) = mpsc::channel(config.update_channel_capacity);
        Self {
            api: None,
            state: Arc::new(RwLock::new(NodeState::default())),
            config,
            update_tx,
            update_rx: Some(update_rx),
        }
    }

    /// Start the Veilid API with this node's configuration.
    pub async fn start(&mut self) -> AuctionResult<()> {
        info!("Starting Veilid node...");

        if self.config.insecure_storage {
            warn!(
                "Insecure (unencrypted) protected storage is ENABLED. \
                 Do not use this setting in production."
            );
        }

        let protected_store_dir = self.config.data_dir.join("protected_store");
        let table_store_dir = self.config.data_dir.join("table_store");
        std::fs::create_dir_all(&protected_store_dir).map_err(|e| {
            AuctionError::Config(format!("Failed to create protected_store directory: {e}"))
        })?;
        std::fs::create_dir_all(&table_store_dir).map_err(|e| {
            AuctionError::Config(format!("Failed to create table_store directory: {e}"))
        })?;

        let mut network = VeilidConfigNetwork {
            network_key_password: self.config.network_key.clone(),
            ..Default::default()
        };
        if !self.config.bootstrap.is_empty() {
            info!("Using bootstrap nodes {:?}", self.config.bootstrap);
            network.routing_table = VeilidConfigRoutingTable {
                bootstrap: self.config.bootstrap.clone(),
                ..Default::default()
            };
        }

        let namespace = self
            .config
            .data_dir
            .file_name()
            .and_then(|s| s.to_str())
            .map_or_else(|| "auction".to_string(), |s| format!("auction-{s}"));

        let veilid_config = VeilidConfig {
            program_name: "auction-node".into(),
            namespace,
            protected_store: VeilidConfigProtectedStore {
                always_use_insecure_storage: self.config.insecure_storage,
                directory: protected_store_dir.to_string_lossy().to_string(),
                ..Default::default()
            },
            table_store: VeilidConfigTableStore {
                directory: table_store_dir.to_string_lossy().to_string(),
                ..Default::default()
            },
            network,
            internal: Some(VeilidConfigInternal {
                network: VeilidConfigInternalNetwork {
                    rpc: VeilidConfigInternalRPC {
                        timeout_ms: self.config.rpc_timeout_ms,
                        ..Default::default()
                    },
                    ..Default::default()
                },
            }),
            ..Default::default()
        };

        let state = self.state.clone();
        let update_tx = self.update_tx.clone();

        let update_callback = Arc::new(move |update: VeilidUpdate| {
            match &update {
                VeilidUpdate::Network(network) => {
                    let mut st = state.write();
                    st.peer_count = network.peers.len();
                    st.node_ids = network
                        .node_ids
                        .iter()
                        .map(std::string::ToString::to_string)
                        .collect();
                    let peer_count = st.peer_count;
                    drop(st);
                    debug!("Network update: {} peers", peer_count);
                }
                VeilidUpdate::Attachment(attachment) => {
                    state.write().is_attached = attachment.state.is_attached();
                    info!("Attachment state: {:?}", attachment.state);
                }
                VeilidUpdate::RouteChange(change) => {
                    warn!("Route change: {:?}", change);
                }
                VeilidUpdate::Shutdown => {
                    info!("Veilid shutdown signal received");
                }
                _ => {}
            }

            // Forward for async processing
            if let Err(e) = update_tx.try_send(update) {
                warn!("Veilid update channel full, dropping update: {}", e);
            }
        });

        let api = api_startup(update_callback, veilid_config)
            .await
            .map_err(|e| {
                error!("Veilid API startup failed: {:?}", e);
                AuctionError::Network(format!("Failed to start Veilid API: {e}"))
            })?;

        self.api = Some(api);
        info!("Veilid node started successfully");
        Ok(())
    }

    fn require_api(&self) -> AuctionResult<&VeilidAPI> {
        self.api
            .as_ref()
            .ok_or_else(|| AuctionError::InvalidState("Veilid node not started".into()))
    }

    pub async fn attach(&self) -> AuctionResult<()> {
        let api = self.require_api()?;
        info!("Attaching to Veilid network...");
        api.attach().await?;
        info!("Attached to network");
        Ok(())
    }

    pub async fn detach(&self) -> AuctionResult<()> {
        let api = self.require_api()?;
        info!("Detaching from Veilid network...");
        api.detach().await?;
        info!("Detached from network");
        Ok(())
    }

    /// Poll until the node is attached with at least one node id.
    pub async fn wait_until_attached(&self, limit: Duration) -> AuctionResult<()> {
        let start = tokio::time::Instant::now();
        loop {
            let state = self.state();
            if state.is_attached && !state.node_ids.is_empty() {
                info!(
                    "Node ready: {} peers ({}s)",
                    state.peer_count,
                    start.elapsed().as_secs()
                );
                return Ok(());
            }
            if start.elapsed() > limit {
                return Err(AuctionError::Network(format!(
                    "node not attached after {}s",
                    limit.as_secs()
                )));
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    /// Create a private route to this node and return its blob, hex
    /// encoded. Other peers reach this node by that address.
    pub async fn create_route_address(&self) -> AuctionResult<String> {
        let api = self.require_api()?;
        let route_blob = api
            .new_custom_private_route(PrivateSpec {
                crypto_kinds: vec![CRYPTO_KIND_VLD0],
                stability: Stability::LowLatency,
                sequencing: Sequencing::PreferOrdered,
                ..Default::default()
            })
            .await
            .map_err(|e| AuctionError::Network(format!("Failed to create private route: {e}")))?;

        // Self-import so Veilid marks the route as deliverable.
        api.import_remote_private_route(route_blob.blob.clone())
            .map_err(|e| AuctionError::Network(format!("Failed to self-import route: {e}")))?;

        info!(
            "Created private route {} ({} bytes)",
            route_blob.route_id,
            route_blob.blob.len()
        );
        Ok(hex::encode(&route_blob.blob))
    }

    /// Shut down the Veilid API.
    pub async fn shutdown(&mut self) -> AuctionResult<()> {
        if let Some(api) = self.api.take() {
            info!("Shutting down Veilid node...");
            api.shutdown().await;
            info!("Veilid node shut down");
        }
        Ok(())
    }

    pub const fn api(&self) -> Option<&VeilidAPI> {
        self.api.as_ref()
    }

    pub fn state(&self) -> NodeState {
        self.state.read().clone()
    }

    pub const fn take_update_receiver(&mut self) -> Option<mpsc::Receiver<VeilidUpdate>> {
        self.update_rx.take()
    }
}

impl Drop for VeilidNode {
    fn drop(&mut self) {
        if self.api.is_some() {
            error!("VeilidNode dropped without calling shutdown()! This may cause resource leaks.");
        }
    }
}
