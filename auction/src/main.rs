//! Auction node entry point.
//!
//! Runs one Veilid node per process, either as a coordinator or as a peer.
//! Logging goes to stderr; stdout carries JSON lines.
//!
//! Usage:
//!   auction-node coordinator [--ephemeral]
//!   auction-node peer --coordinator <address>
//!
//! Both roles emit a `Ready` line carrying their route address. A peer then
//! reads `PeerCommand` JSON lines from stdin and answers each with a
//! `CommandResponse` line.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use auction::config::{
    CoordinatorConfig, REGISTRATION_MAX_ATTEMPTS, REGISTRATION_RETRY_DELAY_SECS,
};
use auction::traits::{SystemTimeProvider, ThreadRng};
use auction::veilid::decode_peer_address;
use auction::{
    AuctionCoordinator, KvStore, MemoryStore, NodeConfig, PeerClient, PeerEventHandler,
    RegistrationClient, VeilidCoordinator, VeilidNode, VeilidTableStore, VeilidTransport,
};
use clap::{Args, Parser, Subcommand};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use veilid_core::{VeilidAPI, VeilidUpdate};

/// Seconds to wait for network attachment before giving up.
const ATTACH_TIMEOUT_SECS: u64 = 180;

// ── CLI ──────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "auction-node", version, about = "English and Dutch auctions over Veilid")]
struct Cli {
    /// Node data directory (defaults to a per-role temp directory)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Private network key; omit to join the public network
    #[arg(long, global = true)]
    network_key: Option<String>,
    /// Bootstrap nodes, comma separated
    #[arg(long, global = true, value_delimiter = ',')]
    bootstrap: Vec<String>,
    /// Unencrypted protected storage (local testing only)
    #[arg(long, global = true)]
    insecure_storage: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the auction coordinator
    Coordinator(CoordinatorArgs),
    /// Register with a coordinator and take commands on stdin
    Peer(PeerArgs),
}

#[derive(Args)]
struct CoordinatorArgs {
    /// Directory key under which registered peers are persisted
    #[arg(long)]
    coordinator_id: Option<String>,
    /// Dutch decay tick period in seconds
    #[arg(long)]
    decay_period: Option<u64>,
    /// Per-peer fan-out timeout in seconds
    #[arg(long)]
    fanout_timeout: Option<u64>,
    /// Keep auctions in memory instead of the Veilid table store
    #[arg(long)]
    ephemeral: bool,
}

#[derive(Args)]
struct PeerArgs {
    /// Coordinator address printed by `auction-node coordinator`
    #[arg(long)]
    coordinator: String,
    /// Bidder name used for `bid` commands (defaults to an address prefix)
    #[arg(long)]
    name: Option<String>,
    #[arg(long, default_value_t = REGISTRATION_MAX_ATTEMPTS)]
    max_attempts: u32,
    /// Seconds between registration attempts
    #[arg(long, default_value_t = REGISTRATION_RETRY_DELAY_SECS)]
    retry_delay: u64,
}

// ── IPC types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ReadyEvent<'a> {
    event: &'static str,
    role: &'static str,
    address: &'a str,
}

#[derive(Deserialize)]
#[serde(tag = "cmd", rename_all = "lowercase")]
enum PeerCommand {
    Open {
        item: String,
        price: u64,
        auction_type: String,
        decrement_rate: Option<u64>,
        minimum_price: Option<u64>,
    },
    Bid {
        auction_id: String,
        amount: u64,
        bidder: Option<String>,
    },
    Close {
        auction_id: String,
    },
    Details {
        auction_id: String,
    },
    /// Last pushed state this peer saw for an auction
    Watch {
        auction_id: String,
    },
    Shutdown,
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum CommandResponse {
    Ok { data: Option<serde_json::Value> },
    Err { message: String },
}

// ── Helpers ──────────────────────────────────────────────────────────

fn init_logging_stderr() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,veilid_core=warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();
}

fn emit_json(value: &impl Serialize) {
    let line = match serde_json::to_string(value) {
        Ok(line) => line,
        Err(e) => {
            error!("Failed to serialize output: {}", e);
            return;
        }
    };
    let mut stdout = std::io::stdout().lock();
    if let Err(e) = writeln!(stdout, "{line}").and_then(|()| stdout.flush()) {
        error!("stdout write failed: {}", e);
    }
}

fn respond<T: Serialize>(result: auction::AuctionResult<T>) {
    let response = match result.map(|v| serde_json::to_value(&v)) {
        Ok(Ok(data)) => CommandResponse::Ok { data: Some(data) },
        Ok(Err(e)) => CommandResponse::Err {
            message: format!("Failed to encode result: {e}"),
        },
        Err(e) => CommandResponse::Err {
            message: e.to_string(),
        },
    };
    emit_json(&response);
}

fn node_config(cli: &Cli, role: &str) -> NodeConfig {
    let data_dir = cli
        .data_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(format!("auction-{role}")));
    let mut config = NodeConfig::new(data_dir);
    config.network_key.clone_from(&cli.network_key);
    config.bootstrap.clone_from(&cli.bootstrap);
    config.insecure_storage = cli.insecure_storage;
    config
}

/// Start and attach a node, shutting it down again if attachment fails.
async fn start_node(config: NodeConfig) -> anyhow::Result<VeilidNode> {
    let mut node = VeilidNode::new(config);
    node.start().await.context("failed to start Veilid node")?;
    let attached = async {
        node.attach().await?;
        node.wait_until_attached(Duration::from_secs(ATTACH_TIMEOUT_SECS))
            .await
    }
    .await;
    if let Err(e) = attached {
        shutdown_node(node).await;
        return Err(anyhow!(e).context("failed to attach to the network"));
    }
    Ok(node)
}

async fn shutdown_node(mut node: VeilidNode) {
    if let Err(e) = node.detach().await {
        warn!("Detach failed: {}", e);
    }
    if let Err(e) = node.shutdown().await {
        warn!("Shutdown failed: {}", e);
    }
}

fn node_handles(
    node: &mut VeilidNode,
) -> anyhow::Result<(VeilidAPI, mpsc::Receiver<VeilidUpdate>)> {
    let api = node
        .api()
        .cloned()
        .ok_or_else(|| anyhow!("Veilid API not available"))?;
    let updates = node
        .take_update_receiver()
        .ok_or_else(|| anyhow!("update receiver already taken"))?;
    Ok((api, updates))
}

/// Answer every `AppCall` with `handler`, one task per call.
fn spawn_call_loop<F, Fut>(
    api: VeilidAPI,
    mut updates: mpsc::Receiver<VeilidUpdate>,
    handler: F,
) -> tokio::task::JoinHandle<()>
where
    F: Fn(Vec<u8>) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = auction::AuctionResult<Vec<u8>>> + Send + 'static,
{
    let handler = Arc::new(handler);
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let VeilidUpdate::AppCall(call) = update else {
                continue;
            };
            let api = api.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let call_id = call.id();
                let response = match (*handler)(call.message().to_vec()).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!("AppCall error: {}", e);
                        vec![0x00]
                    }
                };
                if let Err(e) = api.app_call_reply(call_id, response).await {
                    error!("app_call_reply error: {}", e);
                }
            });
        }
    })
}

// ── Coordinator ──────────────────────────────────────────────────────

async fn run_coordinator(node_config: NodeConfig, args: CoordinatorArgs) -> anyhow::Result<()> {
    let mut config = CoordinatorConfig::from_env()?;
    if let Some(id) = args.coordinator_id {
        config.coordinator_id = id;
    }
    if let Some(secs) = args.decay_period.filter(|s| *s > 0) {
        config.decay_period = Duration::from_secs(secs);
    }
    if let Some(secs) = args.fanout_timeout.filter(|s| *s > 0) {
        config.fanout_timeout = Duration::from_secs(secs);
    }

    let mut node = start_node(node_config).await?;
    let result = async {
        let (api, updates) = node_handles(&mut node)?;
        let address = node.create_route_address().await?;
        let transport = VeilidTransport::new(api.clone());
        if args.ephemeral {
            info!("Ephemeral mode: auctions are kept in memory");
            let coordinator = AuctionCoordinator::new(
                config,
                MemoryStore::new(),
                transport,
                SystemTimeProvider::new(),
                ThreadRng::new(),
            );
            serve_coordinator(Arc::new(coordinator), api, updates, &address).await
        } else {
            let store = VeilidTableStore::open(&api).await?;
            let coordinator = AuctionCoordinator::new(
                config,
                store,
                transport,
                SystemTimeProvider::new(),
                ThreadRng::new(),
            );
            serve_coordinator(Arc::new(coordinator), api, updates, &address).await
        }
    }
    .await;
    shutdown_node(node).await;
    result
}

async fn serve_coordinator<S: KvStore>(
    coordinator: Arc<VeilidCoordinator<S>>,
    api: VeilidAPI,
    updates: mpsc::Receiver<VeilidUpdate>,
    address: &str,
) -> anyhow::Result<()> {
    coordinator.start().await?;

    let handler_coordinator = coordinator.clone();
    let call_loop = spawn_call_loop(api, updates, move |data| {
        let coordinator = handler_coordinator.clone();
        async move { coordinator.process_call(&data).await }
    });

    emit_json(&ReadyEvent {
        event: "Ready",
        role: "coordinator",
        address,
    });
    info!(
        "Coordinator {} serving, Ctrl-C to stop",
        coordinator.coordinator_id()
    );

    let signal = tokio::signal::ctrl_c().await;
    if let Err(e) = signal {
        warn!("Signal handler failed: {}", e);
    }

    call_loop.abort();
    coordinator.shutdown().await;
    info!("Coordinator stopped");
    Ok(())
}

// ── Peer ─────────────────────────────────────────────────────────────

async fn run_peer(node_config: NodeConfig, args: PeerArgs) -> anyhow::Result<()> {
    decode_peer_address(&args.coordinator).context("invalid --coordinator address")?;

    let mut node = start_node(node_config).await?;
    let result = serve_peer(&mut node, args).await;
    shutdown_node(node).await;
    result
}

async fn serve_peer(node: &mut VeilidNode, args: PeerArgs) -> anyhow::Result<()> {
    let (api, updates) = node_handles(node)?;
    let address = node.create_route_address().await?;

    let events = PeerEventHandler::new();
    let handler_events = events.clone();
    let call_loop = spawn_call_loop(api.clone(), updates, move |data| {
        let reply = handler_events.process_call(&data);
        async move { reply }
    });

    let transport = VeilidTransport::new(api);
    RegistrationClient::new(transport.clone())
        .with_retry(args.max_attempts, Duration::from_secs(args.retry_delay))
        .register(&args.coordinator, &address)
        .await?;

    emit_json(&ReadyEvent {
        event: "Ready",
        role: "peer",
        address: &address,
    });

    let client = PeerClient::new(transport, args.coordinator.clone());
    let default_bidder = args
        .name
        .unwrap_or_else(|| format!("peer-{}", address.get(..8).unwrap_or(&address)));
    command_loop(&client, &events, &default_bidder).await;

    call_loop.abort();
    Ok(())
}

async fn command_loop(
    client: &PeerClient<VeilidTransport>,
    events: &PeerEventHandler,
    default_bidder: &str,
) {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(l)) => l,
            Ok(None) => {
                info!("stdin closed, shutting down");
                break;
            }
            Err(e) => {
                error!("stdin read error: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd: PeerCommand = match serde_json::from_str(&line) {
            Ok(c) => c,
            Err(e) => {
                emit_json(&CommandResponse::Err {
                    message: format!("Invalid command JSON: {e}"),
                });
                continue;
            }
        };

        match cmd {
            PeerCommand::Open {
                item,
                price,
                auction_type,
                decrement_rate,
                minimum_price,
            } => respond(
                client
                    .open_auction(&item, price, &auction_type, decrement_rate, minimum_price)
                    .await
                    .map(|auction_id| serde_json::json!({ "auctionId": auction_id })),
            ),
            PeerCommand::Bid {
                auction_id,
                amount,
                bidder,
            } => {
                let bidder = bidder.as_deref().unwrap_or(default_bidder);
                respond(client.place_bid(&auction_id, bidder, amount).await);
            }
            PeerCommand::Close { auction_id } => {
                respond(client.close_auction(&auction_id).await);
            }
            PeerCommand::Details { auction_id } => {
                respond(client.get_auction_details(&auction_id).await);
            }
            PeerCommand::Watch { auction_id } => respond(Ok(events.view(&auction_id))),
            PeerCommand::Shutdown => {
                info!("Shutdown command received");
                emit_json(&CommandResponse::Ok { data: None });
                break;
            }
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging_stderr();

    let role = match cli.command {
        Command::Coordinator(_) => "coordinator",
        Command::Peer(_) => "peer",
    };
    let config = node_config(&cli, role);
    let result = match cli.command {
        Command::Coordinator(args) => run_coordinator(config, args).await,
        Command::Peer(args) => run_peer(config, args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
