//! Coordinator context hosting the auction coordination engine.
//!
//! [`AuctionCoordinator`] owns the client directory, the auction state
//! machine, the fan-out and the Dutch scheduler for one coordinator id. It
//! is built once per process, started with [`AuctionCoordinator::start`]
//! and torn down with [`AuctionCoordinator::shutdown`].

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::CoordinatorConfig;
use crate::error::AuctionResult;
use crate::traits::{KvStore, MessageTransport, RandomSource, TimeProvider};

pub mod auction_logic;
pub mod directory;
pub mod fanout;
mod handlers;
pub mod scheduler;

pub use auction_logic::{AuctionStateMachine, DutchIndex};
pub use directory::{ClientDirectory, DirectoryOps};
pub use fanout::{FanoutReport, NotificationFanout};
pub use scheduler::{DutchPriceScheduler, TickOutcome};

/// One coordinator instance and everything it owns.
pub struct AuctionCoordinator<S, T, C, R>
where
    S: KvStore,
    T: MessageTransport,
    C: TimeProvider,
    R: RandomSource,
{
    config: CoordinatorConfig,
    directory: DirectoryOps<S>,
    logic: AuctionStateMachine<S, T, C, R>,
    shutdown: CancellationToken,
}

impl<S, T, C, R> AuctionCoordinator<S, T, C, R>
where
    S: KvStore,
    T: MessageTransport,
    C: TimeProvider,
    R: RandomSource,
{
    pub fn new(config: CoordinatorConfig, store: S, transport: T, time: C, rng: R) -> Self {
        let shutdown = CancellationToken::new();
        let directory = DirectoryOps::new(store.clone(), config.coordinator_id.clone());
        let fanout = NotificationFanout::new(directory.clone(), transport, config.fanout_timeout);
        let scheduler = DutchPriceScheduler::new(config.decay_period, shutdown.child_token());
        let logic = AuctionStateMachine::new(
            store,
            time,
            rng,
            fanout,
            scheduler,
            config.coordinator_id.clone(),
        );
        Self {
            config,
            directory,
            logic,
            shutdown,
        }
    }

    pub fn coordinator_id(&self) -> &str {
        &self.config.coordinator_id
    }

    pub const fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub const fn directory(&self) -> &DirectoryOps<S> {
        &self.directory
    }

    pub const fn logic(&self) -> &AuctionStateMachine<S, T, C, R> {
        &self.logic
    }

    /// Resume decay for Dutch auctions left open by a previous run.
    pub async fn start(&self) -> AuctionResult<()> {
        let resumed = self.logic.resume_dutch_auctions().await?;
        info!(
            "Coordinator {} started ({} Dutch auction(s) resumed)",
            self.config.coordinator_id, resumed
        );
        Ok(())
    }

    /// Stop every scheduled task and wait for them to finish.
    pub async fn shutdown(&self) {
        info!("Coordinator {} shutting down", self.config.coordinator_id);
        self.shutdown.cancel();
        self.logic.shutdown().await;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}
