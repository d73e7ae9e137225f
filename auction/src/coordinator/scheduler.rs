//! Periodic decay tasks for open Dutch auctions.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::marketplace::AuctionId;

/// What a decay tick asks of its task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auction still open, keep ticking.
    Continue,
    /// Auction closed or the tick failed, end the task.
    Stop,
}

struct ScheduledTask {
    generation: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of per-auction decay tasks.
///
/// At most one task runs per auction, and a task runs its ticks strictly
/// one after another. A task ends when its tick returns
/// [`TickOutcome::Stop`], when [`cancel`](Self::cancel) is called for its
/// auction, or when the scheduler shuts down. Cancelling an auction with no
/// running task does nothing.
#[derive(Clone)]
pub struct DutchPriceScheduler {
    tasks: Arc<Mutex<HashMap<AuctionId, ScheduledTask>>>,
    period: Duration,
    shutdown: CancellationToken,
    generation: Arc<AtomicU64>,
}

impl DutchPriceScheduler {
    pub fn new(period: Duration, shutdown: CancellationToken) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            period,
            shutdown,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub const fn period(&self) -> Duration {
        self.period
    }

    /// Start the decay task for `auction_id`, running `tick` once per period.
    ///
    /// Returns `false` if a task is already running for this auction or the
    /// scheduler has shut down.
    pub fn start<F, Fut>(&self, auction_id: &str, tick: F) -> bool
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = TickOutcome> + Send + 'static,
    {
        if self.shutdown.is_cancelled() {
            debug!("Scheduler shut down, not starting decay for {auction_id}");
            return false;
        }

        let mut tasks = self.tasks.lock();
        if tasks.contains_key(auction_id) {
            debug!("Decay task for {auction_id} already running");
            return false;
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let token = self.shutdown.child_token();
        let handle = tokio::spawn(run_task(
            auction_id.to_string(),
            generation,
            self.period,
            token.clone(),
            self.tasks.clone(),
            tick,
        ));
        tasks.insert(
            auction_id.to_string(),
            ScheduledTask {
                generation,
                token,
                handle,
            },
        );
        drop(tasks);

        info!(
            "Started decay task for {auction_id} (period {:?})",
            self.period
        );
        true
    }

    /// Stop the task for `auction_id`, if any.
    pub fn cancel(&self, auction_id: &str) {
        if let Some(task) = self.tasks.lock().remove(auction_id) {
            task.token.cancel();
            debug!("Cancelled decay task for {auction_id}");
        }
    }

    pub fn is_running(&self, auction_id: &str) -> bool {
        self.tasks.lock().contains_key(auction_id)
    }

    pub fn active_count(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Cancel every task and wait for all of them to finish.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let drained: Vec<(AuctionId, ScheduledTask)> = self.tasks.lock().drain().collect();
        if drained.is_empty() {
            return;
        }
        info!("Stopping {} decay task(s)", drained.len());
        for (auction_id, task) in drained {
            task.token.cancel();
            if let Err(e) = task.handle.await {
                debug!("Decay task for {auction_id} ended abnormally: {e}");
            }
        }
    }
}

async fn run_task<F, Fut>(
    auction_id: AuctionId,
    generation: u64,
    period: Duration,
    token: CancellationToken,
    tasks: Arc<Mutex<HashMap<AuctionId, ScheduledTask>>>,
    tick: F,
) where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = TickOutcome> + Send + 'static,
{
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = token.cancelled() => {
                debug!("Decay task for {auction_id} cancelled");
                break;
            }
            _ = interval.tick() => {}
        }
        if tick().await == TickOutcome::Stop {
            debug!("Decay task for {auction_id} finished");
            break;
        }
    }

    // Only deregister our own entry.
    let mut tasks = tasks.lock();
    if tasks
        .get(&auction_id)
        .is_some_and(|t| t.generation == generation)
    {
        tasks.remove(&auction_id);
    }
}
