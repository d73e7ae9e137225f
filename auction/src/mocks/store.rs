//! Mock persistent store with failure injection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{AuctionError, AuctionResult};
use crate::traits::KvStore;

/// Failures the mock can simulate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStoreFailure {
    /// Fail every operation.
    All,
    /// Fail only reads.
    Reads,
    /// Fail only writes.
    Writes,
    /// Fail any operation on one key.
    OnKey(String),
}

#[derive(Debug, Default)]
struct MockStoreInner {
    entries: RwLock<HashMap<String, Vec<u8>>>,
    fail_mode: RwLock<Option<MockStoreFailure>>,
    read_latency: RwLock<Option<Duration>>,
    writes: AtomicUsize,
}

/// In-memory store that can be told to fail. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MockStore {
    inner: Arc<MockStoreInner>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or clear the failure mode.
    pub async fn set_fail_mode(&self, mode: Option<MockStoreFailure>) {
        *self.inner.fail_mode.write().await = mode;
    }

    /// Delay every successful `get` after the value is read, so callers
    /// racing on one key get a chance to interleave between read and write.
    pub async fn set_read_latency(&self, latency: Option<Duration>) {
        *self.inner.read_latency.write().await = latency;
    }

    /// Number of successful `put` calls so far.
    pub fn write_count(&self) -> usize {
        self.inner.writes.load(Ordering::SeqCst)
    }

    /// Raw value under `key`, bypassing failure injection.
    pub async fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.entries.read().await.get(key).cloned()
    }

    async fn should_fail(&self, is_write: bool, key: &str) -> bool {
        match &*self.inner.fail_mode.read().await {
            None => false,
            Some(MockStoreFailure::All) => true,
            Some(MockStoreFailure::Reads) => !is_write,
            Some(MockStoreFailure::Writes) => is_write,
            Some(MockStoreFailure::OnKey(k)) => k == key,
        }
    }
}

#[async_trait]
impl KvStore for MockStore {
    async fn get(&self, key: &str) -> AuctionResult<Option<Vec<u8>>> {
        if self.should_fail(false, key).await {
            return Err(AuctionError::Persistence(format!(
                "simulated read failure for {key}"
            )));
        }
        let value = self.inner.entries.read().await.get(key).cloned();
        let latency = *self.inner.read_latency.read().await;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(value)
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> AuctionResult<()> {
        if self.should_fail(true, key).await {
            return Err(AuctionError::Persistence(format!(
                "simulated write failure for {key}"
            )));
        }
        self.inner
            .entries
            .write()
            .await
            .insert(key.to_string(), value);
        self.inner.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
