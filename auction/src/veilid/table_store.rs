//! Persistent store backed by a Veilid table.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use veilid_core::{TableDB, VeilidAPI};

use crate::config::TABLE_STORE_NAME;
use crate::error::{AuctionError, AuctionResult};
use crate::traits::KvStore;

const COLUMN: u32 = 0;

/// Single-column Veilid table holding every coordinator record.
#[derive(Clone)]
pub struct VeilidTableStore {
    db: Arc<TableDB>,
}

impl VeilidTableStore {
    /// Open (or create) the auction table on a started node.
    pub async fn open(api: &VeilidAPI) -> AuctionResult<Self> {
        let table_store = api.table_store()?;
        let db = table_store
            .open(TABLE_STORE_NAME, 1)
            .await
            .map_err(|e| AuctionError::Persistence(format!("Failed to open table: {e}")))?;
        info!("Opened table store '{TABLE_STORE_NAME}'");
        Ok(Self { db: Arc::new(db) })
    }
}

#[async_trait]
impl KvStore for VeilidTableStore {
    async fn get(&self, key: &str) -> AuctionResult<Option<Vec<u8>>> {
        self.db
            .load(COLUMN, key.as_bytes())
            .await
            .map_err(|e| AuctionError::Persistence(format!("Failed to load {key}: {e}")))
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> AuctionResult<()> {
        self.db
            .store(COLUMN, key.as_bytes(), &value)
            .await
            .map_err(|e| AuctionError::Persistence(format!("Failed to store {key}: {e}")))
    }
}
