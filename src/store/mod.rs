pub mod disk;
pub mod memory;

use crate::core::config::{StorageBackend, StorageConfig};
use crate::core::{AdjustmentRegistry, PriceCache, RewardLedger};
use anyhow::{Context, Result};
use disk::DiskStore;
use memory::{MemoryAdjustments, MemoryLedger, MemoryPriceCache};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// The three collections the service works on, as injectable handles.
#[derive(Clone)]
pub struct Stores {
    pub ledger: Arc<dyn RewardLedger>,
    pub adjustments: Arc<dyn AdjustmentRegistry>,
    pub prices: Arc<dyn PriceCache>,
    disk: Option<DiskStore>,
}

impl Stores {
    pub fn memory() -> Self {
        Self {
            ledger: Arc::new(MemoryLedger::new()),
            adjustments: Arc::new(MemoryAdjustments::new()),
            prices: Arc::new(MemoryPriceCache::new()),
            disk: None,
        }
    }

    pub fn disk(path: &Path) -> Result<Self> {
        let store = DiskStore::open(path)
            .with_context(|| format!("Failed to open data store at {}", path.display()))?;
        Ok(Self {
            ledger: Arc::new(store.ledger()?),
            adjustments: Arc::new(store.adjustments()),
            prices: Arc::new(store.prices()),
            disk: Some(store),
        })
    }

    pub fn open(config: &StorageConfig) -> Result<Self> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory storage");
                Ok(Self::memory())
            }
            StorageBackend::Disk => {
                let path = config.data_dir()?;
                info!("Using disk storage at {}", path.display());
                Self::disk(&path)
            }
        }
    }

    /// Flushes persistent backends; a no-op for memory.
    pub fn persist(&self) -> Result<()> {
        if let Some(store) = &self.disk {
            store.persist().context("Failed to persist data store")?;
        }
        Ok(())
    }
}
