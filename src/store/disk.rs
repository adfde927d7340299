use crate::core::{
    Adjustment, AdjustmentRegistry, NewReward, PriceCache, PriceEntry, RewardEvent, RewardLedger,
    StoreError,
};
use async_trait::async_trait;
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

const REWARDS: &str = "rewards";
const REWARDS_BY_USER: &str = "rewards_by_user";
const REWARD_KEYS: &str = "reward_keys";
const ADJUSTMENTS: &str = "adjustments";
const PRICES: &str = "prices";

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(value)?)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn id_from_bytes(bytes: &[u8]) -> Result<u64, StoreError> {
    let raw: [u8; 8] = bytes
        .try_into()
        .map_err(|_| StoreError::Other(format!("malformed reward id of {} bytes", bytes.len())))?;
    Ok(u64::from_be_bytes(raw))
}

/// `len(user_id)` as big-endian u32 followed by the id, so one user's prefix
/// never matches another user's keys.
fn user_prefix(user_id: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + user_id.len());
    prefix.extend_from_slice(&(user_id.len() as u32).to_be_bytes());
    prefix.extend_from_slice(user_id.as_bytes());
    prefix
}

/// A fjall keyspace holding every persisted collection.
#[derive(Clone)]
pub struct DiskStore {
    keyspace: Keyspace,
    rewards: PartitionHandle,
    rewards_by_user: PartitionHandle,
    reward_keys: PartitionHandle,
    adjustments: PartitionHandle,
    prices: PartitionHandle,
}

impl DiskStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(path)
            .map_err(|e| StoreError::Other(format!("cannot create {}: {e}", path.display())))?;
        let keyspace = fjall::Config::new(path).open()?;
        let open = |name: &str| keyspace.open_partition(name, PartitionCreateOptions::default());

        let store = Self {
            rewards: open(REWARDS)?,
            rewards_by_user: open(REWARDS_BY_USER)?,
            reward_keys: open(REWARD_KEYS)?,
            adjustments: open(ADJUSTMENTS)?,
            prices: open(PRICES)?,
            keyspace,
        };
        debug!("Opened keyspace at {}", path.display());
        Ok(store)
    }

    pub fn ledger(&self) -> Result<DiskLedger, StoreError> {
        DiskLedger::new(self.clone())
    }

    pub fn adjustments(&self) -> DiskAdjustments {
        DiskAdjustments {
            store: self.clone(),
        }
    }

    pub fn prices(&self) -> DiskPriceCache {
        DiskPriceCache {
            store: self.clone(),
        }
    }

    /// Flushes the journal to disk.
    pub fn persist(&self) -> Result<(), StoreError> {
        self.keyspace.persist(PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Reward ledger over the `rewards` partition, with a per-user index and a
/// uniqueness index next to it.
#[derive(Clone)]
pub struct DiskLedger {
    store: DiskStore,
    // Serializes the duplicate check with the insert; holds the last id.
    last_id: Arc<Mutex<u64>>,
}

impl DiskLedger {
    fn new(store: DiskStore) -> Result<Self, StoreError> {
        let last_id = match store.rewards.last_key_value()? {
            Some((key, _)) => id_from_bytes(&key)?,
            None => 0,
        };
        debug!("Reward ledger resumes after id {last_id}");
        Ok(Self {
            store,
            last_id: Arc::new(Mutex::new(last_id)),
        })
    }

    fn load_event(&self, id: u64) -> Result<Option<RewardEvent>, StoreError> {
        match self.store.rewards.get(id.to_be_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl RewardLedger for DiskLedger {
    async fn record_reward(&self, reward: NewReward) -> Result<RewardEvent, StoreError> {
        let mut last_id = self.last_id.lock().await;
        let unique_key = reward.uniqueness_key();
        if self.store.reward_keys.contains_key(unique_key.as_bytes())? {
            debug!("Duplicate reward for {}/{}", reward.user_id, reward.symbol);
            return Err(reward.conflict());
        }

        let id = *last_id + 1;
        let event = reward.into_event(id);
        let id_bytes = id.to_be_bytes();
        let mut index_key = user_prefix(&event.user_id);
        index_key.extend_from_slice(&id_bytes);

        let mut batch = self.store.keyspace.batch();
        batch.insert(&self.store.rewards, id_bytes.to_vec(), encode(&event)?);
        batch.insert(&self.store.rewards_by_user, index_key, Vec::new());
        batch.insert(
            &self.store.reward_keys,
            unique_key.into_bytes(),
            id_bytes.to_vec(),
        );
        batch.commit()?;

        *last_id = id;
        debug!("Ledger APPEND id {id}");
        Ok(event)
    }

    async fn list_symbols(&self) -> Result<BTreeSet<String>, StoreError> {
        let mut symbols = BTreeSet::new();
        for item in self.store.rewards.iter() {
            let (_, value) = item?;
            let event: RewardEvent = decode(&value)?;
            symbols.insert(event.symbol);
        }
        Ok(symbols)
    }

    async fn all_events_for_user(&self, user_id: &str) -> Result<Vec<RewardEvent>, StoreError> {
        let prefix = user_prefix(user_id);
        let mut events = Vec::new();
        for item in self.store.rewards_by_user.prefix(&prefix) {
            let (key, _) = item?;
            let id = id_from_bytes(&key[prefix.len()..])?;
            match self.load_event(id)? {
                Some(event) => events.push(event),
                None => {
                    return Err(StoreError::Other(format!(
                        "user index points at missing reward {id}"
                    )));
                }
            }
        }
        Ok(events)
    }
}

#[derive(Clone)]
pub struct DiskAdjustments {
    store: DiskStore,
}

#[async_trait]
impl AdjustmentRegistry for DiskAdjustments {
    async fn upsert(&self, adjustment: Adjustment) -> Result<(), StoreError> {
        self.store
            .adjustments
            .insert(adjustment.symbol.as_bytes(), encode(&adjustment)?)?;
        debug!("Adjustment PUT for {}", adjustment.symbol);
        Ok(())
    }

    async fn get(&self, symbol: &str) -> Result<Option<Adjustment>, StoreError> {
        match self.store.adjustments.get(symbol.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<Adjustment>, StoreError> {
        // Keys are symbols, so iteration order is symbol order.
        self.store
            .adjustments
            .iter()
            .map(|item| {
                let (_, value) = item?;
                decode(&value)
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct DiskPriceCache {
    store: DiskStore,
}

#[async_trait]
impl PriceCache for DiskPriceCache {
    async fn get(&self, symbol: &str) -> Result<Option<PriceEntry>, StoreError> {
        match self.store.prices.get(symbol.as_bytes())? {
            Some(bytes) => {
                debug!("Price cache HIT for {symbol}");
                Ok(Some(decode(&bytes)?))
            }
            None => {
                debug!("Price cache MISS for {symbol}");
                Ok(None)
            }
        }
    }

    async fn upsert(&self, entry: PriceEntry) -> Result<(), StoreError> {
        self.store
            .prices
            .insert(entry.symbol.as_bytes(), encode(&entry)?)?;
        debug!("Price cache PUT for {}", entry.symbol);
        Ok(())
    }
}
