use crate::domain::agent::AgentRecord;
use crate::domain::ports::{Admission, AgentStore, TransactionStore};
use crate::domain::transaction::RatedTransaction;
use crate::error::{ReputationError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options, WriteBatch};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family for agent records.
pub const CF_AGENTS: &str = "agents";
/// Column Family for transaction history.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for per-(buyer, seller) counters.
pub const CF_PAIR_COUNTS: &str = "pair_counts";

/// A persistent store implementation using RocksDB.
///
/// Serves both `AgentStore` and `TransactionStore` from separate Column
/// Families. RocksDB has no native compare-and-set, so all read-modify-write
/// operations (`put_if_revision`, `admit`, `set_weight`) are serialized
/// through `write_lock`; `admit` writes the transaction and the counter bump
/// in a single `WriteBatch` so they land atomically.
///
/// `Clone` shares the underlying `Arc<DB>` and the lock.
#[derive(Clone)]
pub struct RocksDbStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDbStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_AGENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PAIR_COUNTS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| ReputationError::StoreError(format!("column family {name} not found")))
    }

    fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| {
            ReputationError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Serialization error: {}", e),
            )))
        })
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes).map_err(|e| {
            ReputationError::InternalError(Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Deserialization error: {}", e),
            )))
        })
    }
}

/// `buyer_id` length-prefixed, then both ids back to back. The prefix makes
/// the segment boundary unambiguous for arbitrary id bytes, so no two
/// distinct pairs can share a key.
fn pair_key(buyer_id: &str, seller_id: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + buyer_id.len() + seller_id.len());
    key.extend_from_slice(&(buyer_id.len() as u32).to_be_bytes());
    key.extend_from_slice(buyer_id.as_bytes());
    key.extend_from_slice(seller_id.as_bytes());
    key
}

fn decode_count(bytes: Option<Vec<u8>>) -> u64 {
    match bytes {
        Some(b) if b.len() == 8 => u64::from_be_bytes(b.try_into().unwrap_or([0; 8])),
        _ => 0,
    }
}

#[async_trait]
impl AgentStore for RocksDbStore {
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>> {
        let cf = self.cf(CF_AGENTS)?;
        match self.db.get_cf(&cf, agent_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn put_if_revision(
        &self,
        agent: AgentRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let cf = self.cf(CF_AGENTS)?;
        let current: Option<AgentRecord> = match self.db.get_cf(&cf, agent.id.as_bytes())? {
            Some(bytes) => Some(Self::decode(&bytes)?),
            None => None,
        };

        let accepted = match (&current, expected_revision) {
            (None, None) => true,
            (Some(stored), Some(expected)) => stored.revision == expected,
            _ => false,
        };
        if accepted {
            let value = Self::encode(&agent)?;
            self.db.put_cf(&cf, agent.id.as_bytes(), value)?;
        }
        Ok(accepted)
    }

    async fn all_agents(&self) -> Result<Vec<AgentRecord>> {
        let cf = self.cf(CF_AGENTS)?;
        let mut agents = Vec::new();
        for item in self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start) {
            let (_key, value) = item?;
            agents.push(Self::decode(&value)?);
        }
        Ok(agents)
    }
}

#[async_trait]
impl TransactionStore for RocksDbStore {
    async fn admit(&self, tx: &RatedTransaction) -> Result<Admission> {
        let _guard = self.write_lock.lock().await;

        let cf_tx = self.cf(CF_TRANSACTIONS)?;
        // Presence check only, no value copy.
        if self.db.get_pinned_cf(&cf_tx, tx.tx_id.as_bytes())?.is_some() {
            return Ok(Admission::Duplicate);
        }

        let cf_pairs = self.cf(CF_PAIR_COUNTS)?;
        let key = pair_key(&tx.buyer_id, &tx.seller_id);
        let prior = decode_count(self.db.get_cf(&cf_pairs, &key)?);

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_tx, tx.tx_id.as_bytes(), Self::encode(tx)?);
        batch.put_cf(&cf_pairs, &key, (prior + 1).to_be_bytes());
        self.db.write(batch)?;

        Ok(Admission::Admitted {
            prior_pair_count: prior,
        })
    }

    async fn get(&self, tx_id: &str) -> Result<Option<RatedTransaction>> {
        let cf = self.cf(CF_TRANSACTIONS)?;
        match self.db.get_cf(&cf, tx_id.as_bytes())? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn set_weight(&self, tx_id: &str, weight: f64) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let cf = self.cf(CF_TRANSACTIONS)?;
        let mut tx: RatedTransaction = match self.db.get_cf(&cf, tx_id.as_bytes())? {
            Some(bytes) => Self::decode(&bytes)?,
            None => {
                return Err(ReputationError::StoreError(format!(
                    "unknown transaction {tx_id}"
                )));
            }
        };
        tx.reputation_weight = Some(weight);
        self.db.put_cf(&cf, tx_id.as_bytes(), Self::encode(&tx)?)?;
        Ok(())
    }

    async fn pair_count(&self, buyer_id: &str, seller_id: &str) -> Result<u64> {
        let cf = self.cf(CF_PAIR_COUNTS)?;
        let key = pair_key(buyer_id, seller_id);
        Ok(decode_count(self.db.get_cf(&cf, &key)?))
    }
}
