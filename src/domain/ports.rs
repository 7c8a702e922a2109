use super::agent::AgentRecord;
use super::transaction::RatedTransaction;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub type AgentStoreRef = Arc<dyn AgentStore>;
pub type TransactionStoreRef = Arc<dyn TransactionStore>;
pub type ClockRef = Arc<dyn Clock>;

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>>;

    /// Conditional write keyed on the record's revision.
    ///
    /// `expected_revision` is the revision observed when the record was read,
    /// or `None` to create a record that must not exist yet. Returns `false`
    /// when the condition no longer holds; the caller re-reads and retries.
    async fn put_if_revision(
        &self,
        agent: AgentRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool>;

    async fn all_agents(&self) -> Result<Vec<AgentRecord>>;
}

/// Outcome of admitting a transaction for processing.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Admission {
    /// First delivery. `prior_pair_count` is the number of earlier
    /// transactions between the same buyer/seller pair, excluding this one.
    Admitted { prior_pair_count: u64 },
    /// This transaction id was admitted before; the event is a redelivery.
    Duplicate,
}

#[async_trait]
pub trait TransactionStore: Send + Sync {
    /// Atomically records the transaction and bumps the per-pair counter.
    ///
    /// This is the dedup check-and-set: a second call with the same `tx_id`
    /// returns [`Admission::Duplicate`] and changes nothing. The counter bump
    /// and the transaction write happen in one atomic step, so the returned
    /// prior count is race-free under concurrent writers.
    async fn admit(&self, tx: &RatedTransaction) -> Result<Admission>;

    async fn get(&self, tx_id: &str) -> Result<Option<RatedTransaction>>;

    /// Patches the transaction's `reputation_weight`. Idempotent and safe to
    /// retry independently of the score update.
    async fn set_weight(&self, tx_id: &str, weight: f64) -> Result<()>;

    /// Number of admitted transactions between the pair. Served by a
    /// maintained counter, never a scan.
    async fn pair_count(&self, buyer_id: &str, seller_id: &str) -> Result<u64>;
}

/// Time source, injectable so decay is testable with a fixed clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
