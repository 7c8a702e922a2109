use crate::domain::agent::AgentRecord;
use crate::domain::ports::{Admission, AgentStore, TransactionStore};
use crate::domain::transaction::RatedTransaction;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A thread-safe in-memory store for agent records.
///
/// The revision check and the write happen under one write lock, which gives
/// `put_if_revision` real compare-and-set semantics. Ideal for tests and for
/// runs where persistence is not required.
#[derive(Default, Clone)]
pub struct InMemoryAgentStore {
    agents: Arc<RwLock<HashMap<String, AgentRecord>>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, agent_id: &str) -> Result<Option<AgentRecord>> {
        let agents = self.agents.read().await;
        Ok(agents.get(agent_id).cloned())
    }

    async fn put_if_revision(
        &self,
        agent: AgentRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool> {
        let mut agents = self.agents.write().await;
        let accepted = match (agents.get(&agent.id), expected_revision) {
            (None, None) => true,
            (Some(current), Some(expected)) => current.revision == expected,
            _ => false,
        };
        if accepted {
            agents.insert(agent.id.clone(), agent);
        }
        Ok(accepted)
    }

    async fn all_agents(&self) -> Result<Vec<AgentRecord>> {
        let agents = self.agents.read().await;
        Ok(agents.values().cloned().collect())
    }
}

#[derive(Default)]
struct TransactionState {
    transactions: HashMap<String, RatedTransaction>,
    pair_counts: HashMap<(String, String), u64>,
}

/// A thread-safe in-memory store for transactions and per-pair counters.
///
/// Both maps live behind a single lock so `admit` observes and mutates them
/// in one atomic step.
#[derive(Default, Clone)]
pub struct InMemoryTransactionStore {
    state: Arc<RwLock<TransactionState>>,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransactionStore for InMemoryTransactionStore {
    async fn admit(&self, tx: &RatedTransaction) -> Result<Admission> {
        let mut state = self.state.write().await;
        if state.transactions.contains_key(&tx.tx_id) {
            return Ok(Admission::Duplicate);
        }
        let key = (tx.buyer_id.clone(), tx.seller_id.clone());
        let prior = state.pair_counts.get(&key).copied().unwrap_or(0);
        state.pair_counts.insert(key, prior + 1);
        state.transactions.insert(tx.tx_id.clone(), tx.clone());
        Ok(Admission::Admitted {
            prior_pair_count: prior,
        })
    }

    async fn get(&self, tx_id: &str) -> Result<Option<RatedTransaction>> {
        let state = self.state.read().await;
        Ok(state.transactions.get(tx_id).cloned())
    }

    async fn set_weight(&self, tx_id: &str, weight: f64) -> Result<()> {
        let mut state = self.state.write().await;
        match state.transactions.get_mut(tx_id) {
            Some(tx) => {
                tx.reputation_weight = Some(weight);
                Ok(())
            }
            None => Err(crate::error::ReputationError::StoreError(format!(
                "unknown transaction {tx_id}"
            ))),
        }
    }

    async fn pair_count(&self, buyer_id: &str, seller_id: &str) -> Result<u64> {
        let state = self.state.read().await;
        Ok(state
            .pair_counts
            .get(&(buyer_id.to_string(), seller_id.to_string()))
            .copied()
            .unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::transaction::Rating;
    use chrono::Utc;

    fn tx(tx_id: &str, buyer: &str, seller: &str) -> RatedTransaction {
        RatedTransaction {
            tx_id: tx_id.to_string(),
            buyer_id: buyer.to_string(),
            seller_id: seller.to_string(),
            rating: Rating::new(5).unwrap(),
            reputation_weight: None,
        }
    }

    #[tokio::test]
    async fn test_agent_store_roundtrip() {
        let store = InMemoryAgentStore::new();
        let agent = AgentRecord::new("seller-1", Utc::now());

        assert!(store.put_if_revision(agent.clone(), None).await.unwrap());
        let retrieved = store.get("seller-1").await.unwrap().unwrap();
        assert_eq!(retrieved, agent);

        assert!(store.get("seller-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_agent_store_cas_rejects_stale_revision() {
        let store = InMemoryAgentStore::new();
        let now = Utc::now();
        let mut agent = AgentRecord::new("seller-1", now);
        store.put_if_revision(agent.clone(), None).await.unwrap();

        // Writer A wins.
        agent.apply_score(60.0, now);
        assert!(store.put_if_revision(agent.clone(), Some(0)).await.unwrap());

        // Writer B computed against the stale revision 0 and must lose.
        let mut stale = AgentRecord::new("seller-1", now);
        stale.apply_score(40.0, now);
        assert!(!store.put_if_revision(stale, Some(0)).await.unwrap());

        let current = store.get("seller-1").await.unwrap().unwrap();
        assert_eq!(current.global_reputation, 60.0);
    }

    #[tokio::test]
    async fn test_agent_store_create_race() {
        let store = InMemoryAgentStore::new();
        let agent = AgentRecord::new("seller-1", Utc::now());
        assert!(store.put_if_revision(agent.clone(), None).await.unwrap());
        // A second creation attempt loses.
        assert!(!store.put_if_revision(agent, None).await.unwrap());
    }

    #[tokio::test]
    async fn test_admit_dedup_and_pair_counter() {
        let store = InMemoryTransactionStore::new();

        let first = store.admit(&tx("t1", "buyer-a", "seller-b")).await.unwrap();
        assert_eq!(
            first,
            Admission::Admitted {
                prior_pair_count: 0
            }
        );

        // Redelivery of the same id is a no-op.
        let dup = store.admit(&tx("t1", "buyer-a", "seller-b")).await.unwrap();
        assert_eq!(dup, Admission::Duplicate);
        assert_eq!(store.pair_count("buyer-a", "seller-b").await.unwrap(), 1);

        // A second transaction for the same pair sees the first.
        let second = store.admit(&tx("t2", "buyer-a", "seller-b")).await.unwrap();
        assert_eq!(
            second,
            Admission::Admitted {
                prior_pair_count: 1
            }
        );

        // Pair counters are directional and exact-pair.
        assert_eq!(store.pair_count("seller-b", "buyer-a").await.unwrap(), 0);
        assert_eq!(store.pair_count("buyer-a", "seller-x").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_set_weight() {
        let store = InMemoryTransactionStore::new();
        store.admit(&tx("t1", "buyer-a", "seller-b")).await.unwrap();

        store.set_weight("t1", 0.6).await.unwrap();
        let stored = store.get("t1").await.unwrap().unwrap();
        assert_eq!(stored.reputation_weight, Some(0.6));

        // Idempotent re-patch.
        store.set_weight("t1", 0.6).await.unwrap();
        assert!(store.set_weight("missing", 1.0).await.is_err());
    }
}
