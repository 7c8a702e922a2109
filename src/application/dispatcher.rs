use crate::application::engine::{ProcessOutcome, ReputationEngine};
use crate::domain::transaction::RatedTransaction;
use crate::error::{ReputationError, Result};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

const WORKER_QUEUE_DEPTH: usize = 1024;

/// Routes transaction-created events to a fixed pool of workers.
///
/// Events are sharded by `seller_id`, so every update for a given seller runs
/// on the same worker in arrival order, while different sellers proceed in
/// parallel. Failed units are logged with their transaction id for manual
/// reconciliation; they are never silently dropped.
pub struct ShardedDispatcher {
    senders: Vec<mpsc::Sender<RatedTransaction>>,
    workers: Vec<JoinHandle<()>>,
}

impl ShardedDispatcher {
    pub fn new(engine: Arc<ReputationEngine>, worker_count: usize) -> Self {
        let worker_count = worker_count.max(1);
        let mut senders = Vec::with_capacity(worker_count);
        let mut workers = Vec::with_capacity(worker_count);

        for worker_id in 0..worker_count {
            let (sender, mut receiver) = mpsc::channel::<RatedTransaction>(WORKER_QUEUE_DEPTH);
            let engine = engine.clone();

            workers.push(tokio::spawn(async move {
                while let Some(tx) = receiver.recv().await {
                    let tx_id = tx.tx_id.clone();
                    match engine.process_transaction(tx).await {
                        Ok(ProcessOutcome::Updated {
                            seller_id,
                            score,
                            weight,
                        }) => {
                            debug!(worker_id, %tx_id, %seller_id, score, weight, "processed");
                        }
                        Ok(ProcessOutcome::Duplicate) => {
                            debug!(worker_id, %tx_id, "duplicate delivery ignored");
                        }
                        Err(e) => {
                            error!(
                                worker_id,
                                %tx_id,
                                error = %e,
                                "transaction left unprocessed, needs reconciliation"
                            );
                        }
                    }
                }
            }));

            senders.push(sender);
        }

        Self { senders, workers }
    }

    fn shard(&self, seller_id: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        seller_id.hash(&mut hasher);
        (hasher.finish() as usize) % self.senders.len()
    }

    /// Queues an event on the worker owning its seller.
    pub async fn dispatch(&self, tx: RatedTransaction) -> Result<()> {
        let shard = self.shard(&tx.seller_id);
        self.senders[shard]
            .send(tx)
            .await
            .map_err(|_| ReputationError::StoreError("dispatcher is shut down".to_string()))
    }

    /// Closes the queues and waits for all in-flight work to finish.
    pub async fn shutdown(self) -> Result<()> {
        drop(self.senders);
        for worker in self.workers {
            worker.await.map_err(|e| {
                ReputationError::InternalError(Box::new(std::io::Error::other(format!(
                    "worker panicked: {e}"
                ))))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AgentStore;
    use crate::domain::transaction::Rating;
    use crate::infrastructure::in_memory::{InMemoryAgentStore, InMemoryTransactionStore};

    fn tx(tx_id: &str, buyer: &str, seller: &str, stars: u8) -> RatedTransaction {
        RatedTransaction {
            tx_id: tx_id.to_string(),
            buyer_id: buyer.to_string(),
            seller_id: seller.to_string(),
            rating: Rating::new(stars).unwrap(),
            reputation_weight: None,
        }
    }

    #[tokio::test]
    async fn test_same_seller_events_apply_in_order() {
        let agents = Arc::new(InMemoryAgentStore::new());
        let engine = Arc::new(ReputationEngine::new(
            agents.clone(),
            Arc::new(InMemoryTransactionStore::new()),
        ));
        let dispatcher = ShardedDispatcher::new(engine, 4);

        // 20 distinct buyers, one seller: every event must be counted.
        for i in 0..20 {
            dispatcher
                .dispatch(tx(&format!("t{i}"), &format!("buyer-{i}"), "seller-b", 5))
                .await
                .unwrap();
        }
        dispatcher.shutdown().await.unwrap();

        let agent = agents.get("seller-b").await.unwrap().unwrap();
        assert_eq!(agent.total_transactions, 20);
        // Repeated 5-star ratings pull the score above baseline.
        assert!(agent.global_reputation > 50.0);
        assert!(agent.global_reputation <= 100.0);
    }

    #[tokio::test]
    async fn test_sellers_are_independent() {
        let agents = Arc::new(InMemoryAgentStore::new());
        let engine = Arc::new(ReputationEngine::new(
            agents.clone(),
            Arc::new(InMemoryTransactionStore::new()),
        ));
        let dispatcher = ShardedDispatcher::new(engine, 2);

        dispatcher
            .dispatch(tx("t1", "buyer-a", "seller-1", 5))
            .await
            .unwrap();
        dispatcher
            .dispatch(tx("t2", "buyer-a", "seller-2", 1))
            .await
            .unwrap();
        dispatcher.shutdown().await.unwrap();

        let high = agents.get("seller-1").await.unwrap().unwrap();
        let low = agents.get("seller-2").await.unwrap().unwrap();
        assert_eq!(high.global_reputation, 55.0);
        assert_eq!(low.global_reputation, 47.0);
    }

    #[tokio::test]
    async fn test_shard_is_stable_per_seller() {
        let engine = Arc::new(ReputationEngine::new(
            Arc::new(InMemoryAgentStore::new()),
            Arc::new(InMemoryTransactionStore::new()),
        ));
        let dispatcher = ShardedDispatcher::new(engine, 8);

        for seller in ["seller-1", "seller-2", "a", ""] {
            let first = dispatcher.shard(seller);
            assert!(first < 8);
            assert_eq!(dispatcher.shard(seller), first);
        }
        dispatcher.shutdown().await.unwrap();
    }
}
