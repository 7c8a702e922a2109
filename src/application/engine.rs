use crate::domain::agent::AgentRecord;
use crate::domain::ports::{
    Admission, AgentStoreRef, ClockRef, SystemClock, TransactionStoreRef,
};
use crate::domain::score::{self, ScoreParams};
use crate::domain::transaction::RatedTransaction;
use crate::error::{ReputationError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Tuning knobs for a single unit of work.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub params: ScoreParams,
    /// Attempts for the optimistic read-compute-write loop on the seller.
    pub cas_attempts: u32,
    /// Initial backoff between CAS attempts, doubled each retry.
    pub cas_backoff: Duration,
    /// Attempts for each individual store round trip.
    pub store_attempts: u32,
    /// Initial backoff between store retries, doubled each retry.
    pub store_backoff: Duration,
    /// Budget for the whole unit, covering all store round trips.
    pub unit_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            params: ScoreParams::default(),
            cas_attempts: 5,
            cas_backoff: Duration::from_millis(50),
            store_attempts: 3,
            store_backoff: Duration::from_millis(50),
            unit_timeout: Duration::from_secs(5),
        }
    }
}

/// Result of processing one transaction event.
#[derive(Debug, PartialEq, Clone)]
pub enum ProcessOutcome {
    /// The seller was rescored.
    Updated {
        seller_id: String,
        score: f64,
        weight: f64,
    },
    /// The event was a redelivery of an already-processed transaction.
    Duplicate,
}

/// The main entry point for reputation processing.
///
/// For each admitted transaction the engine decays the seller's prior score,
/// discounts the new rating by the partner-concentration weight, folds both
/// into an EMA, persists the result with a compare-and-set on the seller's
/// revision, and finally annotates the transaction with the weight used.
///
/// Deduplication happens before any computation: `TransactionStore::admit`
/// atomically records the transaction id, so redelivered events are no-ops.
pub struct ReputationEngine {
    agents: AgentStoreRef,
    transactions: TransactionStoreRef,
    clock: ClockRef,
    config: EngineConfig,
}

impl ReputationEngine {
    pub fn new(agents: AgentStoreRef, transactions: TransactionStoreRef) -> Self {
        Self {
            agents,
            transactions,
            clock: Arc::new(SystemClock),
            config: EngineConfig::default(),
        }
    }

    pub fn with_clock(mut self, clock: ClockRef) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Processes a single transaction-created event under the unit timeout.
    pub async fn process_transaction(&self, tx: RatedTransaction) -> Result<ProcessOutcome> {
        tx.validate()?;
        match tokio::time::timeout(self.config.unit_timeout, self.process_admitted(tx)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ReputationError::Timeout(self.config.unit_timeout)),
        }
    }

    async fn process_admitted(&self, tx: RatedTransaction) -> Result<ProcessOutcome> {
        let admission = self.admit_with_retry(&tx).await?;
        let prior_pair_count = match admission {
            Admission::Duplicate => {
                debug!(tx_id = %tx.tx_id, "duplicate delivery, skipping");
                return Ok(ProcessOutcome::Duplicate);
            }
            Admission::Admitted { prior_pair_count } => prior_pair_count,
        };

        let (new_score, weight) = self.update_seller(&tx, prior_pair_count).await?;

        // Audit annotation: idempotent and independent of the score write.
        // The score update stands even if this ultimately fails.
        if let Err(e) = self.annotate_with_retry(&tx.tx_id, weight).await {
            warn!(tx_id = %tx.tx_id, error = %e, "failed to annotate transaction weight");
        }

        debug!(
            tx_id = %tx.tx_id,
            seller_id = %tx.seller_id,
            score = new_score,
            weight,
            "reputation updated"
        );

        Ok(ProcessOutcome::Updated {
            seller_id: tx.seller_id.clone(),
            score: new_score,
            weight,
        })
    }

    /// The read-decay-weight-blend-write sequence, linearized per seller by
    /// a compare-and-set on the agent's revision. A conflicting writer forces
    /// a re-read so the blend never folds into a stale snapshot.
    async fn update_seller(
        &self,
        tx: &RatedTransaction,
        prior_pair_count: u64,
    ) -> Result<(f64, f64)> {
        let params = self.config.params;
        let mut backoff = self.config.cas_backoff;

        for attempt in 1..=self.config.cas_attempts {
            let now = self.clock.now();
            let existing = self.get_agent_with_retry(&tx.seller_id).await?;
            let expected_revision = existing.as_ref().map(|a| a.revision);
            let mut agent = existing.unwrap_or_else(|| AgentRecord::new(&tx.seller_id, now));

            let total_with_current = agent.total_transactions + 1;
            let decayed =
                score::decayed_score(agent.global_reputation, agent.elapsed_days(now), &params);
            let weight = score::collusion_weight(prior_pair_count, total_with_current, &params);
            if weight < 1.0 {
                warn!(
                    seller_id = %tx.seller_id,
                    buyer_id = %tx.buyer_id,
                    partner_ratio = prior_pair_count as f64 / total_with_current as f64,
                    weight,
                    "partner concentration penalty applied"
                );
            }
            let blended = score::blend(decayed, tx.rating, weight, &params);
            agent.apply_score(blended, now);
            let new_score = agent.global_reputation;

            if self.put_agent_with_retry(agent, expected_revision).await? {
                return Ok((new_score, weight));
            }

            debug!(seller_id = %tx.seller_id, attempt, "revision conflict, retrying");
            if attempt < self.config.cas_attempts {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(ReputationError::UpdateConflict {
            agent_id: tx.seller_id.clone(),
            attempts: self.config.cas_attempts,
        })
    }

    async fn get_agent_with_retry(&self, agent_id: &str) -> Result<Option<AgentRecord>> {
        let mut backoff = self.config.store_backoff;
        let mut attempt = 1;
        loop {
            match self.agents.get(agent_id).await {
                Ok(agent) => return Ok(agent),
                Err(e) if e.is_transient() && attempt < self.config.store_attempts => {
                    warn!(%agent_id, attempt, error = %e, "agent read failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn put_agent_with_retry(
        &self,
        agent: AgentRecord,
        expected_revision: Option<u64>,
    ) -> Result<bool> {
        let mut backoff = self.config.store_backoff;
        let mut attempt = 1;
        loop {
            match self
                .agents
                .put_if_revision(agent.clone(), expected_revision)
                .await
            {
                Ok(accepted) => return Ok(accepted),
                Err(e) if e.is_transient() && attempt < self.config.store_attempts => {
                    warn!(agent_id = %agent.id, attempt, error = %e, "agent write failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn admit_with_retry(&self, tx: &RatedTransaction) -> Result<Admission> {
        let mut backoff = self.config.store_backoff;
        let mut attempt = 1;
        loop {
            match self.transactions.admit(tx).await {
                Ok(admission) => return Ok(admission),
                Err(e) if e.is_transient() && attempt < self.config.store_attempts => {
                    warn!(tx_id = %tx.tx_id, attempt, error = %e, "admit failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn annotate_with_retry(&self, tx_id: &str, weight: f64) -> Result<()> {
        let mut backoff = self.config.store_backoff;
        let mut attempt = 1;
        loop {
            match self.transactions.set_weight(tx_id, weight).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.config.store_attempts => {
                    warn!(%tx_id, attempt, error = %e, "weight annotation failed, retrying");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Final state of every scored agent.
    pub async fn results(&self) -> Result<Vec<AgentRecord>> {
        self.agents.all_agents().await
    }
}
