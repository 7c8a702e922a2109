use crate::domain::score::{self, BASELINE};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const MILLIS_PER_DAY: f64 = 1000.0 * 60.0 * 60.0 * 24.0;

/// A scored marketplace participant.
///
/// Created implicitly with baseline reputation the first time an agent
/// appears as a seller; never deleted by this engine. `revision` is the
/// optimistic-concurrency token checked by [`AgentStore::put_if_revision`],
/// bumped on every mutation.
///
/// [`AgentStore::put_if_revision`]: crate::domain::ports::AgentStore::put_if_revision
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AgentRecord {
    /// The unique identifier for the agent.
    pub id: String,
    /// Trust score in [0, 100], baseline 50.
    pub global_reputation: f64,
    /// Count of transactions where this agent was the seller.
    pub total_transactions: u64,
    /// Timestamp of the most recent score mutation. Only moves forward.
    pub last_updated: DateTime<Utc>,
    /// Optimistic concurrency token.
    pub revision: u64,
}

impl AgentRecord {
    pub fn new(id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            global_reputation: BASELINE,
            total_transactions: 0,
            last_updated: now,
            revision: 0,
        }
    }

    /// Days since the last score mutation. A stale observed `now` (clock
    /// skew) yields zero, never a negative interval.
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.last_updated).num_milliseconds();
        (millis as f64 / MILLIS_PER_DAY).max(0.0)
    }

    /// Applies a freshly blended score: clamps to the score domain, rounds to
    /// two decimals, advances the transaction count and timestamp, and bumps
    /// the revision.
    pub fn apply_score(&mut self, blended: f64, now: DateTime<Utc>) {
        self.global_reputation = score::round2(blended.clamp(0.0, 100.0));
        self.total_transactions += 1;
        self.last_updated = now;
        self.revision += 1;
    }
}
