//! Application layer containing the reputation pipeline orchestration.
//!
//! [`engine::ReputationEngine`] runs the per-event sequence (admit, decay,
//! collusion weight, blend, persist, annotate) against the store ports.
//! [`dispatcher::ShardedDispatcher`] feeds it from a pool of tokio workers
//! keyed by seller id, so same-seller updates stay ordered while cross-seller
//! work runs in parallel.

pub mod dispatcher;
pub mod engine;
