//! Post-run balance conservation check.
//!
//! Reads every entity's balance with bounded, rate-limited concurrency and
//! compares the sum against the analytically expected value. A mismatch is
//! a warning for the operator, never a process failure; unreadable entities
//! degrade the check to a partial verification instead of aborting it.

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::bench::limiter::RateLimiter;
use crate::client::LedgerEntity;

/// Outcome of the conservation check.
#[derive(Debug, Clone, Serialize)]
pub struct Verification {
    /// Analytically expected balance sum.
    pub expected: U256,
    /// Observed balance sum over readable entities.
    pub actual: U256,
    /// Entities whose balance could not be read.
    pub unread: Vec<Address>,
    /// True when every entity was read and the sums match.
    pub passed: bool,
}

/// Checks the global balance invariant after a run.
pub struct InvariantVerifier {
    limiter: Arc<RateLimiter>,
    workers: Arc<Semaphore>,
}

impl InvariantVerifier {
    /// Creates a verifier reading balances on the given worker pool.
    pub fn new(limiter: Arc<RateLimiter>, workers: Arc<Semaphore>) -> Self {
        Self { limiter, workers }
    }

    /// Sums all entity balances and compares against `expected`.
    pub async fn check<E: LedgerEntity>(&self, entities: &[E], expected: U256) -> Verification {
        let mut join = JoinSet::new();
        for entity in entities {
            let entity = entity.clone();
            let limiter = self.limiter.clone();
            let workers = self.workers.clone();
            join.spawn(async move {
                let _permit = workers.acquire_owned().await.ok();
                limiter.acquire().await;
                (entity.address(), entity.balance().await)
            });
        }

        let mut actual = U256::ZERO;
        let mut unread = Vec::new();
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((_, Ok(balance))) => actual += balance,
                Ok((addr, Err(error))) => {
                    warn!(%addr, %error, "balance read failed, reporting partial verification");
                    unread.push(addr);
                }
                Err(error) => warn!(%error, "balance read task panicked"),
            }
        }

        let passed = unread.is_empty() && actual == expected;
        if passed {
            info!(%actual, "balance check passed, total equals expected");
        } else {
            warn!(%actual, %expected, unread = unread.len(), "balance check failed");
        }
        Verification { expected, actual, unread, passed }
    }
}
