//! Entity deployment and ring wiring.
//!
//! Both setup phases fan out over a bounded worker pool and close on a
//! barrier. The barriers short-circuit on the first task error and are
//! wrapped in a setup timeout, so a lost deployment surfaces as a diagnosed
//! failure instead of an indefinite hang.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use anyhow::{Context, Result, anyhow, ensure};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::info;

use crate::bench::limiter::RateLimiter;
use crate::client::{Ledger, LedgerEntity};

/// Smallest ring that still has two distinct entry points and an interior.
pub const MIN_RING_NODES: usize = 3;

/// Starting balance for every deployed entity.
pub const INIT_BALANCE: u64 = 0;

/// A deployed ring: N entities wired into a closed transfer loop, with the
/// origin account routed through both boundary entities.
pub struct Ring<E: LedgerEntity> {
    /// Entities in ring order; index 0 and N-1 are the entry points.
    pub entities: Vec<E>,
    /// The external caller address wired at the boundaries.
    pub origin: Address,
}

impl<E: LedgerEntity> std::fmt::Debug for Ring<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("entities", &self.addresses())
            .field("origin", &self.origin)
            .finish()
    }
}

impl<E: LedgerEntity> Ring<E> {
    /// Addresses of all entities, in ring order.
    pub fn addresses(&self) -> Vec<Address> {
        self.entities.iter().map(LedgerEntity::address).collect()
    }
}

/// Routing entries for entity `index` in a ring over `addrs` with the given
/// origin: interior entities relay between their two neighbours, boundary
/// entities accept the origin and bounce their single neighbour back.
///
/// Callers must pass a ring of at least two addresses.
fn ring_routes(index: usize, addrs: &[Address], origin: Address) -> Vec<(Address, Vec<Address>)> {
    assert!(addrs.len() >= 2, "a ring needs at least two addresses");
    let last = addrs.len() - 1;
    if index == 0 {
        vec![(origin, vec![addrs[1]]), (addrs[1], vec![addrs[1]])]
    } else if index == last {
        vec![(origin, vec![addrs[last - 1]]), (addrs[last - 1], vec![addrs[last - 1]])]
    } else {
        vec![(addrs[index - 1], vec![addrs[index + 1]]), (addrs[index + 1], vec![addrs[index - 1]])]
    }
}

/// Deploys entity sets and wires ring call relationships.
pub struct TopologyBuilder<L: Ledger> {
    ledger: Arc<L>,
    limiter: Arc<RateLimiter>,
    workers: Arc<Semaphore>,
    setup_timeout: Duration,
}

impl<L: Ledger> TopologyBuilder<L> {
    /// Creates a builder running setup tasks on a pool of `workers` permits.
    pub fn new(
        ledger: Arc<L>,
        limiter: Arc<RateLimiter>,
        workers: Arc<Semaphore>,
        setup_timeout: Duration,
    ) -> Self {
        Self { ledger, limiter, workers, setup_timeout }
    }

    /// Deploys `nodes` entities and wires them into a closed ring.
    ///
    /// Rejects `nodes < MIN_RING_NODES` before any deployment work.
    pub async fn build_ring(&self, nodes: usize) -> Result<Ring<L::Entity>> {
        ensure!(
            nodes >= MIN_RING_NODES,
            "a transfer ring needs at least {MIN_RING_NODES} nodes, got {nodes}"
        );

        info!(nodes, "deploying ring entities");
        let entities = timeout(self.setup_timeout, self.deploy_all(nodes))
            .await
            .context("entity deployment timed out")??;

        let addrs: Vec<Address> = entities.iter().map(LedgerEntity::address).collect();
        let origin = self.ledger.origin();

        info!(nodes, "assigning call relationships");
        timeout(self.setup_timeout, self.wire_ring(&entities, &addrs, origin))
            .await
            .context("edge assignment timed out")??;

        info!("ring topology ready");
        Ok(Ring { entities, origin })
    }

    /// Deploys `users` independent entities with no call relationships.
    pub async fn deploy_set(&self, users: usize) -> Result<Vec<L::Entity>> {
        ensure!(users >= 1, "need at least one entity, got {users}");
        info!(users, "deploying entities");
        timeout(self.setup_timeout, self.deploy_all(users))
            .await
            .context("entity deployment timed out")?
    }

    async fn deploy_all(&self, nodes: usize) -> Result<Vec<L::Entity>> {
        let mut join = JoinSet::new();
        for index in 0..nodes {
            let ledger = self.ledger.clone();
            let limiter = self.limiter.clone();
            let workers = self.workers.clone();
            join.spawn(async move {
                let _permit = workers.acquire_owned().await.context("worker pool closed")?;
                limiter.acquire().await;
                let entity = ledger
                    .deploy(U256::from(INIT_BALANCE))
                    .await
                    .with_context(|| format!("failed to deploy entity {index}"))?;
                Ok::<_, anyhow::Error>((index, entity))
            });
        }

        // Index-disjoint slots; each worker owns exactly one index. The
        // first task error aborts the rest of the set.
        let mut slots: Vec<Option<L::Entity>> = (0..nodes).map(|_| None).collect();
        while let Some(joined) = join.join_next().await {
            let (index, entity) = joined.context("deployment task panicked")??;
            slots[index] = Some(entity);
        }

        let mut entities = Vec::with_capacity(nodes);
        for (index, slot) in slots.into_iter().enumerate() {
            entities.push(slot.ok_or_else(|| anyhow!("entity {index} missing after deployment"))?);
        }
        Ok(entities)
    }

    async fn wire_ring(
        &self,
        entities: &[L::Entity],
        addrs: &[Address],
        origin: Address,
    ) -> Result<()> {
        let mut join = JoinSet::new();
        for (index, entity) in entities.iter().enumerate() {
            let entity = entity.clone();
            let limiter = self.limiter.clone();
            let workers = self.workers.clone();
            let routes = ring_routes(index, addrs, origin);
            join.spawn(async move {
                let _permit = workers.acquire_owned().await.context("worker pool closed")?;
                limiter.acquire().await;
                for (from, targets) in routes {
                    entity
                        .add_next_call(from, targets)
                        .await
                        .with_context(|| format!("failed to assign edges for entity {index}"))?;
                }
                Ok::<_, anyhow::Error>(())
            });
        }
        while let Some(joined) = join.join_next().await {
            joined.context("edge assignment task panicked")??;
        }
        Ok(())
    }
}
