//! Transport-agnostic ledger client contracts.
//!
//! The benchmark orchestrator only ever talks to the ledger through these
//! traits. A production client would wrap an RPC connection; the tests and
//! the shipped binary use [`SimLedger`](super::SimLedger), which implements
//! the same contract in-process.

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

/// Errors surfaced at the ledger-client boundary.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Entity deployment was rejected or lost.
    #[error("deployment failed: {0}")]
    Deploy(String),
    /// A synchronous call (edge assignment) failed.
    #[error("call failed: {0}")]
    Call(String),
    /// A state read failed.
    #[error("read failed: {0}")]
    Read(String),
}

/// Outcome of one submitted operation, delivered exactly once per submission.
#[derive(Debug, Clone)]
pub struct Receipt {
    /// Whether the operation executed successfully.
    pub ok: bool,
    /// Human-readable status detail, empty on success.
    pub info: String,
}

impl Receipt {
    /// A successful receipt.
    pub fn success() -> Self {
        Self { ok: true, info: String::new() }
    }

    /// A failed receipt carrying a status detail.
    pub fn failure(info: impl Into<String>) -> Self {
        Self { ok: false, info: info.into() }
    }
}

/// A ledger connection capable of deploying account entities.
#[async_trait]
pub trait Ledger: Send + Sync + 'static {
    /// Handle type for deployed entities.
    type Entity: LedgerEntity;

    /// Deploys one entity with the given starting balance.
    async fn deploy(&self, initial_balance: U256) -> Result<Self::Entity, ClientError>;

    /// The benchmark owner account, used as the external caller when wiring
    /// topology boundaries.
    fn origin(&self) -> Address;
}

/// A deployed, stateful account entity.
///
/// `take_share` and `add_balance` are fire-and-forget submissions: they
/// return immediately with a receiver that resolves exactly once when the
/// ledger has executed the operation. Receipts may arrive in any order
/// relative to submission.
#[async_trait]
pub trait LedgerEntity: Clone + Send + Sync + 'static {
    /// The entity's immutable on-ledger identity.
    fn address(&self) -> Address;

    /// Records a routing edge on this entity: operations arriving from
    /// `from` continue to `targets`, in order.
    async fn add_next_call(
        &self,
        from: Address,
        targets: Vec<Address>,
    ) -> Result<(), ClientError>;

    /// Submits a transfer that credits one unit to each of `shares` entities
    /// reachable through the call topology, starting here.
    fn take_share(&self, shares: u64, allow_revert: bool) -> oneshot::Receiver<Receipt>;

    /// Submits a plain credit of `amount` to this entity.
    fn add_balance(&self, amount: U256) -> oneshot::Receiver<Receipt>;

    /// Reads the entity's current balance.
    async fn balance(&self) -> Result<U256, ClientError>;
}
