//! In-process simulated ledger.
//!
//! Implements the [`Ledger`]/[`LedgerEntity`] contract against shared
//! in-memory state: every account is a balance plus a routing table mapping
//! an incoming caller to the ordered callees the transfer continues through.
//! Submissions resolve asynchronously with configurable latency, and failure
//! injection knobs cover the error paths the orchestrator must tolerate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, U256};
use async_trait::async_trait;
use dashmap::DashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::oneshot;
use tokio::time::sleep;

use super::ledger::{ClientError, Ledger, LedgerEntity, Receipt};

/// Knobs for the simulated ledger.
#[derive(Clone, Debug)]
pub struct SimConfig {
    /// Base completion delay per operation, milliseconds.
    pub latency_ms: u64,
    /// Extra uniformly-sampled delay on top of the base, milliseconds.
    pub jitter_ms: u64,
    /// Seed for deterministic addresses and delays.
    pub seed: Option<u64>,
    /// The first `fail_deploys` deployment attempts fail.
    pub fail_deploys: u64,
    /// Every k-th submitted operation returns a failed receipt.
    pub fail_every: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self { latency_ms: 2, jitter_ms: 3, seed: None, fail_deploys: 0, fail_every: None }
    }
}

impl SimConfig {
    /// Sets the base completion latency in milliseconds.
    pub fn with_latency_ms(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    /// Sets the latency jitter in milliseconds.
    pub fn with_jitter_ms(mut self, ms: u64) -> Self {
        self.jitter_ms = ms;
        self
    }

    /// Sets the deterministic seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Makes the first `n` deployment attempts fail.
    pub fn with_fail_deploys(mut self, n: u64) -> Self {
        self.fail_deploys = n;
        self
    }

    /// Makes every k-th operation return a failed receipt.
    pub fn with_fail_every(mut self, k: u64) -> Self {
        self.fail_every = Some(k);
        self
    }
}

struct AccountState {
    balance: U256,
    // incoming caller -> ordered callees
    next_calls: HashMap<Address, Vec<Address>>,
}

struct SimInner {
    config: SimConfig,
    origin: Address,
    accounts: DashMap<Address, AccountState>,
    // take_share/add_balance entry addresses, in submission order
    submissions: Mutex<Vec<Address>>,
    unreadable: DashMap<Address, ()>,
    deploys: AtomicU64,
    ops: AtomicU64,
    rng: Mutex<ChaCha8Rng>,
}

impl SimInner {
    fn random_address(&self) -> Address {
        let mut bytes = [0u8; 20];
        self.rng.lock().unwrap().fill(bytes.as_mut_slice());
        Address::from(bytes)
    }

    fn sample_delay(&self) -> Duration {
        let jitter = if self.config.jitter_ms == 0 {
            0
        } else {
            self.rng.lock().unwrap().random_range(0..=self.config.jitter_ms)
        };
        Duration::from_millis(self.config.latency_ms + jitter)
    }

    /// Follows the routing tables from `entry` (as called by the origin
    /// account) for `shares` hops. Returns the visited path, or `None` if
    /// some account has no route for its incoming caller.
    fn walk(&self, entry: Address, shares: u64) -> Option<Vec<Address>> {
        let mut path = Vec::with_capacity(shares as usize);
        let mut from = self.origin;
        let mut current = entry;
        for step in 0..shares {
            path.push(current);
            if step + 1 == shares {
                break;
            }
            let next = {
                let account = self.accounts.get(&current)?;
                account.next_calls.get(&from).and_then(|targets| targets.first().copied())?
            };
            from = current;
            current = next;
        }
        Some(path)
    }

    fn next_op_fails(&self) -> bool {
        let seq = self.ops.fetch_add(1, Ordering::Relaxed) + 1;
        match self.config.fail_every {
            Some(k) => seq % k == 0,
            None => false,
        }
    }

    // Path is resolved before any credit, so a failed operation never
    // mutates balances and the conservation invariant stays exact.
    fn apply_take_share(&self, entry: Address, shares: u64, allow_revert: bool) -> Receipt {
        if self.next_op_fails() {
            return Receipt::failure(format!(
                "takeShare reverted (allow_revert={allow_revert}): injected failure"
            ));
        }
        let Some(path) = self.walk(entry, shares) else {
            return Receipt::failure(format!(
                "takeShare reverted (allow_revert={allow_revert}): no route from {entry}"
            ));
        };
        for addr in &path {
            if let Some(mut account) = self.accounts.get_mut(addr) {
                account.balance += U256::from(1u64);
            }
        }
        Receipt::success()
    }

    fn apply_add_balance(&self, entry: Address, amount: U256) -> Receipt {
        if self.next_op_fails() {
            return Receipt::failure("addBalance reverted: injected failure");
        }
        match self.accounts.get_mut(&entry) {
            Some(mut account) => {
                account.balance += amount;
                Receipt::success()
            }
            None => Receipt::failure(format!("addBalance reverted: unknown entity {entry}")),
        }
    }
}

/// Shared handle to the simulated ledger.
#[derive(Clone)]
pub struct SimLedger {
    inner: Arc<SimInner>,
}

impl SimLedger {
    /// Creates a ledger with the given knobs.
    pub fn new(config: SimConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_os_rng(),
        };
        let mut origin_bytes = [0u8; 20];
        rng.fill(origin_bytes.as_mut_slice());
        Self {
            inner: Arc::new(SimInner {
                config,
                origin: Address::from(origin_bytes),
                accounts: DashMap::new(),
                submissions: Mutex::new(Vec::new()),
                unreadable: DashMap::new(),
                deploys: AtomicU64::new(0),
                ops: AtomicU64::new(0),
                rng: Mutex::new(rng),
            }),
        }
    }

    /// Number of live accounts.
    pub fn account_count(&self) -> usize {
        self.inner.accounts.len()
    }

    /// Number of deployment attempts, including injected failures.
    pub fn deploy_attempts(&self) -> u64 {
        self.inner.deploys.load(Ordering::Relaxed)
    }

    /// Entry addresses of all submitted operations, in submission order.
    pub fn submission_log(&self) -> Vec<Address> {
        self.inner.submissions.lock().unwrap().clone()
    }

    /// Current balance of `addr`, if the account exists.
    pub fn balance_of(&self, addr: Address) -> Option<U256> {
        self.inner.accounts.get(&addr).map(|account| account.balance)
    }

    /// Makes subsequent balance reads of `addr` fail.
    pub fn fail_reads_of(&self, addr: Address) {
        self.inner.unreadable.insert(addr, ());
    }

    /// Follows the routing tables from `entry` for `shares` hops.
    pub fn walk(&self, entry: Address, shares: u64) -> Option<Vec<Address>> {
        self.inner.walk(entry, shares)
    }
}

#[async_trait]
impl Ledger for SimLedger {
    type Entity = SimEntity;

    async fn deploy(&self, initial_balance: U256) -> Result<SimEntity, ClientError> {
        let attempt = self.inner.deploys.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt <= self.inner.config.fail_deploys {
            return Err(ClientError::Deploy(format!("injected deploy failure #{attempt}")));
        }
        sleep(self.inner.sample_delay()).await;
        let address = self.inner.random_address();
        self.inner.accounts.insert(
            address,
            AccountState { balance: initial_balance, next_calls: HashMap::new() },
        );
        Ok(SimEntity { address, inner: self.inner.clone() })
    }

    fn origin(&self) -> Address {
        self.inner.origin
    }
}

/// Handle to one simulated account.
#[derive(Clone)]
pub struct SimEntity {
    address: Address,
    inner: Arc<SimInner>,
}

#[async_trait]
impl LedgerEntity for SimEntity {
    fn address(&self) -> Address {
        self.address
    }

    async fn add_next_call(
        &self,
        from: Address,
        targets: Vec<Address>,
    ) -> Result<(), ClientError> {
        sleep(self.inner.sample_delay()).await;
        let mut account = self
            .inner
            .accounts
            .get_mut(&self.address)
            .ok_or_else(|| ClientError::Call(format!("unknown entity {}", self.address)))?;
        account.next_calls.entry(from).or_default().extend(targets);
        Ok(())
    }

    fn take_share(&self, shares: u64, allow_revert: bool) -> oneshot::Receiver<Receipt> {
        let (tx, rx) = oneshot::channel();
        self.inner.submissions.lock().unwrap().push(self.address);
        let inner = self.inner.clone();
        let entry = self.address;
        tokio::spawn(async move {
            sleep(inner.sample_delay()).await;
            let _ = tx.send(inner.apply_take_share(entry, shares, allow_revert));
        });
        rx
    }

    fn add_balance(&self, amount: U256) -> oneshot::Receiver<Receipt> {
        let (tx, rx) = oneshot::channel();
        self.inner.submissions.lock().unwrap().push(self.address);
        let inner = self.inner.clone();
        let entry = self.address;
        tokio::spawn(async move {
            sleep(inner.sample_delay()).await;
            let _ = tx.send(inner.apply_add_balance(entry, amount));
        });
        rx
    }

    async fn balance(&self) -> Result<U256, ClientError> {
        sleep(self.inner.sample_delay()).await;
        if self.inner.unreadable.contains_key(&self.address) {
            return Err(ClientError::Read(format!("injected read failure for {}", self.address)));
        }
        self.inner
            .accounts
            .get(&self.address)
            .map(|account| account.balance)
            .ok_or_else(|| ClientError::Read(format!("unknown entity {}", self.address)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn deploy_wired_triple(ledger: &SimLedger) -> Vec<SimEntity> {
        let mut entities = Vec::new();
        for _ in 0..3 {
            entities.push(ledger.deploy(U256::ZERO).await.unwrap());
        }
        let addrs: Vec<Address> = entities.iter().map(LedgerEntity::address).collect();
        let origin = ledger.origin();
        // boundary 0, interior 1, boundary 2
        entities[0].add_next_call(origin, vec![addrs[1]]).await.unwrap();
        entities[0].add_next_call(addrs[1], vec![addrs[1]]).await.unwrap();
        entities[1].add_next_call(addrs[0], vec![addrs[2]]).await.unwrap();
        entities[1].add_next_call(addrs[2], vec![addrs[0]]).await.unwrap();
        entities[2].add_next_call(origin, vec![addrs[1]]).await.unwrap();
        entities[2].add_next_call(addrs[1], vec![addrs[1]]).await.unwrap();
        entities
    }

    #[tokio::test]
    async fn take_share_credits_each_ring_node_once() {
        let ledger = SimLedger::new(SimConfig::default().with_seed(7).with_latency_ms(0));
        let entities = deploy_wired_triple(&ledger).await;

        let receipt = entities[0].take_share(3, false).await.unwrap();
        assert!(receipt.ok, "{}", receipt.info);

        for entity in &entities {
            assert_eq!(ledger.balance_of(entity.address()), Some(U256::from(1u64)));
        }
    }

    #[tokio::test]
    async fn failed_take_share_leaves_balances_untouched() {
        let config = SimConfig::default().with_seed(7).with_latency_ms(0).with_fail_every(1);
        let ledger = SimLedger::new(config);
        let entities = deploy_wired_triple(&ledger).await;

        let receipt = entities[0].take_share(3, false).await.unwrap();
        assert!(!receipt.ok);

        for entity in &entities {
            assert_eq!(ledger.balance_of(entity.address()), Some(U256::ZERO));
        }
    }

    #[tokio::test]
    async fn unrouted_entry_fails_the_receipt() {
        let ledger = SimLedger::new(SimConfig::default().with_seed(7).with_latency_ms(0));
        let lone = ledger.deploy(U256::ZERO).await.unwrap();

        let receipt = lone.take_share(2, false).await.unwrap();
        assert!(!receipt.ok);
        assert_eq!(ledger.balance_of(lone.address()), Some(U256::ZERO));
    }

    #[tokio::test]
    async fn injected_deploy_failures_surface_as_errors() {
        let ledger = SimLedger::new(SimConfig::default().with_seed(7).with_fail_deploys(1));
        assert!(ledger.deploy(U256::ZERO).await.is_err());
        assert!(ledger.deploy(U256::ZERO).await.is_ok());
    }
}
