//! Rate-limited operation emission.
//!
//! The dispatcher blocks only on rate-limiter admission. Each submission is
//! handed to the ledger fire-and-forget; a lightweight waiter task measures
//! the latency when the receipt resolves and forwards the completion to the
//! collector channel. Submission order is strict; receipt order is not.

use std::sync::Arc;
use std::time::Instant;

use alloy_primitives::U256;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::bench::collector::Completion;
use crate::bench::limiter::RateLimiter;
use crate::bench::progress::ProgressSink;
use crate::bench::topology::Ring;
use crate::client::{LedgerEntity, Receipt};

/// Emits benchmark operations against deployed entities.
pub struct Dispatcher {
    limiter: Arc<RateLimiter>,
    progress: Arc<dyn ProgressSink>,
    completions: mpsc::Sender<Completion>,
    cancel: CancellationToken,
}

impl Dispatcher {
    /// Creates a dispatcher feeding `completions`.
    pub fn new(
        limiter: Arc<RateLimiter>,
        progress: Arc<dyn ProgressSink>,
        completions: mpsc::Sender<Completion>,
        cancel: CancellationToken,
    ) -> Self {
        Self { limiter, progress, completions, cancel }
    }

    /// Emits `count` `take_share` operations alternating strictly between
    /// the ring's two entry entities, starting at entry 0.
    ///
    /// Returns the number actually submitted (less than `count` only when
    /// cancelled mid-run). Consumes the dispatcher so the completion channel
    /// closes once the final waiter resolves.
    pub async fn run_ring<E: LedgerEntity>(
        self,
        ring: &Ring<E>,
        count: u64,
        shares: u64,
        allow_revert: bool,
    ) -> u64 {
        let first = &ring.entities[0];
        let last = &ring.entities[ring.entities.len() - 1];

        let mut submitted = 0u64;
        for i in 0..count {
            if !self.admit().await {
                warn!(submitted, count, "dispatch cancelled");
                break;
            }
            let entry = if i % 2 == 0 { first } else { last };
            let started = Instant::now();
            let receipt = entry.take_share(shares, allow_revert);
            self.watch(receipt, started);
            self.progress.submitted();
            submitted += 1;
        }
        submitted
    }

    /// Emits `count` `add_balance` operations round-robin over `entities`.
    pub async fn run_uniform<E: LedgerEntity>(
        self,
        entities: &[E],
        count: u64,
        amount: U256,
    ) -> u64 {
        let mut submitted = 0u64;
        for i in 0..count {
            if !self.admit().await {
                warn!(submitted, count, "dispatch cancelled");
                break;
            }
            let entity = &entities[(i as usize) % entities.len()];
            let started = Instant::now();
            let receipt = entity.add_balance(amount);
            self.watch(receipt, started);
            self.progress.submitted();
            submitted += 1;
        }
        submitted
    }

    /// Waits for rate-limiter admission; false when cancelled instead.
    async fn admit(&self) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            _ = self.limiter.acquire() => true,
        }
    }

    fn watch(&self, receipt: oneshot::Receiver<Receipt>, started: Instant) {
        let completions = self.completions.clone();
        tokio::spawn(async move {
            let completion = match receipt.await {
                Ok(receipt) => Completion { ok: receipt.ok, latency: started.elapsed() },
                // a dropped callback still counts, as an error, so the
                // collector's expected total can always be reached
                Err(_) => Completion { ok: false, latency: started.elapsed() },
            };
            let _ = completions.send(completion).await;
        });
    }
}
