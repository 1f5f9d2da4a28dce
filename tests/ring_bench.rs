//! End-to-end benchmark scenarios against the simulated ledger.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use anyhow::Result;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use transfer_bench::bench::collector::CompletionCollector;
use transfer_bench::bench::dispatch::Dispatcher;
use transfer_bench::bench::run::{self, RingOptions, UniformOptions};
use transfer_bench::bench::topology::TopologyBuilder;
use transfer_bench::{LedgerEntity, NoopSink, RateLimiter, SimConfig, SimLedger};

fn ring_options(nodes: usize, count: u64, qps: u32) -> RingOptions {
    RingOptions {
        group: "test".into(),
        nodes,
        count,
        qps,
        allow_revert: false,
        setup_timeout: Duration::from_secs(10),
        run_timeout: Some(Duration::from_secs(30)),
        seed: Some(42),
    }
}

fn sim(seed: u64) -> SimLedger {
    SimLedger::new(SimConfig::default().with_seed(seed).with_latency_ms(0).with_jitter_ms(2))
}

#[tokio::test(flavor = "multi_thread")]
async fn ring_scenario_three_nodes_four_operations() -> Result<()> {
    let ledger = sim(42);
    let opts = ring_options(3, 4, 100);

    let report = run::run_ring(
        Arc::new(ledger.clone()),
        &opts,
        Arc::new(NoopSink),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(report.completions.received, 4);
    assert_eq!(report.completions.successes, 4);
    assert_eq!(report.completions.errors, 0);

    // all succeeded: sum over the ring is count * nodes
    assert!(report.verification.passed);
    assert_eq!(report.verification.actual, U256::from(12u64));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn dispatch_alternates_strictly_between_the_two_entries() -> Result<()> {
    let ledger = sim(7);
    let limiter = Arc::new(RateLimiter::new(1000)?);
    let workers = Arc::new(Semaphore::new(4));

    let builder = TopologyBuilder::new(
        Arc::new(ledger.clone()),
        limiter.clone(),
        workers,
        Duration::from_secs(10),
    );
    let ring = builder.build_ring(3).await?;

    let (completions, collector) = CompletionCollector::new(5, None, Arc::new(NoopSink));
    let drain = tokio::spawn(collector.drain());

    let dispatcher =
        Dispatcher::new(limiter, Arc::new(NoopSink), completions, CancellationToken::new());
    let submitted = dispatcher.run_ring(&ring, 5, 3, false).await;
    assert_eq!(submitted, 5);

    let report = drain.await?;
    assert_eq!(report.received, 5);

    // ceil(5/2) = 3 to entry 0, floor(5/2) = 2 to entry N-1, interleaved
    let entry_a = ring.entities[0].address();
    let entry_b = ring.entities[2].address();
    assert_eq!(ledger.submission_log(), vec![entry_a, entry_b, entry_a, entry_b, entry_a]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn injected_failures_are_counted_and_the_invariant_still_holds() -> Result<()> {
    let config = SimConfig::default().with_seed(9).with_latency_ms(0).with_fail_every(2);
    let ledger = SimLedger::new(config);
    let opts = ring_options(3, 6, 1000);

    let report = run::run_ring(
        Arc::new(ledger),
        &opts,
        Arc::new(NoopSink),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(report.completions.received, 6);
    assert_eq!(report.completions.errors, 3);
    assert_eq!(report.completions.successes, 3);

    // expected = (count - errors) * nodes = 3 * 3
    assert!(report.verification.passed);
    assert_eq!(report.verification.actual, U256::from(9u64));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn undersized_ring_is_rejected_without_deploying() {
    let ledger = sim(3);
    let opts = ring_options(2, 4, 100);

    let result = run::run_ring(
        Arc::new(ledger.clone()),
        &opts,
        Arc::new(NoopSink),
        CancellationToken::new(),
    )
    .await;

    assert!(result.is_err());
    assert_eq!(ledger.deploy_attempts(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn uniform_scenario_round_robins_and_conserves_credits() -> Result<()> {
    let ledger = sim(21);
    let opts = UniformOptions {
        group: "test".into(),
        users: 2,
        count: 5,
        qps: 1000,
        setup_timeout: Duration::from_secs(10),
        run_timeout: Some(Duration::from_secs(30)),
        seed: Some(21),
    };

    let report = run::run_uniform(
        Arc::new(ledger.clone()),
        &opts,
        Arc::new(NoopSink),
        CancellationToken::new(),
    )
    .await?;

    assert_eq!(report.completions.received, 5);
    assert_eq!(report.completions.successes, 5);
    assert!(report.verification.passed);
    assert_eq!(report.verification.actual, U256::from(5u64));

    // round-robin submission over the two entities
    let log = ledger.submission_log();
    assert_eq!(log.len(), 5);
    assert_eq!(log[0], log[2]);
    assert_eq!(log[2], log[4]);
    assert_eq!(log[1], log[3]);
    assert_ne!(log[0], log[1]);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn cancelled_dispatch_still_accounts_for_in_flight_receipts() -> Result<()> {
    let ledger = sim(5);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = run::run_ring(Arc::new(ledger), &ring_options(3, 100, 10), Arc::new(NoopSink), cancel)
        .await?;

    // nothing was submitted, and the drain ended instead of hanging
    assert_eq!(report.completions.received, 0);
    assert_eq!(report.verification.actual, U256::ZERO);
    assert!(report.verification.passed);
    Ok(())
}
