//! Orchestration of one benchmark run.
//!
//! Wires limiter, topology builder, dispatcher, collector and verifier
//! around a ledger handle passed in explicitly; nothing here holds global
//! state, so runs compose freely in tests.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy_primitives::U256;
use anyhow::{Context, Result};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::bench::collector::CompletionCollector;
use crate::bench::dispatch::Dispatcher;
use crate::bench::limiter::RateLimiter;
use crate::bench::progress::ProgressSink;
use crate::bench::report::{RunConfig, RunReport};
use crate::bench::topology::TopologyBuilder;
use crate::bench::verify::InvariantVerifier;
use crate::client::Ledger;

/// Parameters for one ring run.
#[derive(Debug, Clone)]
pub struct RingOptions {
    /// Ledger group/network label.
    pub group: String,
    /// Ring size.
    pub nodes: usize,
    /// Operations to dispatch.
    pub count: u64,
    /// Submission ceiling, operations/second.
    pub qps: u32,
    /// Revert-allowed flag forwarded on every operation.
    pub allow_revert: bool,
    /// Bound on each setup barrier.
    pub setup_timeout: Duration,
    /// Bound on the receipt drain; `None` waits indefinitely.
    pub run_timeout: Option<Duration>,
    /// Seed echoed into the report.
    pub seed: Option<u64>,
}

/// Parameters for one uniform run.
#[derive(Debug, Clone)]
pub struct UniformOptions {
    /// Ledger group/network label.
    pub group: String,
    /// Number of independent entities.
    pub users: usize,
    /// Operations to dispatch.
    pub count: u64,
    /// Submission ceiling, operations/second.
    pub qps: u32,
    /// Bound on the setup barrier.
    pub setup_timeout: Duration,
    /// Bound on the receipt drain; `None` waits indefinitely.
    pub run_timeout: Option<Duration>,
    /// Seed echoed into the report.
    pub seed: Option<u64>,
}

fn worker_pool() -> Arc<Semaphore> {
    let workers = std::thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(4);
    Arc::new(Semaphore::new(workers))
}

/// Runs the transfer-ring benchmark end to end.
pub async fn run_ring<L: Ledger>(
    ledger: Arc<L>,
    opts: &RingOptions,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    info!(
        group = %opts.group,
        nodes = opts.nodes,
        count = opts.count,
        qps = opts.qps,
        allow_revert = opts.allow_revert,
        "starting transfer ring benchmark"
    );

    let limiter = Arc::new(RateLimiter::new(opts.qps)?);
    let workers = worker_pool();

    let builder =
        TopologyBuilder::new(ledger, limiter.clone(), workers.clone(), opts.setup_timeout);
    let ring = builder.build_ring(opts.nodes).await.context("ring setup failed")?;

    let (completions, collector) =
        CompletionCollector::new(opts.count, opts.run_timeout, progress.clone());
    let drain = tokio::spawn(collector.drain());

    let dispatcher = Dispatcher::new(limiter.clone(), progress.clone(), completions, cancel);
    let started = Instant::now();
    // one share per ring node, so each successful operation credits the
    // whole loop exactly once
    dispatcher.run_ring(&ring, opts.count, opts.nodes as u64, opts.allow_revert).await;

    let completions = drain.await.context("collector task panicked")?;
    let elapsed = started.elapsed();
    progress.finish();
    info!(received = completions.received, "all receipts accounted for");

    let expected =
        U256::from(completions.received - completions.errors) * U256::from(opts.nodes as u64);
    let verifier = InvariantVerifier::new(limiter, workers);
    let verification = verifier.check(&ring.entities, expected).await;

    Ok(RunReport {
        config: RunConfig {
            benchmark: "ring".into(),
            group: opts.group.clone(),
            entities: opts.nodes,
            count: opts.count,
            qps: opts.qps,
            allow_revert: opts.allow_revert,
            seed: opts.seed,
        },
        tps: completions.received as f64 / elapsed.as_secs_f64(),
        elapsed_secs: elapsed.as_secs_f64(),
        completions,
        verification,
    })
}

/// Runs the uniform (no-topology) benchmark end to end.
pub async fn run_uniform<L: Ledger>(
    ledger: Arc<L>,
    opts: &UniformOptions,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
) -> Result<RunReport> {
    info!(
        group = %opts.group,
        users = opts.users,
        count = opts.count,
        qps = opts.qps,
        "starting uniform benchmark"
    );

    let limiter = Arc::new(RateLimiter::new(opts.qps)?);
    let workers = worker_pool();

    let builder =
        TopologyBuilder::new(ledger, limiter.clone(), workers.clone(), opts.setup_timeout);
    let entities = builder.deploy_set(opts.users).await.context("entity setup failed")?;

    let (completions, collector) =
        CompletionCollector::new(opts.count, opts.run_timeout, progress.clone());
    let drain = tokio::spawn(collector.drain());

    let dispatcher = Dispatcher::new(limiter.clone(), progress.clone(), completions, cancel);
    let started = Instant::now();
    dispatcher.run_uniform(&entities, opts.count, U256::from(1u64)).await;

    let completions = drain.await.context("collector task panicked")?;
    let elapsed = started.elapsed();
    progress.finish();

    // every successful credit adds exactly one unit
    let expected = U256::from(completions.received - completions.errors);
    let verifier = InvariantVerifier::new(limiter, workers);
    let verification = verifier.check(&entities, expected).await;

    Ok(RunReport {
        config: RunConfig {
            benchmark: "uniform".into(),
            group: opts.group.clone(),
            entities: opts.users,
            count: opts.count,
            qps: opts.qps,
            allow_revert: false,
            seed: opts.seed,
        },
        tps: completions.received as f64 / elapsed.as_secs_f64(),
        elapsed_secs: elapsed.as_secs_f64(),
        completions,
        verification,
    })
}
