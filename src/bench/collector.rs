//! Completion fan-in and aggregate counting.
//!
//! One `Completion` flows through a bounded channel per submitted
//! operation. The collector owns the receiving side and drains until the
//! expected count is reached, the channel closes, or the run timeout
//! expires; this drain is the single synchronization point between dispatch
//! and verification. Arrival order is arbitrary.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, timeout_at};
use tracing::warn;

use crate::bench::progress::ProgressSink;

/// Outcome of one operation as observed by the dispatcher's waiter.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Whether the receipt reported success.
    pub ok: bool,
    /// Submission-to-receipt latency.
    pub latency: Duration,
}

/// Aggregated completion counts for one run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectorReport {
    /// Operations the run intended to submit.
    pub expected: u64,
    /// Receipts actually observed.
    pub received: u64,
    /// Receipts with ok status.
    pub successes: u64,
    /// Receipts with failed status.
    pub errors: u64,
    /// Sum of all observed latencies, milliseconds.
    pub total_latency_ms: u64,
    /// Mean latency over observed receipts, milliseconds.
    pub mean_latency_ms: f64,
}

/// Fan-in aggregator for operation completions.
pub struct CompletionCollector {
    rx: mpsc::Receiver<Completion>,
    expected: u64,
    run_timeout: Option<Duration>,
    progress: Arc<dyn ProgressSink>,
}

impl CompletionCollector {
    /// Creates a collector expecting `expected` completions, returning the
    /// sender side for the dispatcher's waiters.
    pub fn new(
        expected: u64,
        run_timeout: Option<Duration>,
        progress: Arc<dyn ProgressSink>,
    ) -> (mpsc::Sender<Completion>, Self) {
        // One slot per expected completion so waiters never block the
        // runtime, capped to keep huge runs bounded.
        let capacity = expected.clamp(1, 65_536) as usize;
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx, expected, run_timeout, progress })
    }

    /// Drains completions until the expected count is observed.
    ///
    /// Returns early when every sender is gone (dispatch was cancelled) or
    /// when the run timeout expires; the report then carries fewer received
    /// than expected.
    pub async fn drain(mut self) -> CollectorReport {
        let deadline = self.run_timeout.map(|t| Instant::now() + t);
        let mut received = 0u64;
        let mut successes = 0u64;
        let mut errors = 0u64;
        let mut total_latency = Duration::ZERO;

        while received < self.expected {
            let next = match deadline {
                Some(deadline) => match timeout_at(deadline, self.rx.recv()).await {
                    Ok(next) => next,
                    Err(_) => {
                        warn!(
                            received,
                            expected = self.expected,
                            "run timeout expired while waiting for receipts"
                        );
                        break;
                    }
                },
                None => self.rx.recv().await,
            };
            let Some(completion) = next else {
                break;
            };

            received += 1;
            total_latency += completion.latency;
            self.progress.received();
            if completion.ok {
                successes += 1;
            } else {
                errors += 1;
                self.progress.errored();
            }
        }

        // The mean keeps sub-millisecond precision; only the integer total
        // is truncated for the report.
        let mean_latency_ms = if received > 0 {
            total_latency.as_secs_f64() * 1000.0 / received as f64
        } else {
            0.0
        };
        CollectorReport {
            total_latency_ms: total_latency.as_millis() as u64,
            expected: self.expected,
            received,
            successes,
            errors,
            mean_latency_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::progress::NoopSink;
    use tokio::time::sleep;

    #[tokio::test]
    async fn counts_are_complete_under_arbitrary_arrival_order() {
        let (tx, collector) = CompletionCollector::new(100, None, Arc::new(NoopSink));
        for i in 0u64..100 {
            let tx = tx.clone();
            tokio::spawn(async move {
                // deterministic but thoroughly shuffled arrival
                sleep(Duration::from_millis(i * 7 % 23)).await;
                let completion =
                    Completion { ok: i % 5 != 0, latency: Duration::from_millis(i) };
                let _ = tx.send(completion).await;
            });
        }
        drop(tx);

        let report = collector.drain().await;
        assert_eq!(report.received, 100);
        assert_eq!(report.successes, 80);
        assert_eq!(report.errors, 20);
        assert_eq!(report.successes + report.errors, report.expected);
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_bounds_the_wait() {
        let (tx, collector) =
            CompletionCollector::new(2, Some(Duration::from_millis(50)), Arc::new(NoopSink));
        tx.send(Completion { ok: true, latency: Duration::from_millis(1) }).await.unwrap();
        // keep tx alive so only the timeout can end the drain

        let report = collector.drain().await;
        assert_eq!(report.received, 1);
        assert_eq!(report.successes, 1);
        drop(tx);
    }

    #[tokio::test]
    async fn mean_latency_keeps_sub_millisecond_precision() {
        let (tx, collector) = CompletionCollector::new(4, None, Arc::new(NoopSink));
        for _ in 0..4 {
            tx.send(Completion { ok: true, latency: Duration::from_micros(250) }).await.unwrap();
        }
        drop(tx);

        let report = collector.drain().await;
        assert_eq!(report.received, 4);
        assert_eq!(report.total_latency_ms, 1);
        assert!((report.mean_latency_ms - 0.25).abs() < 1e-9, "{}", report.mean_latency_ms);
    }

    #[tokio::test]
    async fn closed_channel_ends_the_drain() {
        let (tx, collector) = CompletionCollector::new(5, None, Arc::new(NoopSink));
        tx.send(Completion { ok: false, latency: Duration::ZERO }).await.unwrap();
        drop(tx);

        let report = collector.drain().await;
        assert_eq!(report.received, 1);
        assert_eq!(report.errors, 1);
    }
}
