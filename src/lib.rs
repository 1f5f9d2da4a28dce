#![doc = include_str!("../README.md")]

/// Ledger client contracts and the in-process simulated ledger.
pub mod client;

/// Benchmark orchestration: topology, dispatch, collection, verification.
pub mod bench;

pub use bench::config::{Cli, Commands, RingArgs, UniformArgs};
pub use bench::limiter::RateLimiter;
pub use bench::progress::{BarSink, NoopSink, ProgressSink};
pub use client::{ClientError, Ledger, LedgerEntity, Receipt, SimConfig, SimLedger};
