//! CLI argument parsing for the benchmark commands.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::bench::run::{RingOptions, UniformOptions};
use crate::client::SimConfig;

/// Benchmark harness for a ledger executing transfer-ring state transitions.
#[derive(Parser)]
#[command(name = "transfer-bench", version, about, long_about = None)]
pub struct Cli {
    /// Log level used when RUST_LOG is not set.
    #[arg(long, env = "TRANSFER_BENCH_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available benchmark variants.
#[derive(Subcommand)]
pub enum Commands {
    /// Transfer-ring benchmark: N entities in a closed loop, operations
    /// alternate between the two entry points.
    Ring(RingArgs),
    /// Uniform benchmark: independent entities, operations round-robin.
    Uniform(UniformArgs),
}

/// Arguments for the ring benchmark.
#[derive(Parser, Debug)]
pub struct RingArgs {
    /// Ledger group/network identifier.
    #[arg(long, env = "TRANSFER_BENCH_GROUP", default_value = "1")]
    pub group: String,

    /// Ring size (minimum 3).
    #[arg(long, default_value = "10")]
    pub nodes: usize,

    /// Number of operations to dispatch.
    #[arg(long, default_value = "1000")]
    pub count: u64,

    /// Target submission rate, operations per second.
    #[arg(long, default_value = "100")]
    pub qps: u32,

    /// Forward the revert-allowed flag on every operation.
    #[arg(long)]
    pub allow_revert: bool,

    /// Timeout for each setup barrier, seconds.
    #[arg(long, default_value = "60")]
    pub setup_timeout: u64,

    /// Timeout for the receipt drain, seconds; omit to wait indefinitely.
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Simulated ledger: base completion latency, milliseconds.
    #[arg(long, default_value = "2")]
    pub sim_latency_ms: u64,

    /// Simulated ledger: latency jitter, milliseconds.
    #[arg(long, default_value = "3")]
    pub sim_jitter_ms: u64,

    /// Simulated ledger: fail every k-th operation.
    #[arg(long)]
    pub sim_fail_every: Option<u64>,

    /// Seed for deterministic runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for the uniform benchmark.
#[derive(Parser, Debug)]
pub struct UniformArgs {
    /// Ledger group/network identifier.
    #[arg(long, env = "TRANSFER_BENCH_GROUP", default_value = "1")]
    pub group: String,

    /// Number of independent entities.
    #[arg(long, default_value = "10")]
    pub users: usize,

    /// Number of operations to dispatch.
    #[arg(long, default_value = "1000")]
    pub count: u64,

    /// Target submission rate, operations per second.
    #[arg(long, default_value = "100")]
    pub qps: u32,

    /// Timeout for the setup barrier, seconds.
    #[arg(long, default_value = "60")]
    pub setup_timeout: u64,

    /// Timeout for the receipt drain, seconds; omit to wait indefinitely.
    #[arg(long)]
    pub run_timeout: Option<u64>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Simulated ledger: base completion latency, milliseconds.
    #[arg(long, default_value = "2")]
    pub sim_latency_ms: u64,

    /// Simulated ledger: latency jitter, milliseconds.
    #[arg(long, default_value = "3")]
    pub sim_jitter_ms: u64,

    /// Simulated ledger: fail every k-th operation.
    #[arg(long)]
    pub sim_fail_every: Option<u64>,

    /// Seed for deterministic runs.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl RingArgs {
    /// Run options derived from these arguments.
    pub fn options(&self) -> RingOptions {
        RingOptions {
            group: self.group.clone(),
            nodes: self.nodes,
            count: self.count,
            qps: self.qps,
            allow_revert: self.allow_revert,
            setup_timeout: Duration::from_secs(self.setup_timeout),
            run_timeout: self.run_timeout.map(Duration::from_secs),
            seed: self.seed,
        }
    }

    /// Simulated-ledger knobs derived from these arguments.
    pub fn sim_config(&self) -> SimConfig {
        sim_config(self.sim_latency_ms, self.sim_jitter_ms, self.sim_fail_every, self.seed)
    }
}

impl UniformArgs {
    /// Run options derived from these arguments.
    pub fn options(&self) -> UniformOptions {
        UniformOptions {
            group: self.group.clone(),
            users: self.users,
            count: self.count,
            qps: self.qps,
            setup_timeout: Duration::from_secs(self.setup_timeout),
            run_timeout: self.run_timeout.map(Duration::from_secs),
            seed: self.seed,
        }
    }

    /// Simulated-ledger knobs derived from these arguments.
    pub fn sim_config(&self) -> SimConfig {
        sim_config(self.sim_latency_ms, self.sim_jitter_ms, self.sim_fail_every, self.seed)
    }
}

fn sim_config(
    latency_ms: u64,
    jitter_ms: u64,
    fail_every: Option<u64>,
    seed: Option<u64>,
) -> SimConfig {
    let mut config = SimConfig::default().with_latency_ms(latency_ms).with_jitter_ms(jitter_ms);
    if let Some(k) = fail_every {
        config = config.with_fail_every(k);
    }
    if let Some(seed) = seed {
        config = config.with_seed(seed);
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_defaults_parse() {
        let cli = Cli::try_parse_from(["transfer-bench", "ring"]).unwrap();
        let Commands::Ring(args) = cli.command else {
            panic!("expected ring subcommand");
        };
        assert_eq!(args.nodes, 10);
        assert_eq!(args.count, 1000);
        assert_eq!(args.qps, 100);
        assert!(!args.allow_revert);
    }

    #[test]
    fn explicit_ring_arguments_parse() {
        let cli = Cli::try_parse_from([
            "transfer-bench",
            "ring",
            "--nodes",
            "3",
            "--count",
            "4",
            "--qps",
            "100",
            "--allow-revert",
            "--seed",
            "42",
        ])
        .unwrap();
        let Commands::Ring(args) = cli.command else {
            panic!("expected ring subcommand");
        };
        assert_eq!(args.nodes, 3);
        assert_eq!(args.count, 4);
        assert!(args.allow_revert);
        assert_eq!(args.seed, Some(42));
    }

    #[test]
    fn unknown_argument_is_rejected() {
        assert!(Cli::try_parse_from(["transfer-bench", "ring", "--bogus"]).is_err());
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["transfer-bench"]).is_err());
    }
}
