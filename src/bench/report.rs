//! Run report assembly and output.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::bench::collector::CollectorReport;
use crate::bench::verify::Verification;

/// Echo of the parameters a run was started with.
#[derive(Debug, Clone, Serialize)]
pub struct RunConfig {
    /// Benchmark variant, `ring` or `uniform`.
    pub benchmark: String,
    /// Ledger group/network label.
    pub group: String,
    /// Number of deployed entities.
    pub entities: usize,
    /// Operations dispatched.
    pub count: u64,
    /// Configured submission ceiling, operations/second.
    pub qps: u32,
    /// Revert-allowed flag (ring only).
    pub allow_revert: bool,
    /// Deterministic seed, when set.
    pub seed: Option<u64>,
}

/// Full result of one benchmark run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// The parameters the run was started with.
    pub config: RunConfig,
    /// Aggregated completion counts.
    pub completions: CollectorReport,
    /// Dispatch-start to last-receipt wall clock, seconds.
    pub elapsed_secs: f64,
    /// Receipts observed per second of elapsed time.
    pub tps: f64,
    /// Outcome of the balance conservation check.
    pub verification: Verification,
}

/// Prints the report to stdout.
pub fn print_report(report: &RunReport) {
    let c = &report.completions;
    println!("===== {} benchmark finished =====", report.config.benchmark);
    println!("group:         {}", report.config.group);
    println!("entities:      {}", report.config.entities);
    println!("submitted:     {} (target {})", c.received, c.expected);
    println!("successes:     {}", c.successes);
    println!("errors:        {}", c.errors);
    println!("mean latency:  {:.2} ms", c.mean_latency_ms);
    println!("elapsed:       {:.3} s", report.elapsed_secs);
    println!("TPS:           {:.2}", report.tps);
    let v = &report.verification;
    if v.passed {
        println!("balance check: passed (total {})", v.actual);
    } else {
        println!(
            "balance check: FAILED (total {}, expected {}, unread {})",
            v.actual,
            v.expected,
            v.unread.len()
        );
    }
}

/// Writes the report as pretty JSON.
pub fn save_report(report: &RunReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    #[test]
    fn report_serializes_with_all_sections() {
        let report = RunReport {
            config: RunConfig {
                benchmark: "ring".into(),
                group: "1".into(),
                entities: 3,
                count: 4,
                qps: 100,
                allow_revert: false,
                seed: Some(42),
            },
            completions: CollectorReport {
                expected: 4,
                received: 4,
                successes: 4,
                errors: 0,
                total_latency_ms: 40,
                mean_latency_ms: 10.0,
            },
            elapsed_secs: 0.5,
            tps: 8.0,
            verification: Verification {
                expected: U256::from(12u64),
                actual: U256::from(12u64),
                unread: vec![],
                passed: true,
            },
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["config"]["benchmark"], "ring");
        assert_eq!(json["completions"]["successes"], 4);
        assert_eq!(json["verification"]["passed"], true);
    }
}
