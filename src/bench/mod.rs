/// CLI argument parsing for the benchmark commands.
pub mod config;

/// Completion fan-in and aggregate counting.
pub mod collector;

/// Rate-limited operation emission across the ring entry points.
pub mod dispatch;

/// Operations-per-second admission control.
pub mod limiter;

/// Progress event sinks.
pub mod progress;

/// Run report assembly and output.
pub mod report;

/// Orchestration of one benchmark run.
pub mod run;

/// Entity deployment and ring wiring.
pub mod topology;

/// Post-run balance conservation check.
pub mod verify;
