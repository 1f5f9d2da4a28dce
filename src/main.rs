use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transfer_bench::bench::{report, run};
use transfer_bench::{BarSink, Cli, Commands, SimLedger};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        other => {
            eprintln!("Invalid log level '{other}', defaulting to 'info'");
            tracing::Level::INFO
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level.to_string())),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cancel = CancellationToken::new();
    let dispatch_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping dispatch");
            dispatch_cancel.cancel();
        }
    });

    match cli.command {
        Commands::Ring(args) => {
            let ledger = Arc::new(SimLedger::new(args.sim_config()));
            let progress = Arc::new(BarSink::new(args.count));
            let run_report =
                run::run_ring(ledger, &args.options(), progress, cancel).await?;
            report::print_report(&run_report);
            if let Some(path) = args.output.as_ref() {
                report::save_report(&run_report, path)?;
            }
        }
        Commands::Uniform(args) => {
            let ledger = Arc::new(SimLedger::new(args.sim_config()));
            let progress = Arc::new(BarSink::new(args.count));
            let run_report =
                run::run_uniform(ledger, &args.options(), progress, cancel).await?;
            report::print_report(&run_report);
            if let Some(path) = args.output.as_ref() {
                report::save_report(&run_report, path)?;
            }
        }
    }

    Ok(())
}
