//! fda-miner - resumable deep search of FDA 510(k) summaries.

use std::fs::OpenOptions;
use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fda_miner::cli::{self, Cli};
use fda_miner::services::StopSignal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(&cli)?;

    let stop = StopSignal::new();
    install_stop_handler(stop.clone())?;

    cli::run(cli, stop).await
}

fn init_tracing(cli: &Cli) -> anyhow::Result<()> {
    let default_filter = if cli.verbose {
        "fda_miner=info"
    } else {
        "fda_miner=warn"
    };

    let file_layer = match &cli.log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Arc::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

/// First SIGINT/SIGTERM asks the crawl to stop at the next page boundary;
/// a second one exits immediately.
fn install_stop_handler(stop: StopSignal) -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = sigint.recv() => {}
                }
                if stop.is_cancelled() {
                    std::process::exit(130);
                }
                eprintln!(
                    "{} Signal received. Will stop after this page",
                    style("!").yellow()
                );
                stop.cancel();
            }
        });
    }
    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if stop.is_cancelled() {
                    std::process::exit(130);
                }
                eprintln!(
                    "{} Signal received. Will stop after this page",
                    style("!").yellow()
                );
                stop.cancel();
            }
        });
    }
    Ok(())
}
