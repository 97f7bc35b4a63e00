//! CLI binary for fleet status, per-service statistics and continuous
//! service tracking.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::redundant_pub_crate)]

mod alert;
mod output;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fleetmon_provider::Discovery;
use fleetmon_provider_http::HttpProvider;
use fleetmon_snapshot::{HealthThresholds, Snapshot, SnapshotBuilder, SnapshotConfig};
use fleetmon_stats::{aggregate, flag_underprovisioned};
use fleetmon_tracker::{Tracker, TrackerConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// CLI-specific error type
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Provider error (discovery or metrics)
    #[error("provider error: {0}")]
    Provider(#[from] fleetmon_provider::Error),

    /// Snapshot build error
    #[error("snapshot error: {0}")]
    Snapshot(#[from] fleetmon_snapshot::Error),

    /// Tracker error
    #[error(transparent)]
    Tracker(#[from] fleetmon_tracker::Error),

    /// Tracker task failed to run to completion
    #[error("tracker task failed: {0}")]
    TrackerTask(String),
}

#[derive(Clone, Debug, Parser)]
#[command(name = "fleetmon", version, about = "Fleet status and per-service resource monitoring", long_about = None)]
struct Args {
    /// Port of the provider endpoint on localhost
    #[arg(long, global = true, default_value_t = 5008, env = "FLEETMON_PORT")]
    port: u16,

    /// Health threshold percentage applied to both CPU and memory
    #[arg(long, global = true, default_value_t = 90, env = "FLEETMON_THRESHOLD")]
    threshold: u8,

    /// Maximum number of concurrent metric fetches
    #[arg(long, global = true, default_value_t = 8, env = "FLEETMON_CONCURRENCY")]
    concurrency: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Debug, Subcommand)]
enum Command {
    /// List every discovered instance with its current status
    List,

    /// Show per-service instance counts and average CPU/memory usage
    Averages,

    /// Flag services with fewer than 2 healthy instances
    Flag {
        /// Webhook endpoint for posting alerts about flagged services
        #[arg(long, env = "FLEETMON_WEBHOOK_URL")]
        webhook_url: Option<String>,
    },

    /// Continuously track one service until interrupted
    Track {
        /// Service name to track
        #[arg(long)]
        service: String,

        /// Seconds between ticks
        #[arg(long, default_value_t = 5)]
        interval: u64,
    },
}

impl Args {
    const fn thresholds(&self) -> HealthThresholds {
        HealthThresholds::uniform(self.threshold)
    }
}

async fn snapshot_fleet(
    provider: &Arc<HttpProvider>,
    args: &Args,
    cancel: &CancellationToken,
) -> Result<Snapshot, Error> {
    let addresses = provider.list_instances().await?;

    let config = SnapshotConfig {
        thresholds: args.thresholds(),
        concurrency: args.concurrency,
    };
    let builder = SnapshotBuilder::new(Arc::clone(provider), config, cancel.clone());

    Ok(builder.build(&addresses).await?)
}

async fn run_tracker(
    provider: Arc<HttpProvider>,
    args: &Args,
    cancel: CancellationToken,
    service: String,
    interval: u64,
) -> Result<(), Error> {
    let config = TrackerConfig {
        service,
        interval: Duration::from_secs(interval),
        thresholds: args.thresholds(),
        concurrency: args.concurrency,
    };

    let (tx, mut rx) = mpsc::channel(16);
    let tracker = Tracker::new(provider, config, cancel);
    let handle = tokio::spawn(tracker.run(tx));

    while let Some(report) = rx.recv().await {
        output::print_tick(&report);
    }

    handle
        .await
        .map_err(|e| Error::TrackerTask(e.to_string()))??;

    info!("tracking stopped");

    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    // Shared cancellation token, cancelled once on the first signal.
    let cancel = CancellationToken::new();

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if cfg!(unix) {
            use tokio::signal::unix::{SignalKind, signal};

            let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler failed");
            let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler failed");

            tokio::select! {
                _ = sigterm.recv() => info!("Received SIGTERM"),
                _ = sigint.recv() => info!("Received SIGINT"),
            }
        } else {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received interrupt signal");
        }

        signal_cancel.cancel();
    });

    let provider = Arc::new(HttpProvider::new(args.port));

    match args.command.clone() {
        Command::List => {
            let snapshot = snapshot_fleet(&provider, &args, &cancel).await?;
            output::print_instances(&snapshot);
        }
        Command::Averages => {
            let snapshot = snapshot_fleet(&provider, &args, &cancel).await?;
            output::print_averages(&aggregate(&snapshot));
        }
        Command::Flag { webhook_url } => {
            let snapshot = snapshot_fleet(&provider, &args, &cancel).await?;
            let aggregates = aggregate(&snapshot);
            let flagged = flag_underprovisioned(&aggregates);
            output::print_flagged(&flagged, &aggregates, &snapshot);

            if let Some(url) = webhook_url {
                if flagged.is_empty() {
                    info!("no under-provisioned services to alert");
                } else if let Err(e) = alert::post_flagged(&url, &flagged, &aggregates).await {
                    warn!("failed to post alert: {e}");
                }
            }
        }
        Command::Track { service, interval } => {
            run_tracker(provider, &args, cancel, service, interval).await?;
        }
    }

    Ok(())
}
