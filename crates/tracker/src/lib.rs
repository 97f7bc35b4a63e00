//! Continuous tracking of one service's resource usage.
//!
//! The tracker re-resolves the fleet on every tick, snapshots the tracked
//! service's instances, and emits per-tick reports until cancelled.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use fleetmon_provider::{Discovery, InstanceAddress, Metrics};
use fleetmon_snapshot::{HealthThresholds, InstanceRecord, SnapshotBuilder, SnapshotConfig};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const DEFAULT_INTERVAL: Duration = Duration::from_secs(5);
const DEFAULT_CONCURRENCY: usize = 8;

/// Lifecycle state of a tracker.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TrackerState {
    /// Created but not yet running.
    Idle,

    /// Ticking.
    Running,

    /// Terminal; entered via cancellation or a fatal discovery error at
    /// startup.
    Stopped,
}

/// Configuration for one tracker run.
#[derive(Clone, Debug)]
pub struct TrackerConfig {
    /// Service to track (exact, case-sensitive name).
    pub service: String,

    /// Pause between the end of one tick and the start of the next.
    pub interval: Duration,

    /// Thresholds used to classify record health.
    pub thresholds: HealthThresholds,

    /// Maximum number of metric fetches in flight at once.
    pub concurrency: usize,
}

impl TrackerConfig {
    /// Configuration for `service` with default interval, thresholds and
    /// concurrency.
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            interval: DEFAULT_INTERVAL,
            thresholds: HealthThresholds::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// One tick's results for the tracked service.
#[derive(Clone, Debug, Serialize)]
pub struct TickReport {
    /// When the tick's snapshot completed.
    pub timestamp: DateTime<Utc>,

    /// The tracked service.
    pub service: String,

    /// Records for the tracked service's instances, in discovery order.
    /// Empty when the service is absent from the current fleet.
    pub records: Vec<InstanceRecord>,
}

/// Tracks one service until cancelled.
///
/// Each tick performs a fresh discovery (service membership may change
/// between ticks), snapshots the fleet with bounded concurrency, restricts
/// the result to the tracked service and emits a [`TickReport`]. Per-tick
/// failures degrade records or skip the tick; they never abort the loop.
pub struct Tracker<P> {
    provider: Arc<P>,
    config: TrackerConfig,
    cancel: CancellationToken,
    state_tx: watch::Sender<TrackerState>,
}

impl<P> Tracker<P>
where
    P: Discovery + Metrics,
{
    /// Creates an idle tracker.
    pub fn new(provider: Arc<P>, config: TrackerConfig, cancel: CancellationToken) -> Self {
        let (state_tx, _) = watch::channel(TrackerState::Idle);
        Self {
            provider,
            config,
            cancel,
            state_tx,
        }
    }

    /// Subscribes to the tracker's lifecycle state.
    #[must_use]
    pub fn subscribe_state(&self) -> watch::Receiver<TrackerState> {
        self.state_tx.subscribe()
    }

    /// Runs the tracking loop, emitting one [`TickReport`] per tick on
    /// `reports`, until the cancellation token fires or the report receiver
    /// is dropped. Ticks are sequential: tick N is fully emitted before
    /// tick N+1's work begins.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Discovery`] when discovery fails on the first tick.
    /// Later discovery failures are logged and retried on the next tick.
    /// Cancellation is a clean stop, not an error.
    pub async fn run(self, reports: mpsc::Sender<TickReport>) -> Result<()> {
        self.state_tx.send_replace(TrackerState::Running);

        let snapshot_config = SnapshotConfig {
            thresholds: self.config.thresholds,
            concurrency: self.config.concurrency,
        };
        let builder = SnapshotBuilder::new(
            Arc::clone(&self.provider),
            snapshot_config,
            self.cancel.clone(),
        );

        // Addresses last seen belonging to the tracked service, so an
        // instance that drops offline is still reported under its name.
        let mut known_services: HashMap<InstanceAddress, String> = HashMap::new();
        let mut first_tick = true;

        loop {
            let addresses = tokio::select! {
                () = self.cancel.cancelled() => break,
                result = self.provider.list_instances() => match result {
                    Ok(addresses) => addresses,
                    Err(e) if first_tick => {
                        error!("discovery failed at startup: {e}");
                        self.state_tx.send_replace(TrackerState::Stopped);
                        return Err(Error::Discovery(e));
                    }
                    Err(e) => {
                        warn!("discovery failed, retrying next tick: {e}");
                        if self.sleep_or_cancelled().await {
                            break;
                        }
                        continue;
                    }
                },
            };
            first_tick = false;

            let snapshot = match builder
                .build_with_known_services(&addresses, &known_services)
                .await
            {
                Ok(snapshot) => snapshot,
                Err(fleetmon_snapshot::Error::Cancelled) => break,
            };

            let records: Vec<InstanceRecord> = snapshot
                .records
                .into_iter()
                .filter(|record| record.service == self.config.service)
                .collect();

            known_services = records
                .iter()
                .map(|record| (record.address.clone(), record.service.clone()))
                .collect();

            if records.is_empty() {
                debug!("service {:?} absent from current fleet", self.config.service);
            }

            let report = TickReport {
                timestamp: Utc::now(),
                service: self.config.service.clone(),
                records,
            };

            tokio::select! {
                () = self.cancel.cancelled() => break,
                sent = reports.send(report) => {
                    if sent.is_err() {
                        debug!("report receiver dropped; stopping tracker");
                        break;
                    }
                }
            }

            if self.sleep_or_cancelled().await {
                break;
            }
        }

        self.state_tx.send_replace(TrackerState::Stopped);
        Ok(())
    }

    /// Sleeps for the configured interval; true when cancelled mid-sleep.
    async fn sleep_or_cancelled(&self) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => true,
            () = tokio::time::sleep(self.config.interval) => false,
        }
    }
}
