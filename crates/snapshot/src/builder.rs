//! Concurrent snapshot building with a bounded worker cap.

use std::collections::HashMap;
use std::sync::Arc;

use fleetmon_provider::{InstanceAddress, Metrics};
use futures::future;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{Error, HealthThresholds, InstanceRecord, Result, Snapshot};

const DEFAULT_CONCURRENCY: usize = 8;

/// Configuration for [`SnapshotBuilder`].
#[derive(Clone, Copy, Debug)]
pub struct SnapshotConfig {
    /// Thresholds used to classify each record's health.
    pub thresholds: HealthThresholds,

    /// Maximum number of metric fetches in flight at once.
    pub concurrency: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            thresholds: HealthThresholds::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

/// Builds snapshots by fetching metrics for every address concurrently.
///
/// A single address's failure never aborts a build; it degrades to an
/// unreachable record. The build completes only once every per-address
/// attempt has resolved, and the output order always matches the input
/// address order regardless of completion order.
pub struct SnapshotBuilder<M> {
    metrics: Arc<M>,
    config: SnapshotConfig,
    cancel: CancellationToken,
}

impl<M> SnapshotBuilder<M>
where
    M: Metrics,
{
    /// Creates a builder over the given metrics source.
    pub fn new(metrics: Arc<M>, config: SnapshotConfig, cancel: CancellationToken) -> Self {
        Self {
            metrics,
            config,
            cancel,
        }
    }

    /// Builds a snapshot for `addresses`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the cancellation token fires before
    /// every fetch resolved. No partial snapshot is ever returned.
    pub async fn build(&self, addresses: &[InstanceAddress]) -> Result<Snapshot> {
        self.build_with_known_services(addresses, &HashMap::new())
            .await
    }

    /// Builds a snapshot, labelling failed fetches with the service name
    /// each address was last seen under, where one is known.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cancelled`] when the cancellation token fires before
    /// every fetch resolved.
    pub async fn build_with_known_services(
        &self,
        addresses: &[InstanceAddress],
        known_services: &HashMap<InstanceAddress, String>,
    ) -> Result<Snapshot> {
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));

        let fetches: Vec<_> = addresses
            .iter()
            .cloned()
            .map(|address| {
                let metrics = Arc::clone(&self.metrics);
                let semaphore = Arc::clone(&semaphore);
                let cancel = self.cancel.clone();
                let thresholds = self.config.thresholds;
                let last_known = known_services.get(&address).cloned();

                async move {
                    let Ok(_permit) = semaphore.acquire().await else {
                        return None;
                    };

                    tokio::select! {
                        () = cancel.cancelled() => None,
                        result = metrics.fetch_metrics(&address) => match result {
                            Ok(fetched) => {
                                Some(InstanceRecord::from_metrics(address, &fetched, &thresholds))
                            }
                            Err(e) => {
                                debug!("metrics fetch for {address} failed: {e}");
                                Some(InstanceRecord::unreachable(address, last_known.as_deref()))
                            }
                        },
                    }
                }
            })
            .collect();

        // join_all keeps results in input order regardless of completion order.
        let results = future::join_all(fetches).await;

        let records = results
            .into_iter()
            .collect::<Option<Vec<InstanceRecord>>>()
            .ok_or(Error::Cancelled)?;

        Ok(Snapshot { records })
    }
}
