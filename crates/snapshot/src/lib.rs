//! Point-in-time fleet snapshots: instance records, health classification
//! and the bounded-concurrency snapshot builder.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod builder;
mod error;

pub use builder::{SnapshotBuilder, SnapshotConfig};
pub use error::{Error, Result};

use fleetmon_provider::{InstanceAddress, InstanceMetrics};
use serde::Serialize;

/// Service name recorded for unreachable instances with no known service.
pub const UNKNOWN_SERVICE: &str = "unknown";

/// CPU and memory thresholds an instance must stay strictly below to count
/// as healthy. Injected explicitly wherever health is classified.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HealthThresholds {
    /// CPU usage threshold percentage.
    pub cpu_percent: u8,

    /// Memory usage threshold percentage.
    pub memory_percent: u8,
}

impl HealthThresholds {
    /// Same threshold for both CPU and memory.
    #[must_use]
    pub const fn uniform(percent: u8) -> Self {
        Self {
            cpu_percent: percent,
            memory_percent: percent,
        }
    }

    /// Whether usage at these levels counts as healthy. Usage equal to a
    /// threshold is unhealthy.
    #[must_use]
    pub const fn classify(&self, cpu_percent: u8, memory_percent: u8) -> bool {
        cpu_percent < self.cpu_percent && memory_percent < self.memory_percent
    }
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self::uniform(90)
    }
}

/// One instance's state as observed at snapshot time. Built fresh per fetch
/// and never persisted beyond the snapshot that created it.
#[derive(Clone, Debug, Serialize)]
pub struct InstanceRecord {
    /// Address the instance was queried at.
    pub address: InstanceAddress,

    /// Service the instance belongs to; [`UNKNOWN_SERVICE`] when the
    /// instance was unreachable and no earlier name is known.
    pub service: String,

    /// CPU usage percentage; `None` when unreachable.
    pub cpu_percent: Option<u8>,

    /// Memory usage percentage; `None` when unreachable.
    pub memory_percent: Option<u8>,

    /// Whether the metrics fetch succeeded.
    pub reachable: bool,

    /// Whether the instance is reachable and strictly below both
    /// thresholds. Unreachable instances are always unhealthy.
    pub healthy: bool,
}

impl InstanceRecord {
    /// Record for a successful metrics fetch.
    #[must_use]
    pub fn from_metrics(
        address: InstanceAddress,
        metrics: &InstanceMetrics,
        thresholds: &HealthThresholds,
    ) -> Self {
        Self {
            address,
            service: metrics.service.clone(),
            cpu_percent: Some(metrics.cpu_percent),
            memory_percent: Some(metrics.memory_percent),
            reachable: true,
            healthy: thresholds.classify(metrics.cpu_percent, metrics.memory_percent),
        }
    }

    /// Record for a failed metrics fetch. `last_known_service` carries the
    /// name the address was last seen under, if any.
    #[must_use]
    pub fn unreachable(address: InstanceAddress, last_known_service: Option<&str>) -> Self {
        Self {
            address,
            service: last_known_service.unwrap_or(UNKNOWN_SERVICE).to_owned(),
            cpu_percent: None,
            memory_percent: None,
            reachable: false,
            healthy: false,
        }
    }
}

/// Ordered sequence of instance records captured at one logical timestamp.
/// Record order matches discovery order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Snapshot {
    /// Records in discovery order.
    pub records: Vec<InstanceRecord>,
}

impl Snapshot {
    /// Number of records in the snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
