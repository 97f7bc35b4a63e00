//! Per-service statistics derived from a snapshot, and the
//! under-provisioning flagger.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::BTreeMap;

use fleetmon_snapshot::Snapshot;
use serde::Serialize;

/// Minimum number of healthy instances a service needs to not be flagged.
///
/// A fixed structural policy, independent of the CPU/memory health
/// thresholds.
pub const MIN_HEALTHY_INSTANCES: usize = 2;

/// Statistics for one service, fully derived from a single snapshot.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ServiceAggregate {
    /// Service name (exact, case-sensitive).
    pub service: String,

    /// Total instances observed for the service, reachable or not.
    pub instance_count: usize,

    /// Instances classified healthy.
    pub healthy_count: usize,

    /// Mean CPU usage over reachable instances; `None` when none are
    /// reachable.
    pub avg_cpu: Option<f64>,

    /// Mean memory usage over reachable instances; `None` when none are
    /// reachable.
    pub avg_memory: Option<f64>,
}

#[derive(Default)]
struct Accumulator {
    instance_count: usize,
    healthy_count: usize,
    reachable_count: usize,
    cpu_total: u64,
    memory_total: u64,
}

/// Groups a snapshot's records by exact service name and computes
/// per-service aggregates.
///
/// Averages are computed only over reachable instances; a service with zero
/// reachable instances gets explicitly undefined averages, distinguishable
/// from 0%.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn aggregate(snapshot: &Snapshot) -> BTreeMap<String, ServiceAggregate> {
    let mut accumulators: BTreeMap<String, Accumulator> = BTreeMap::new();

    for record in &snapshot.records {
        let entry = accumulators.entry(record.service.clone()).or_default();
        entry.instance_count += 1;

        if record.healthy {
            entry.healthy_count += 1;
        }

        if record.reachable {
            entry.reachable_count += 1;
            entry.cpu_total += u64::from(record.cpu_percent.unwrap_or_default());
            entry.memory_total += u64::from(record.memory_percent.unwrap_or_default());
        }
    }

    accumulators
        .into_iter()
        .map(|(service, acc)| {
            let mean = |total: u64| (acc.reachable_count > 0)
                .then(|| total as f64 / acc.reachable_count as f64);

            let aggregate = ServiceAggregate {
                service: service.clone(),
                instance_count: acc.instance_count,
                healthy_count: acc.healthy_count,
                avg_cpu: mean(acc.cpu_total),
                avg_memory: mean(acc.memory_total),
            };

            (service, aggregate)
        })
        .collect()
}

/// Names of services with fewer than [`MIN_HEALTHY_INSTANCES`] healthy
/// instances, in aggregate order.
#[must_use]
pub fn flag_underprovisioned(aggregates: &BTreeMap<String, ServiceAggregate>) -> Vec<String> {
    aggregates
        .values()
        .filter(|a| a.healthy_count < MIN_HEALTHY_INSTANCES)
        .map(|a| a.service.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use fleetmon_provider::{InstanceAddress, InstanceMetrics};
    use fleetmon_snapshot::{HealthThresholds, InstanceRecord};

    use super::*;

    fn reachable(address: &str, service: &str, cpu: u8, memory: u8) -> InstanceRecord {
        let metrics = InstanceMetrics {
            service: service.to_owned(),
            cpu_percent: cpu,
            memory_percent: memory,
        };
        InstanceRecord::from_metrics(
            InstanceAddress::from(address),
            &metrics,
            &HealthThresholds::default(),
        )
    }

    fn unreachable(address: &str, service: &str) -> InstanceRecord {
        InstanceRecord::unreachable(InstanceAddress::from(address), Some(service))
    }

    #[test]
    fn overloaded_and_unreachable_instances_leave_a_service_flagged() {
        // One instance over the CPU threshold, one unreachable.
        let snapshot = Snapshot {
            records: vec![
                reachable("10.0.0.1", "X", 95, 10),
                unreachable("10.0.0.2", "X"),
            ],
        };

        let aggregates = aggregate(&snapshot);
        let x = &aggregates["X"];

        assert_eq!(x.instance_count, 2);
        assert_eq!(x.healthy_count, 0);
        assert_eq!(flag_underprovisioned(&aggregates), ["X"]);
    }

    #[test]
    fn averages_cover_reachable_instances_only() {
        let snapshot = Snapshot {
            records: vec![
                reachable("10.58.1.1", "AuthService", 10, 10),
                reachable("10.58.1.2", "AuthService", 14, 20),
                unreachable("10.58.1.3", "AuthService"),
            ],
        };

        let aggregates = aggregate(&snapshot);
        let auth = &aggregates["AuthService"];

        assert_eq!(auth.instance_count, 3);
        assert_eq!(auth.healthy_count, 2);
        assert_eq!(auth.avg_cpu, Some(12.0));
        assert_eq!(auth.avg_memory, Some(15.0));
        assert!(flag_underprovisioned(&aggregates).is_empty());
    }

    #[test]
    fn zero_reachable_instances_leave_averages_undefined() {
        let snapshot = Snapshot {
            records: vec![
                unreachable("10.0.0.1", "X"),
                unreachable("10.0.0.2", "X"),
            ],
        };

        let x = &aggregate(&snapshot)["X"];

        assert_eq!(x.avg_cpu, None);
        assert_eq!(x.avg_memory, None);
        assert_eq!(x.healthy_count, 0);
    }

    #[test]
    fn healthy_count_never_exceeds_instance_count() {
        let snapshot = Snapshot {
            records: vec![
                reachable("10.0.0.1", "X", 10, 10),
                reachable("10.0.0.2", "X", 20, 20),
                unreachable("10.0.0.3", "X"),
            ],
        };

        let x = &aggregate(&snapshot)["X"];
        assert!(x.healthy_count <= x.instance_count);
    }

    #[test]
    fn grouping_is_case_sensitive() {
        let snapshot = Snapshot {
            records: vec![
                reachable("10.0.0.1", "auth", 10, 10),
                reachable("10.0.0.2", "Auth", 20, 20),
            ],
        };

        let aggregates = aggregate(&snapshot);

        assert_eq!(aggregates.len(), 2);
        assert_eq!(aggregates["auth"].instance_count, 1);
        assert_eq!(aggregates["Auth"].instance_count, 1);
    }

    #[test]
    fn flagging_boundary_sits_at_two_healthy_instances() {
        let snapshot = Snapshot {
            records: vec![
                reachable("10.0.0.1", "Zero", 95, 95),
                reachable("10.0.0.2", "One", 10, 10),
                reachable("10.0.0.3", "One", 95, 95),
                reachable("10.0.0.4", "Two", 10, 10),
                reachable("10.0.0.5", "Two", 20, 20),
            ],
        };

        let aggregates = aggregate(&snapshot);
        let flagged = flag_underprovisioned(&aggregates);

        assert!(flagged.contains(&"Zero".to_owned()));
        assert!(flagged.contains(&"One".to_owned()));
        assert!(!flagged.contains(&"Two".to_owned()));
    }
}
