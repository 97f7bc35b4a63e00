//! Plain-text table rendering for stdout.

use std::collections::BTreeMap;

use fleetmon_snapshot::{InstanceRecord, Snapshot};
use fleetmon_stats::{MIN_HEALTHY_INSTANCES, ServiceAggregate};
use fleetmon_tracker::TickReport;

fn status_cell(record: &InstanceRecord) -> &'static str {
    if !record.reachable {
        "Unreachable"
    } else if record.healthy {
        "Healthy"
    } else {
        "Unhealthy"
    }
}

fn percent_cell(value: Option<u8>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v}%"))
}

fn average_cell(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_owned(), |v| format!("{v:.1}%"))
}

fn instance_row(record: &InstanceRecord) {
    println!(
        "{:<18} {:<24} {:<12} {:>6} {:>8}",
        record.address,
        record.service,
        status_cell(record),
        percent_cell(record.cpu_percent),
        percent_cell(record.memory_percent),
    );
}

/// Prints every instance record in discovery order.
pub fn print_instances(snapshot: &Snapshot) {
    println!(
        "{:<18} {:<24} {:<12} {:>6} {:>8}",
        "ADDRESS", "SERVICE", "STATUS", "CPU", "MEMORY"
    );
    for record in &snapshot.records {
        instance_row(record);
    }
}

/// Prints per-service instance counts and averages.
pub fn print_averages(aggregates: &BTreeMap<String, ServiceAggregate>) {
    println!(
        "{:<24} {:>9} {:>8} {:>9} {:>11}",
        "SERVICE", "INSTANCES", "HEALTHY", "AVG CPU", "AVG MEMORY"
    );
    for aggregate in aggregates.values() {
        println!(
            "{:<24} {:>9} {:>8} {:>9} {:>11}",
            aggregate.service,
            aggregate.instance_count,
            aggregate.healthy_count,
            average_cell(aggregate.avg_cpu),
            average_cell(aggregate.avg_memory),
        );
    }
}

/// Prints under-provisioned services with their instance detail rows.
pub fn print_flagged(
    flagged: &[String],
    aggregates: &BTreeMap<String, ServiceAggregate>,
    snapshot: &Snapshot,
) {
    if flagged.is_empty() {
        println!("All services have at least {MIN_HEALTHY_INSTANCES} healthy instances.");
        return;
    }

    println!("Services with fewer than {MIN_HEALTHY_INSTANCES} healthy instances:");
    for service in flagged {
        if let Some(aggregate) = aggregates.get(service) {
            println!(
                "\n{} ({} healthy of {} instances)",
                aggregate.service, aggregate.healthy_count, aggregate.instance_count
            );
        }
        for record in snapshot.records.iter().filter(|r| &r.service == service) {
            instance_row(record);
        }
    }
}

/// Prints one tracking tick.
pub fn print_tick(report: &TickReport) {
    let timestamp = report.timestamp.format("%Y-%m-%d %H:%M:%S");

    if report.records.is_empty() {
        println!("{timestamp}  no instances found for {}", report.service);
        return;
    }

    for record in &report.records {
        println!(
            "{timestamp}  {:<18} {:<12} {:>6} {:>8}",
            record.address,
            status_cell(record),
            percent_cell(record.cpu_percent),
            percent_cell(record.memory_percent),
        );
    }
    println!();
}
