//! In-memory implementation of the fleet provider interfaces for tests and
//! local development.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use fleetmon_provider::{Discovery, Error, InstanceAddress, InstanceMetrics, Metrics, Result};

#[derive(Default)]
struct Inner {
    addresses: Mutex<Vec<InstanceAddress>>,
    outcomes: Mutex<HashMap<InstanceAddress, Result<InstanceMetrics>>>,
    latencies: Mutex<HashMap<InstanceAddress, Duration>>,
    discovery_failures: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// In-memory fleet provider with scriptable per-address outcomes.
///
/// Cheap to clone; all clones share the same scripted state.
#[derive(Clone, Default)]
pub struct MockProvider {
    inner: Arc<Inner>,
}

impl MockProvider {
    /// Creates an empty provider with no instances.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a reachable instance, builder-style.
    #[must_use]
    pub fn with_instance(
        self,
        address: impl Into<InstanceAddress>,
        service: impl Into<String>,
        cpu_percent: u8,
        memory_percent: u8,
    ) -> Self {
        self.add_instance(address, service, cpu_percent, memory_percent);
        self
    }

    /// Registers an unreachable instance, builder-style.
    #[must_use]
    pub fn with_unreachable(self, address: impl Into<InstanceAddress>) -> Self {
        self.add_unreachable(address);
        self
    }

    /// Registers a reachable instance.
    pub fn add_instance(
        &self,
        address: impl Into<InstanceAddress>,
        service: impl Into<String>,
        cpu_percent: u8,
        memory_percent: u8,
    ) {
        let metrics = InstanceMetrics {
            service: service.into(),
            cpu_percent,
            memory_percent,
        };
        self.register(address.into(), Ok(metrics));
    }

    /// Registers an instance whose metric fetches fail with a network error.
    pub fn add_unreachable(&self, address: impl Into<InstanceAddress>) {
        let address = address.into();
        let error = Error::Network(format!("connection to {address} refused"));
        self.register(address, Err(error));
    }

    /// Removes an instance from discovery and from the outcome script.
    pub fn remove_instance(&self, address: &InstanceAddress) {
        self.inner
            .addresses
            .lock()
            .unwrap()
            .retain(|a| a != address);
        self.inner.outcomes.lock().unwrap().remove(address);
    }

    /// Adds artificial latency to one address's metric fetches.
    pub fn set_latency(&self, address: impl Into<InstanceAddress>, latency: Duration) {
        self.inner
            .latencies
            .lock()
            .unwrap()
            .insert(address.into(), latency);
    }

    /// Makes the next `n` discovery calls fail with a network error.
    pub fn fail_discoveries(&self, n: usize) {
        self.inner.discovery_failures.store(n, Ordering::SeqCst);
    }

    /// Highest number of metric fetches that were ever in flight at once.
    #[must_use]
    pub fn max_in_flight(&self) -> usize {
        self.inner.max_in_flight.load(Ordering::SeqCst)
    }

    fn register(&self, address: InstanceAddress, outcome: Result<InstanceMetrics>) {
        let mut addresses = self.inner.addresses.lock().unwrap();
        if !addresses.contains(&address) {
            addresses.push(address.clone());
        }
        drop(addresses);

        self.inner.outcomes.lock().unwrap().insert(address, outcome);
    }
}

#[async_trait]
impl Discovery for MockProvider {
    async fn list_instances(&self) -> Result<Vec<InstanceAddress>> {
        let remaining = &self.inner.discovery_failures;
        if remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::Network("discovery endpoint unreachable".into()));
        }

        Ok(self.inner.addresses.lock().unwrap().clone())
    }
}

#[async_trait]
impl Metrics for MockProvider {
    async fn fetch_metrics(&self, address: &InstanceAddress) -> Result<InstanceMetrics> {
        let in_flight = self.inner.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner
            .max_in_flight
            .fetch_max(in_flight, Ordering::SeqCst);

        let latency = self.inner.latencies.lock().unwrap().get(address).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let outcome = self
            .inner
            .outcomes
            .lock()
            .unwrap()
            .get(address)
            .cloned()
            .unwrap_or_else(|| Err(Error::Network(format!("unknown address {address}"))));

        self.inner.in_flight.fetch_sub(1, Ordering::SeqCst);

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_instances_are_discovered_in_insertion_order() {
        let provider = MockProvider::new()
            .with_instance("10.58.1.1", "AuthService", 10, 20)
            .with_unreachable("10.58.1.2")
            .with_instance("10.58.1.3", "UserService", 30, 40);

        let addresses = provider.list_instances().await.unwrap();
        let rendered: Vec<_> = addresses.iter().map(InstanceAddress::as_str).collect();

        assert_eq!(rendered, ["10.58.1.1", "10.58.1.2", "10.58.1.3"]);
    }

    #[tokio::test]
    async fn fetches_follow_the_script() {
        let provider = MockProvider::new()
            .with_instance("10.58.1.1", "AuthService", 10, 20)
            .with_unreachable("10.58.1.2");

        let metrics = provider
            .fetch_metrics(&InstanceAddress::from("10.58.1.1"))
            .await
            .unwrap();
        assert_eq!(metrics.service, "AuthService");
        assert_eq!(metrics.cpu_percent, 10);

        let error = provider
            .fetch_metrics(&InstanceAddress::from("10.58.1.2"))
            .await
            .unwrap_err();
        assert!(error.is_network());

        let error = provider
            .fetch_metrics(&InstanceAddress::from("10.99.9.9"))
            .await
            .unwrap_err();
        assert!(error.is_network());
    }

    #[tokio::test]
    async fn discovery_failures_burn_down() {
        let provider = MockProvider::new().with_instance("10.58.1.1", "AuthService", 10, 20);
        provider.fail_discoveries(2);

        assert!(provider.list_instances().await.is_err());
        assert!(provider.list_instances().await.is_err());
        assert_eq!(provider.list_instances().await.unwrap().len(), 1);
    }
}
