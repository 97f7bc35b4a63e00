//! Abstract interfaces for fleet providers: instance discovery and
//! per-instance metrics.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::{Error, Result};

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Opaque unique identifier for one instance (an IP or hostname string).
#[derive(Clone, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct InstanceAddress(String);

impl InstanceAddress {
    /// Creates an address from any string-like value.
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Returns the address as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InstanceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceAddress {
    fn from(address: &str) -> Self {
        Self(address.to_owned())
    }
}

impl From<String> for InstanceAddress {
    fn from(address: String) -> Self {
        Self(address)
    }
}

/// Parsed metrics for one instance.
///
/// Percentages are integers in `0..=100`; the wire form carries a trailing
/// `%` which implementations strip before parsing.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceMetrics {
    /// Name of the service this instance belongs to.
    pub service: String,

    /// CPU usage percentage.
    pub cpu_percent: u8,

    /// Memory usage percentage.
    pub memory_percent: u8,
}

/// Trait for listing all instance addresses known to the provider.
///
/// A single attempt, no internal retry. Callers decide whether a failed
/// discovery is fatal or retried on a later cycle.
#[async_trait]
pub trait Discovery
where
    Self: Send + Sync + 'static,
{
    /// Lists all instance addresses, in the provider's order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] when the provider is unreachable and
    /// [`Error::Parse`] when the payload is malformed.
    async fn list_instances(&self) -> Result<Vec<InstanceAddress>>;
}

/// Trait for fetching current metrics for a single instance.
#[async_trait]
pub trait Metrics
where
    Self: Send + Sync + 'static,
{
    /// Fetches metrics for the instance at `address`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] on timeout or connection failure, and
    /// [`Error::Parse`] when a required field is missing or a percentage is
    /// not a valid integer in `0..=100`.
    async fn fetch_metrics(&self, address: &InstanceAddress) -> Result<InstanceMetrics>;
}
