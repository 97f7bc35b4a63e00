//! HTTP implementation of the fleet provider interfaces.
//!
//! Talks to the collaborator API: `GET /servers` for discovery and
//! `GET /<address>` for per-instance metrics.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod percent;

pub use percent::parse_percent;

use std::time::Duration;

use async_trait::async_trait;
use fleetmon_provider::{Discovery, Error, InstanceAddress, InstanceMetrics, Metrics, Result};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

const DEFAULT_PORT: u16 = 5008;
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_METRICS_TIMEOUT: Duration = Duration::from_secs(3);

/// Configuration for [`HttpProvider`].
#[derive(Clone, Debug)]
pub struct HttpProviderConfig {
    /// Base URL of the provider endpoint, without a trailing slash.
    pub base_url: String,

    /// Timeout for one discovery request.
    pub discovery_timeout: Duration,

    /// Timeout for one metrics request. Bounds worst-case fetch latency so
    /// a cancellation request is never blocked behind a hung fetch.
    pub metrics_timeout: Duration,
}

impl HttpProviderConfig {
    /// Configuration targeting `http://localhost:<port>`.
    #[must_use]
    pub fn for_port(port: u16) -> Self {
        Self {
            base_url: format!("http://localhost:{port}"),
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            metrics_timeout: DEFAULT_METRICS_TIMEOUT,
        }
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self::for_port(DEFAULT_PORT)
    }
}

/// Wire form of one metrics response.
#[derive(Debug, Deserialize)]
struct MetricsPayload {
    cpu: String,
    memory: String,
    service: String,
}

/// HTTP client for the provider's discovery and metrics endpoints.
#[derive(Clone, Debug)]
pub struct HttpProvider {
    client: Client,
    config: HttpProviderConfig,
}

impl HttpProvider {
    /// Creates a provider targeting `http://localhost:<port>`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self::with_config(HttpProviderConfig::for_port(port))
    }

    /// Creates a provider with explicit configuration.
    #[must_use]
    pub fn with_config(config: HttpProviderConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn get_text(&self, url: String, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(&url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| Error::Network(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Network(format!("{url} returned status {status}")));
        }

        response
            .text()
            .await
            .map_err(|e| Error::Network(format!("reading body from {url} failed: {e}")))
    }
}

#[async_trait]
impl Discovery for HttpProvider {
    async fn list_instances(&self) -> Result<Vec<InstanceAddress>> {
        let url = format!("{}/servers", self.config.base_url);
        let body = self.get_text(url, self.config.discovery_timeout).await?;

        let addresses: Vec<InstanceAddress> = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("malformed server list: {e}")))?;

        debug!("discovered {} instances", addresses.len());

        Ok(addresses)
    }
}

#[async_trait]
impl Metrics for HttpProvider {
    async fn fetch_metrics(&self, address: &InstanceAddress) -> Result<InstanceMetrics> {
        let url = format!("{}/{address}", self.config.base_url);
        let body = self.get_text(url, self.config.metrics_timeout).await?;

        let payload: MetricsPayload = serde_json::from_str(&body)
            .map_err(|e| Error::Parse(format!("malformed metrics for {address}: {e}")))?;

        Ok(InstanceMetrics {
            service: payload.service,
            cpu_percent: parse_percent(&payload.cpu)?,
            memory_percent: parse_percent(&payload.memory)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_targets_localhost_port() {
        let config = HttpProviderConfig::for_port(5008);
        assert_eq!(config.base_url, "http://localhost:5008");
    }

    #[test]
    fn deserialize_sample_metrics_payload() {
        let payload: MetricsPayload =
            serde_json::from_str(r#"{"cpu": "61%", "memory": "4%", "service": "AuthService"}"#)
                .unwrap();

        assert_eq!(payload.cpu, "61%");
        assert_eq!(payload.memory, "4%");
        assert_eq!(payload.service, "AuthService");
    }

    #[test]
    fn missing_field_is_a_parse_error() {
        let result: std::result::Result<MetricsPayload, _> =
            serde_json::from_str(r#"{"cpu": "61%", "service": "AuthService"}"#);

        assert!(result.is_err());
    }
}
