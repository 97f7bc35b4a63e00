//! Webhook alerting for under-provisioned services.

use std::collections::BTreeMap;
use std::time::Duration;

use fleetmon_stats::ServiceAggregate;
use reqwest::Client;
use serde_json::json;
use tracing::info;

const ALERT_TIMEOUT: Duration = Duration::from_secs(5);

/// Posts a JSON alert about flagged services to `webhook_url`.
pub async fn post_flagged(
    webhook_url: &str,
    flagged: &[String],
    aggregates: &BTreeMap<String, ServiceAggregate>,
) -> Result<(), reqwest::Error> {
    let services: Vec<&ServiceAggregate> = flagged
        .iter()
        .filter_map(|service| aggregates.get(service))
        .collect();

    let body = json!({
        "text": format!(
            "{} service(s) have fewer than 2 healthy instances",
            services.len()
        ),
        "services": services,
    });

    Client::new()
        .post(webhook_url)
        .timeout(ALERT_TIMEOUT)
        .json(&body)
        .send()
        .await?
        .error_for_status()?;

    info!("posted alert for {} under-provisioned services", services.len());

    Ok(())
}
