use fleetmon_provider::{Discovery, Metrics};
use fleetmon_provider_mock::MockProvider;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let provider = MockProvider::new()
        .with_instance("10.58.1.121", "PermissionsService", 45, 30)
        .with_instance("10.58.1.122", "AuthService", 12, 61)
        .with_unreachable("10.58.1.123");

    for address in provider.list_instances().await? {
        match provider.fetch_metrics(&address).await {
            Ok(metrics) => println!(
                "{address}: {} cpu={}% memory={}%",
                metrics.service, metrics.cpu_percent, metrics.memory_percent
            ),
            Err(e) => println!("{address}: {e}"),
        }
    }

    Ok(())
}
