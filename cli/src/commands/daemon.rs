use std::sync::Arc;

use netinv_common::config::DiscoveryConfig;
use netinv_core::discovery::{DiscoveryService, ScanRequest};
use netinv_core::inventory::InventoryStore;
use netinv_core::job::{DiscoveryJob, Scheduler};
use tracing::warn;

pub async fn daemon<S: InventoryStore + 'static>(
    service: Arc<DiscoveryService<S>>,
    cfg: &DiscoveryConfig,
) -> anyhow::Result<()> {
    let scheduler = Scheduler::from_config(cfg)?;
    let job = DiscoveryJob::new(service, ScanRequest::default());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("cannot listen for Ctrl-C, stopping: {e}");
        }
    };
    scheduler.run_until(shutdown, || job.run()).await;
    Ok(())
}
