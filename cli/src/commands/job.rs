use std::sync::Arc;

use netinv_core::discovery::{DiscoveryService, ScanRequest};
use netinv_core::inventory::InventoryStore;
use netinv_core::job::{DiscoveryJob, JobRunner};

pub async fn job<S: InventoryStore + 'static>(
    service: Arc<DiscoveryService<S>>,
    request: ScanRequest,
    attempts: u32,
) -> anyhow::Result<()> {
    let job = DiscoveryJob::new(service, request);
    JobRunner::new(attempts, JobRunner::DEFAULT_BACKOFF)
        .run(|| job.run())
        .await?;
    Ok(())
}
