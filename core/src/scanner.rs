//! The **discovery orchestrator**.
//!
//! Expands a subnet into candidate addresses and fans probes out over a
//! bounded pool. Dispatches are paced so a scan never floods the segment,
//! failing probes are retried in their own task so they never hold up the
//! rest of the batch, and only hosts that answered are returned.
//!
//! Result order follows probe completion, not address order.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;

use netinv_common::config::DiscoveryConfig;
use netinv_common::error::DiscoveryError;
use netinv_common::network::host::HostFact;
use netinv_common::network::subnet::SubnetEnumerator;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, info, warn};

use crate::probe::{ProbeError, Prober};
use crate::vendors::VendorRepository;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanSettings {
    pub max_concurrent: usize,
    pub dispatch_delay: Duration,
    /// Extra attempts after a probe fails unexpectedly.
    pub retry_attempts: u32,
}

impl ScanSettings {
    pub fn from_config(cfg: &DiscoveryConfig) -> Self {
        Self {
            max_concurrent: cfg.max_concurrent_scans.max(1),
            dispatch_delay: cfg.scan_delay(),
            retry_attempts: cfg.retry_attempts,
        }
    }
}

/// Receives progress while a scan runs. Every method defaults to a no-op.
pub trait ScanObserver: Send + Sync {
    fn scan_started(&self, _subnet: &str, _addresses: usize) {}
    fn probe_finished(&self, _address: Ipv4Addr, _fact: Option<&HostFact>) {}
    fn probe_dropped(&self, _address: Ipv4Addr, _error: &ProbeError) {}
}

pub struct SilentObserver;

impl ScanObserver for SilentObserver {}

pub struct DiscoveryOrchestrator {
    enumerator: SubnetEnumerator,
    prober: Arc<dyn Prober>,
    vendor_repo: Arc<dyn VendorRepository>,
    settings: ScanSettings,
}

type ProbeOutcome = (Ipv4Addr, Result<Option<HostFact>, ProbeError>);

impl DiscoveryOrchestrator {
    pub fn new(
        enumerator: SubnetEnumerator,
        prober: Arc<dyn Prober>,
        vendor_repo: Arc<dyn VendorRepository>,
        settings: ScanSettings,
    ) -> Self {
        Self {
            enumerator,
            prober,
            vendor_repo,
            settings,
        }
    }

    /// Probes every address of `subnet` and returns the hosts that answered.
    ///
    /// Fails only when the subnet itself is rejected, before any probe is sent.
    pub async fn scan(
        &self,
        subnet: &str,
        timeout: Duration,
        observer: Arc<dyn ScanObserver>,
    ) -> Result<Vec<HostFact>, DiscoveryError> {
        let addresses = self.enumerator.enumerate(subnet)?;
        info!(
            subnet,
            addresses = addresses.len(),
            max_concurrent = self.settings.max_concurrent,
            "starting scan"
        );
        observer.scan_started(subnet, addresses.len());

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent));
        let mut tasks: JoinSet<ProbeOutcome> = JoinSet::new();
        let mut in_flight: HashMap<Id, Ipv4Addr> = HashMap::new();
        let mut hosts: Vec<HostFact> = Vec::new();

        for (idx, address) in addresses.into_iter().enumerate() {
            if idx > 0 && !self.settings.dispatch_delay.is_zero() {
                tokio::time::sleep(self.settings.dispatch_delay).await;
            }

            let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                break;
            };
            let prober = Arc::clone(&self.prober);
            let retry_attempts = self.settings.retry_attempts;

            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = probe_with_retries(prober.as_ref(), address, timeout, retry_attempts).await;
                (address, result)
            });
            in_flight.insert(handle.id(), address);

            while let Some(joined) = tasks.try_join_next_with_id() {
                collect(joined, &mut in_flight, &mut hosts, observer.as_ref());
            }
        }

        while let Some(joined) = tasks.join_next_with_id().await {
            collect(joined, &mut in_flight, &mut hosts, observer.as_ref());
        }

        self.enrich_vendors(&mut hosts);
        info!(subnet, hosts = hosts.len(), "scan finished");
        Ok(hosts)
    }

    fn enrich_vendors(&self, hosts: &mut [HostFact]) {
        for host in hosts.iter_mut() {
            if let Some(mac) = host.mac
                && host.vendor.is_none()
            {
                host.vendor = self.vendor_repo.get_vendor(mac);
            }
        }
    }
}

async fn probe_with_retries(
    prober: &dyn Prober,
    address: Ipv4Addr,
    timeout: Duration,
    retry_attempts: u32,
) -> Result<Option<HostFact>, ProbeError> {
    let mut attempt: u32 = 0;
    loop {
        match prober.probe(address, timeout).await {
            Ok(found) => return Ok(found),
            Err(e) if attempt < retry_attempts => {
                attempt += 1;
                debug!(address = %address, attempt, "probe failed, retrying: {e}");
            }
            Err(e) => return Err(e),
        }
    }
}

fn collect(
    joined: Result<(Id, ProbeOutcome), JoinError>,
    in_flight: &mut HashMap<Id, Ipv4Addr>,
    hosts: &mut Vec<HostFact>,
    observer: &dyn ScanObserver,
) {
    match joined {
        Ok((id, (address, Ok(found)))) => {
            in_flight.remove(&id);
            observer.probe_finished(address, found.as_ref());
            hosts.extend(found);
        }
        Ok((id, (address, Err(e)))) => {
            in_flight.remove(&id);
            warn!(address = %address, "dropping host after repeated probe failures: {e}");
            observer.probe_dropped(address, &e);
        }
        Err(source) => match in_flight.remove(&source.id()) {
            Some(address) => {
                let e = ProbeError::Join { address, source };
                warn!(address = %address, "dropping host: {e}");
                observer.probe_dropped(address, &e);
            }
            None => warn!("probe task aborted: {source}"),
        },
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
