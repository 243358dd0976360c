//! # Network Discovery Service
//!
//! Implements the core "Discover and Reconcile" use case.
//!
//! Both invocation adapters (the interactive command and the background job)
//! call into this service; they differ only in how they report progress.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use netinv_common::config::DiscoveryConfig;
use netinv_common::error::DiscoveryError;
use netinv_common::network::host::HostFact;
use netinv_common::network::subnet::SubnetEnumerator;
use tracing::info;

use crate::inventory::{InventoryStore, StoreError};
use crate::probe::{ProbeSettings, SystemProber};
use crate::reconcile::{ReconciliationEngine, RunStatistics};
use crate::scanner::{DiscoveryOrchestrator, ScanObserver, ScanSettings};
use crate::vendors::MacOuiRepo;

/// Parameters of one run. Missing values fall back to the configuration.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanRequest {
    pub subnet: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub dry_run: bool,
}

impl ScanRequest {
    /// Resolves the subnet and per-probe timeout against `defaults`.
    pub fn resolve(&self, defaults: &DiscoveryConfig) -> Result<(String, Duration), DiscoveryError> {
        let subnet = self
            .subnet
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&defaults.default_subnet)
            .to_string();
        let seconds = self
            .timeout_seconds
            .unwrap_or(defaults.default_timeout_seconds);
        if seconds == 0 {
            return Err(DiscoveryError::configuration("timeout must be at least 1 second"));
        }
        Ok((subnet, Duration::from_secs(seconds)))
    }
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub subnet: String,
    pub dry_run: bool,
    pub hosts: Vec<HostFact>,
    pub stats: RunStatistics,
}

/// Application Service for discovery.
///
/// Orchestrates a run by:
/// 1. scanning the subnet through the [`DiscoveryOrchestrator`].
/// 2. reconciling the facts into the store on a blocking thread, holding the
///    store lock for the whole batch.
pub struct DiscoveryService<S> {
    defaults: DiscoveryConfig,
    orchestrator: DiscoveryOrchestrator,
    engine: Arc<ReconciliationEngine>,
    store: Arc<Mutex<S>>,
}

impl<S: InventoryStore + 'static> DiscoveryService<S> {
    pub fn new(
        defaults: DiscoveryConfig,
        orchestrator: DiscoveryOrchestrator,
        store: Arc<Mutex<S>>,
    ) -> Self {
        let engine = Arc::new(ReconciliationEngine::new(defaults.default_location.clone()));
        Self {
            defaults,
            orchestrator,
            engine,
            store,
        }
    }

    /// Wires the system prober and the bundled OUI database.
    pub fn from_config(config: &DiscoveryConfig, store: Arc<Mutex<S>>) -> anyhow::Result<Self> {
        config.validate()?;
        let enumerator = SubnetEnumerator::from_config(config)?;
        let prober = SystemProber::new(ProbeSettings::from_config(config)?);
        let orchestrator = DiscoveryOrchestrator::new(
            enumerator,
            Arc::new(prober),
            Arc::new(MacOuiRepo),
            ScanSettings::from_config(config),
        );
        Ok(Self::new(config.clone(), orchestrator, store))
    }

    pub fn store(&self) -> Arc<Mutex<S>> {
        Arc::clone(&self.store)
    }

    pub async fn perform_discovery(
        &self,
        request: &ScanRequest,
        observer: Arc<dyn ScanObserver>,
    ) -> anyhow::Result<RunReport> {
        let (subnet, timeout) = request.resolve(&self.defaults)?;
        info!(subnet = %subnet, timeout_secs = timeout.as_secs(), dry_run = request.dry_run, "discovery run started");

        let hosts = self.orchestrator.scan(&subnet, timeout, observer).await?;

        let (hosts, stats) = self
            .reconcile(hosts, request.dry_run)
            .await
            .context("Failed to reconcile discovered hosts")?;

        Ok(RunReport {
            subnet,
            dry_run: request.dry_run,
            hosts,
            stats,
        })
    }

    async fn reconcile(
        &self,
        hosts: Vec<HostFact>,
        dry_run: bool,
    ) -> anyhow::Result<(Vec<HostFact>, RunStatistics)> {
        let store = Arc::clone(&self.store);
        let engine = Arc::clone(&self.engine);

        let joined = tokio::task::spawn_blocking(move || {
            let mut guard = store.lock().map_err(|_| StoreError::Poisoned)?;
            let stats = engine.reconcile(&mut *guard, &hosts, dry_run)?;
            Ok::<_, StoreError>((hosts, stats))
        })
        .await
        .context("Reconciliation task panicked")?;

        Ok(joined?)
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
