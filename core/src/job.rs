//! Background invocation: the queued discovery job, the retry host it runs
//! under, and the periodic scheduler.
//!
//! The job never swallows a failure. It logs a structured record and hands
//! the error back so [`JobRunner`] can retry the run.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use netinv_common::config::DiscoveryConfig;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::discovery::{DiscoveryService, ScanRequest};
use crate::inventory::InventoryStore;
use crate::reconcile::RunStatistics;
use crate::scanner::SilentObserver;

pub const JOB_NAME: &str = "network-discovery";

pub struct DiscoveryJob<S> {
    service: Arc<DiscoveryService<S>>,
    request: ScanRequest,
}

impl<S: InventoryStore + 'static> DiscoveryJob<S> {
    pub fn new(service: Arc<DiscoveryService<S>>, request: ScanRequest) -> Self {
        Self { service, request }
    }

    pub async fn run(&self) -> anyhow::Result<RunStatistics> {
        info!(
            job = JOB_NAME,
            subnet = self.request.subnet.as_deref().unwrap_or("<default>"),
            dry_run = self.request.dry_run,
            "job started"
        );

        match self
            .service
            .perform_discovery(&self.request, Arc::new(SilentObserver))
            .await
        {
            Ok(report) => {
                let stats = report.stats;
                info!(
                    job = JOB_NAME,
                    subnet = %report.subnet,
                    hosts_found = report.hosts.len(),
                    total_hosts = stats.total_hosts,
                    new_devices = stats.new_devices,
                    updated_devices = stats.updated_devices,
                    new_services = stats.new_services,
                    failed_hosts = stats.failed_hosts,
                    dry_run = report.dry_run,
                    "job finished"
                );
                Ok(stats)
            }
            Err(e) => {
                error!(job = JOB_NAME, error = %format!("{e:#}"), "job failed");
                Err(e)
            }
        }
    }
}

/// Re-runs a failing job up to `attempts` times, waiting `backoff * n`
/// before the n-th retry.
#[derive(Debug, Clone, Copy)]
pub struct JobRunner {
    attempts: u32,
    backoff: Duration,
}

impl JobRunner {
    pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(5);

    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }

    pub async fn run<T, F, Fut>(&self, mut job: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match job().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.attempts => {
                    let wait = self.backoff * attempt;
                    warn!(
                        job = JOB_NAME,
                        attempt,
                        max_attempts = self.attempts,
                        retry_in_ms = wait.as_millis() as u64,
                        "job attempt failed: {e:#}"
                    );
                    tokio::time::sleep(wait).await;
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "{JOB_NAME} failed after {attempt} attempt(s)"
                    )));
                }
            }
        }
    }
}

/// Fires a job every `period`. A run that overruns its slot swallows the
/// ticks it missed, so runs never overlap.
#[derive(Debug, Clone, Copy)]
pub struct Scheduler {
    period: Duration,
}

impl Scheduler {
    pub fn new(period: Duration) -> Self {
        Self { period }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> anyhow::Result<Self> {
        if !cfg.auto_scan_enabled {
            bail!("auto_scan_enabled is false, refusing to schedule discovery");
        }
        let period = cfg.scan_frequency.period();
        if period.is_zero() {
            bail!("scan_frequency must be at least one minute");
        }
        Ok(Self::new(period))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs `tick` on every period until `shutdown` resolves. Failed runs are
    /// logged and the schedule carries on. Returns the number of runs.
    pub async fn run_until<F, Fut, T>(&self, shutdown: impl Future<Output = ()>, mut tick: F) -> u64
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        info!(job = JOB_NAME, period_secs = self.period.as_secs(), "scheduler started");
        let mut runs: u64 = 0;
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = interval.tick() => {
                    runs += 1;
                    if let Err(e) = tick().await {
                        error!(job = JOB_NAME, run = runs, error = %format!("{e:#}"), "scheduled run failed");
                    }
                }
            }
        }
        info!(job = JOB_NAME, runs, "scheduler stopped");
        runs
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
