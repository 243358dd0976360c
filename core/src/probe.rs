//! The **probe layer**: one best-effort look at one address.
//!
//! A probe answers a single question: is anything alive at this address,
//! and if so, what can be learned about it? Unreachable hosts are an
//! expected outcome and are reported as `Ok(None)`. Only failures of the
//! probing machinery itself (a missing OS tool, a crashed worker) surface
//! as [`ProbeError`], which the orchestrator retries.

use std::net::Ipv4Addr;
use std::time::Duration;

use async_trait::async_trait;
use netinv_common::config::{DiscoveryConfig, DiscoveryMethods};
use netinv_common::error::DiscoveryError;
use netinv_common::network::host::HostFact;
use thiserror::Error;

pub mod arp;
pub mod ping;
pub mod resolver;
pub mod system;
pub mod tcp;

pub use system::SystemProber;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("probe of {address} failed: {reason}")]
    Unexpected { address: Ipv4Addr, reason: String },

    #[error("probe worker for {address} crashed: {source}")]
    Join {
        address: Ipv4Addr,
        #[source]
        source: tokio::task::JoinError,
    },
}

impl ProbeError {
    pub fn unexpected(address: Ipv4Addr, reason: impl Into<String>) -> Self {
        Self::Unexpected {
            address,
            reason: reason.into(),
        }
    }
}

/// Discovers facts about a single address.
#[async_trait]
pub trait Prober: Send + Sync {
    /// Returns `Ok(None)` when nothing answered within `timeout`.
    async fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> Result<Option<HostFact>, ProbeError>;
}

/// Which sub-probes run, and which ports the TCP sweep visits.
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    pub methods: DiscoveryMethods,
    pub service_ports: Vec<(u16, String)>,
}

impl ProbeSettings {
    pub fn from_config(cfg: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self {
            methods: cfg.methods,
            service_ports: cfg.port_table()?,
        })
    }
}
