//! # Subnet Enumerator
//!
//! Turns a CIDR string into the ordered list of addresses a run will probe.
//! Two limits guard the network: the block must sit inside an allowed
//! subnet, and it must not hold more addresses than one run may touch.

use std::net::Ipv4Addr;
use std::str::FromStr;

use pnet::ipnetwork::Ipv4Network;

use crate::config::DiscoveryConfig;
use crate::error::DiscoveryError;
use crate::network::range::Ipv4Range;

#[derive(Debug, Clone)]
pub struct SubnetEnumerator {
    allowed: Vec<Ipv4Range>,
    max_scan_range: usize,
}

impl SubnetEnumerator {
    pub fn new(allowed: Vec<Ipv4Network>, max_scan_range: usize) -> Self {
        Self {
            allowed: allowed.into_iter().map(Ipv4Range::from).collect(),
            max_scan_range,
        }
    }

    pub fn from_config(cfg: &DiscoveryConfig) -> Result<Self, DiscoveryError> {
        Ok(Self::new(cfg.allowlist()?, cfg.max_scan_range))
    }

    /// Expands `cidr` into its addresses in ascending order.
    ///
    /// Fails with [`DiscoveryError::Configuration`] when the block does not
    /// parse or is not covered by the allowlist, and with
    /// [`DiscoveryError::RangeTooLarge`] when it exceeds the address ceiling.
    /// Nothing is truncated.
    pub fn enumerate(&self, cidr: &str) -> Result<Vec<Ipv4Addr>, DiscoveryError> {
        let range = self.resolve(cidr)?;
        Ok(range.iter().collect())
    }

    /// Validates `cidr` and returns its range without materializing it.
    pub fn resolve(&self, cidr: &str) -> Result<Ipv4Range, DiscoveryError> {
        let network = parse_cidr(cidr)?;
        let range = Ipv4Range::from(network);

        if !self.allowed.iter().any(|allowed| allowed.covers(&range)) {
            return Err(DiscoveryError::configuration(format!(
                "{cidr} is outside the allowed subnets"
            )));
        }

        let requested = range.len();
        if requested > self.max_scan_range as u64 {
            return Err(DiscoveryError::RangeTooLarge {
                cidr: cidr.to_string(),
                requested,
                limit: self.max_scan_range,
            });
        }

        Ok(range)
    }
}

fn parse_cidr(cidr: &str) -> Result<Ipv4Network, DiscoveryError> {
    let trimmed = cidr.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::configuration("no subnet given"));
    }
    Ipv4Network::from_str(trimmed)
        .map_err(|e| DiscoveryError::configuration(format!("invalid subnet {cidr:?}: {e}")))
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
