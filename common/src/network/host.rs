//! # Host Facts
//!
//! What a single probe learned about one live address. Facts live for one
//! discovery run: the orchestrator produces them and the reconciliation
//! engine consumes them.

use std::net::Ipv4Addr;

use pnet::util::MacAddr;

use super::mac;

/// A named service answering on a TCP port.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpenService {
    pub service_name: String,
    pub port: u16,
}

impl OpenService {
    pub fn new(service_name: impl Into<String>, port: u16) -> Self {
        Self {
            service_name: service_name.into(),
            port,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFact {
    pub address: Ipv4Addr,
    pub mac: Option<MacAddr>,
    pub hostname: Option<String>,
    /// Manufacturer resolved from the MAC OUI, when known.
    pub vendor: Option<String>,
    /// Ordered by port.
    pub open_services: Vec<OpenService>,
}

impl HostFact {
    pub fn new(address: Ipv4Addr) -> Self {
        Self {
            address,
            mac: None,
            hostname: None,
            vendor: None,
            open_services: Vec::new(),
        }
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = Some(mac);
        self
    }

    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        let hostname = hostname.into();
        let trimmed = hostname.trim();
        self.hostname = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn with_service(mut self, service_name: impl Into<String>, port: u16) -> Self {
        self.open_services.push(OpenService::new(service_name, port));
        self.open_services.sort_by_key(|svc| svc.port);
        self
    }

    /// The MAC-derived inventory identifier, if a MAC was resolved.
    pub fn mac_identifier(&self) -> Option<String> {
        self.mac.map(mac::identifier)
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
