//! # Discovery Configuration
//!
//! Read-only settings consumed by the scanner, the reconciliation engine and
//! both invocation paths. Loaded from TOML; every key is optional and falls
//! back to the defaults below.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use anyhow::Context;
use pnet::ipnetwork::Ipv4Network;
use serde::{Deserialize, Serialize};

use crate::error::DiscoveryError;

pub const CONFIG_ENV_VAR: &str = "NETINV_CONFIG";
pub const DEFAULT_CONFIG_FILE: &str = "netinv.toml";
pub const DEFAULT_LOCATION_NAME: &str = "Auto-Discovered Devices";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    pub default_subnet: String,
    pub default_timeout_seconds: u64,
    pub auto_scan_enabled: bool,
    pub max_concurrent_scans: usize,
    pub scan_delay_ms: u64,
    pub retry_attempts: u32,
    pub allowed_subnets: Vec<String>,
    pub max_scan_range: usize,
    pub database_path: PathBuf,
    pub default_location: String,
    // Tables last: TOML cannot emit plain keys after a table.
    pub scan_frequency: ScanFrequency,
    pub methods: DiscoveryMethods,
    /// Port number to service name. Keys are strings on disk because TOML
    /// tables cannot be keyed by integers.
    pub service_ports: BTreeMap<String, String>,
}

/// Toggles for the individual probes run against every candidate address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryMethods {
    pub ping: bool,
    pub arp: bool,
    pub port_scan: bool,
    pub hostname_lookup: bool,
    pub os_detection: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanFrequency {
    pub every: u64,
    pub unit: FrequencyUnit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrequencyUnit {
    Minutes,
    Hours,
    Days,
}

impl ScanFrequency {
    pub fn period(&self) -> Duration {
        let minutes = match self.unit {
            FrequencyUnit::Minutes => self.every,
            FrequencyUnit::Hours => self.every.saturating_mul(60),
            FrequencyUnit::Days => self.every.saturating_mul(60 * 24),
        };
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

impl Default for ScanFrequency {
    fn default() -> Self {
        Self {
            every: 1,
            unit: FrequencyUnit::Hours,
        }
    }
}

impl Default for DiscoveryMethods {
    fn default() -> Self {
        Self {
            ping: true,
            arp: true,
            port_scan: true,
            hostname_lookup: true,
            os_detection: false,
        }
    }
}

const WELL_KNOWN_PORTS: &[(u16, &str)] = &[
    (21, "FTP"),
    (22, "SSH"),
    (23, "Telnet"),
    (25, "SMTP"),
    (53, "DNS"),
    (80, "HTTP"),
    (110, "POP3"),
    (143, "IMAP"),
    (161, "SNMP"),
    (443, "HTTPS"),
    (445, "SMB"),
    (993, "IMAPS"),
    (995, "POP3S"),
    (1433, "MSSQL"),
    (3306, "MySQL"),
    (3389, "RDP"),
    (5432, "PostgreSQL"),
    (5900, "VNC"),
    (8080, "HTTP-Alt"),
];

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            default_subnet: String::from("192.168.1.0/24"),
            default_timeout_seconds: 2,
            auto_scan_enabled: false,
            max_concurrent_scans: 10,
            scan_delay_ms: 100,
            retry_attempts: 3,
            allowed_subnets: vec![
                String::from("10.0.0.0/8"),
                String::from("172.16.0.0/12"),
                String::from("192.168.0.0/16"),
                String::from("127.0.0.0/8"),
            ],
            max_scan_range: 1024,
            database_path: PathBuf::from("netinv.db"),
            default_location: String::from(DEFAULT_LOCATION_NAME),
            scan_frequency: ScanFrequency::default(),
            methods: DiscoveryMethods::default(),
            service_ports: WELL_KNOWN_PORTS
                .iter()
                .map(|(port, name)| (port.to_string(), name.to_string()))
                .collect(),
        }
    }
}

impl DiscoveryConfig {
    /// Resolves the configuration file the way the CLI does: explicit path,
    /// then `NETINV_CONFIG`, then `./netinv.toml`, then built-in defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
            return Self::from_file(Path::new(&path));
        }
        let local = Path::new(DEFAULT_CONFIG_FILE);
        if local.exists() {
            return Self::from_file(local);
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let cfg: Self = toml::from_str(&raw)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn to_toml(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), DiscoveryError> {
        if self.max_concurrent_scans == 0 {
            return Err(DiscoveryError::configuration(
                "max_concurrent_scans must be at least 1",
            ));
        }
        if self.service_ports.is_empty() && self.methods.port_scan {
            return Err(DiscoveryError::configuration(
                "port_scan is enabled but service_ports is empty",
            ));
        }
        self.port_table()?;
        self.allowlist()?;
        Ipv4Network::from_str(&self.default_subnet).map_err(|e| {
            DiscoveryError::configuration(format!(
                "default_subnet {:?} is not a valid CIDR: {e}",
                self.default_subnet
            ))
        })?;
        Ok(())
    }

    /// The port to service-name table, sorted by port.
    pub fn port_table(&self) -> Result<Vec<(u16, String)>, DiscoveryError> {
        self.service_ports
            .iter()
            .map(|(port, name)| {
                port.parse::<u16>()
                    .map(|port| (port, name.clone()))
                    .map_err(|_| {
                        DiscoveryError::configuration(format!("invalid port in service_ports: {port:?}"))
                    })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|mut table| {
                table.sort_by_key(|(port, _)| *port);
                table
            })
    }

    pub fn allowlist(&self) -> Result<Vec<Ipv4Network>, DiscoveryError> {
        self.allowed_subnets
            .iter()
            .map(|cidr| {
                Ipv4Network::from_str(cidr).map_err(|e| {
                    DiscoveryError::configuration(format!("invalid allowed subnet {cidr:?}: {e}"))
                })
            })
            .collect()
    }

    pub fn default_timeout(&self) -> Duration {
        Duration::from_secs(self.default_timeout_seconds)
    }

    pub fn scan_delay(&self) -> Duration {
        Duration::from_millis(self.scan_delay_ms)
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
