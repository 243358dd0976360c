//! The production [`Prober`]: OS ping, the kernel neighbour table, the
//! system resolver and TCP connects, combined per the configured toggles.

use std::net::Ipv4Addr;
use std::sync::Once;
use std::time::Duration;

use async_trait::async_trait;
use netinv_common::network::host::HostFact;
use tracing::{debug, trace, warn};

use super::tcp::{self, PortSweep};
use super::{ProbeError, ProbeSettings, Prober, arp, ping, resolver};

static OS_DETECTION_NOTICE: Once = Once::new();
static PING_UNAVAILABLE: Once = Once::new();

pub struct SystemProber {
    settings: ProbeSettings,
    ping_program: String,
}

impl SystemProber {
    pub fn new(settings: ProbeSettings) -> Self {
        if settings.methods.os_detection {
            OS_DETECTION_NOTICE.call_once(|| {
                debug!("os_detection is enabled but no OS fingerprinting probe is available");
            });
        }
        Self {
            settings,
            ping_program: ping::PING_PROGRAM.to_string(),
        }
    }

    /// Runs `program` instead of the `ping` found on `PATH`.
    pub fn with_ping_program(mut self, program: impl Into<String>) -> Self {
        self.ping_program = program.into();
        self
    }
}

#[async_trait]
impl Prober for SystemProber {
    async fn probe(
        &self,
        address: Ipv4Addr,
        timeout: Duration,
    ) -> Result<Option<HostFact>, ProbeError> {
        let methods = self.settings.methods;

        let echo = async {
            if methods.ping {
                ping::ping(&self.ping_program, address, timeout).await
            } else {
                Ok(false)
            }
        };
        let ports = async {
            if methods.port_scan {
                tcp::sweep_ports(address, &self.settings.service_ports, timeout).await
            } else {
                PortSweep::default()
            }
        };
        let lookup = async {
            if methods.hostname_lookup {
                resolver::reverse_lookup(address, timeout).await
            } else {
                Ok(None)
            }
        };
        let (echo, sweep, hostname) = tokio::join!(echo, ports, lookup);

        let echoed = match echo {
            Ok(echoed) => echoed,
            // Without ping there is nothing left to decide reachability.
            Err(e) if !(methods.port_scan || methods.arp) => return Err(e),
            Err(e) => {
                PING_UNAVAILABLE.call_once(|| {
                    warn!("ping is unavailable, relying on port and ARP probes: {e}");
                });
                false
            }
        };

        let mac = if methods.arp {
            arp::lookup(address).await
        } else {
            None
        };

        if !(echoed || sweep.responded || mac.is_some()) {
            trace!(address = %address, "no answer");
            return Ok(None);
        }

        let mut fact = HostFact::new(address);
        fact.mac = mac;
        fact.open_services = sweep.open;
        match hostname {
            Ok(Some(name)) => fact = fact.with_hostname(name),
            Ok(None) => {}
            Err(e) => debug!(address = %address, "hostname lookup skipped: {e}"),
        }

        debug!(
            address = %address,
            mac = ?fact.mac,
            hostname = ?fact.hostname,
            services = fact.open_services.len(),
            "host answered"
        );
        Ok(Some(fact))
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
