//! MAC resolution from the kernel neighbour table.
//!
//! The reachability probes that run first (ping, TCP) make the kernel ARP
//! for the address, so by the time this runs the entry is usually present.

use std::net::Ipv4Addr;

use netinv_common::network::mac;
use pnet::util::MacAddr;
use tracing::debug;

const NEIGHBOUR_TABLE: &str = "/proc/net/arp";
const FLAG_COMPLETE: u32 = 0x2;

/// Best effort: any failure to read the table means "unknown".
pub async fn lookup(addr: Ipv4Addr) -> Option<MacAddr> {
    match tokio::fs::read_to_string(NEIGHBOUR_TABLE).await {
        Ok(table) => find_in_table(&table, addr),
        Err(e) => {
            debug!(address = %addr, "neighbour table unavailable: {e}");
            None
        }
    }
}

/// Parses the `/proc/net/arp` layout:
/// `IP address  HW type  Flags  HW address  Mask  Device`.
pub fn find_in_table(table: &str, addr: Ipv4Addr) -> Option<MacAddr> {
    table.lines().skip(1).find_map(|line| {
        let cols: Vec<&str> = line.split_whitespace().collect();
        let [ip, _hw_type, flags, hw_addr, ..] = cols.as_slice() else {
            return None;
        };
        if ip.parse::<Ipv4Addr>().ok()? != addr {
            return None;
        }
        let flags = u32::from_str_radix(flags.trim_start_matches("0x"), 16).ok()?;
        if flags & FLAG_COMPLETE == 0 {
            return None;
        }
        mac::parse(hw_addr)
    })
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
