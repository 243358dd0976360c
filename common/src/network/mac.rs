use std::str::FromStr;

use pnet::util::MacAddr;

/// The stable inventory identifier derived from a hardware address,
/// e.g. `AA:BB:CC:DD:EE:01`.
pub fn identifier(mac: MacAddr) -> String {
    mac.to_string().to_uppercase()
}

/// Parses `aa:bb:cc:dd:ee:ff` (or dash separated) notation. Unresolved
/// neighbour entries (all zeros) and broadcast addresses are rejected.
pub fn parse(raw: &str) -> Option<MacAddr> {
    let normalized = raw.trim().replace('-', ":");
    let mac = MacAddr::from_str(&normalized).ok()?;
    if mac == MacAddr::zero() || mac == MacAddr::broadcast() {
        return None;
    }
    Some(mac)
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
