use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use dns_lookup::lookup_addr;

use super::ProbeError;

/// Reverse lookup through the system resolver.
///
/// The resolver call blocks, so it runs on the blocking pool under
/// `wait`. A timeout or a resolver miss is "no hostname"; only a
/// crashed worker is reported as an error.
pub async fn reverse_lookup(addr: Ipv4Addr, wait: Duration) -> Result<Option<String>, ProbeError> {
    let lookup = tokio::task::spawn_blocking(move || lookup_addr(&IpAddr::V4(addr)));
    match tokio::time::timeout(wait, lookup).await {
        Ok(Ok(Ok(name))) => Ok(clean_hostname(&name, addr)),
        Ok(Ok(Err(_))) | Err(_) => Ok(None),
        Ok(Err(source)) => Err(ProbeError::Join {
            address: addr,
            source,
        }),
    }
}

/// Drops answers that only echo the address back and a trailing root dot.
fn clean_hostname(name: &str, addr: Ipv4Addr) -> Option<String> {
    let name = name.trim().trim_end_matches('.');
    if name.is_empty() || name == addr.to_string() {
        return None;
    }
    Some(name.to_string())
}
