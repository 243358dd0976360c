use std::net::Ipv4Addr;

use netinv_common::config::DiscoveryConfig;
use netinv_common::error::DiscoveryError;
use netinv_common::network::subnet::SubnetEnumerator;

fn enumerator(max_scan_range: usize) -> SubnetEnumerator {
    let cfg = DiscoveryConfig {
        max_scan_range,
        ..DiscoveryConfig::default()
    };
    SubnetEnumerator::from_config(&cfg).unwrap()
}

#[test]
fn oversized_range_is_refused() {
    let err = enumerator(20).enumerate("10.0.0.0/8").unwrap_err();
    assert!(matches!(err, DiscoveryError::RangeTooLarge { limit: 20, .. }));
}

#[test]
fn slash_28_yields_sixteen_ascending_addresses() {
    let addresses = enumerator(20).enumerate("192.168.1.0/28").unwrap();
    assert_eq!(addresses.len(), 16);
    assert_eq!(addresses.first(), Some(&Ipv4Addr::new(192, 168, 1, 0)));
    assert_eq!(addresses.last(), Some(&Ipv4Addr::new(192, 168, 1, 15)));
    assert!(addresses.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn public_range_is_outside_allowlist() {
    let err = enumerator(1024).enumerate("8.8.8.0/24").unwrap_err();
    assert!(matches!(err, DiscoveryError::Configuration(_)));
}
