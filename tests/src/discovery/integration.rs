use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use netinv_common::config::{DiscoveryConfig, DiscoveryMethods};
use netinv_common::error::DiscoveryError;
use netinv_common::network::host::HostFact;
use netinv_core::discovery::{DiscoveryService, ScanRequest};
use netinv_core::inventory::{InventoryCounts, SqliteInventory};
use netinv_core::job::{DiscoveryJob, JobRunner};
use netinv_core::scanner::SilentObserver;
use tokio::net::TcpListener;

use crate::support::{Fault, FaultyStore, ScriptedProber, printer_fact, scripted_service};

fn request(subnet: &str, dry_run: bool) -> ScanRequest {
    ScanRequest {
        subnet: Some(subnet.to_string()),
        timeout_seconds: Some(1),
        dry_run,
    }
}

fn office_prober() -> ScriptedProber {
    ScriptedProber::default()
        .answer(printer_fact())
        .answer(HostFact::new(Ipv4Addr::new(192, 168, 1, 53)).with_service("SSH", 22))
        .fail(Ipv4Addr::new(192, 168, 1, 52))
}

/// Dry run, live run and re-run of the same subnet through the full service.
#[tokio::test]
async fn scan_then_reconcile_subnet() {
    let service = scripted_service(office_prober(), SqliteInventory::in_memory().unwrap());
    let store = service.store();

    let planned = service
        .perform_discovery(&request("192.168.1.48/29", true), Arc::new(SilentObserver))
        .await
        .unwrap();
    assert_eq!(planned.hosts.len(), 2);
    assert_eq!(store.lock().unwrap().counts().unwrap(), InventoryCounts::default());

    let applied = service
        .perform_discovery(&request("192.168.1.48/29", false), Arc::new(SilentObserver))
        .await
        .unwrap();
    assert_eq!(applied.stats, planned.stats);
    assert_eq!(applied.stats.new_devices, 2);
    assert_eq!(applied.stats.new_services, 2);
    assert_eq!(applied.stats.total_hosts, 2);

    let again = service
        .perform_discovery(&request("192.168.1.48/29", false), Arc::new(SilentObserver))
        .await
        .unwrap();
    assert_eq!(again.stats.new_devices, 0);
    assert_eq!(again.stats.updated_devices, 0);
    assert_eq!(again.stats.new_services, 0);

    let guard = store.lock().unwrap();
    assert_eq!(guard.counts().unwrap().devices, 2);
    assert_eq!(guard.counts().unwrap().ip_addresses, 2);
}

#[tokio::test]
async fn disallowed_subnet_fails_before_probing() {
    let service = scripted_service(office_prober(), SqliteInventory::in_memory().unwrap());
    let err = service
        .perform_discovery(&request("8.8.8.0/24", false), Arc::new(SilentObserver))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::Configuration(_))
    ));
}

#[tokio::test]
async fn oversized_subnet_fails_before_probing() {
    let service = scripted_service(office_prober(), SqliteInventory::in_memory().unwrap());
    let err = service
        .perform_discovery(&request("10.0.0.0/16", false), Arc::new(SilentObserver))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DiscoveryError>(),
        Some(DiscoveryError::RangeTooLarge { .. })
    ));
}

#[tokio::test]
async fn background_job_surfaces_store_outage() {
    let store = FaultyStore::new(Ipv4Addr::new(192, 168, 1, 50), Fault::Unavailable);
    let service = Arc::new(scripted_service(office_prober(), store));
    let job = DiscoveryJob::new(service, request("192.168.1.48/29", false));

    let result = JobRunner::new(2, Duration::from_millis(1))
        .run(|| job.run())
        .await;
    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("unavailable"));
}

#[tokio::test]
async fn background_job_reports_statistics() {
    let service = Arc::new(scripted_service(
        office_prober(),
        SqliteInventory::in_memory().unwrap(),
    ));
    let job = DiscoveryJob::new(service, request("192.168.1.48/29", false));

    let stats = JobRunner::new(1, Duration::ZERO).run(|| job.run()).await.unwrap();
    assert_eq!(stats.new_devices, 2);
    assert_eq!(stats.failed_hosts, 0);
}

/// Real system prober against a loopback listener, port probes only.
#[tokio::test]
async fn loopback_listener_is_discovered() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    let cfg = DiscoveryConfig {
        methods: DiscoveryMethods {
            ping: false,
            arp: false,
            port_scan: true,
            hostname_lookup: false,
            os_detection: false,
        },
        service_ports: BTreeMap::from([(port.to_string(), String::from("Test"))]),
        scan_delay_ms: 0,
        ..DiscoveryConfig::default()
    };
    let store = Arc::new(Mutex::new(SqliteInventory::in_memory().unwrap()));
    let service = DiscoveryService::from_config(&cfg, Arc::clone(&store)).unwrap();

    let report = service
        .perform_discovery(&request("127.0.0.1/32", false), Arc::new(SilentObserver))
        .await
        .unwrap();

    assert_eq!(report.hosts.len(), 1);
    assert_eq!(report.stats.new_devices, 1);
    assert_eq!(
        store.lock().unwrap().services_for_address("127.0.0.1").unwrap(),
        vec![(String::from("Test"), port)]
    );
}
