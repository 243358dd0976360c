use std::net::Ipv4Addr;

use netinv_common::config::DEFAULT_LOCATION_NAME;
use netinv_common::network::host::HostFact;
use netinv_core::inventory::{InventoryCounts, InventoryStore, SqliteInventory};
use netinv_core::reconcile::{ReconciliationEngine, RunStatistics};

use crate::support::{Fault, FaultyStore, printer_fact};

fn engine() -> ReconciliationEngine {
    ReconciliationEngine::new(DEFAULT_LOCATION_NAME)
}

fn mixed_batch() -> Vec<HostFact> {
    vec![
        printer_fact(),
        HostFact::new(Ipv4Addr::new(192, 168, 1, 10))
            .with_hostname("nas01")
            .with_service("SSH", 22)
            .with_service("SMB", 445),
        HostFact::new(Ipv4Addr::new(192, 168, 1, 11))
            .with_hostname("nas01")
            .with_service("SSH", 22),
        HostFact::new(Ipv4Addr::new(192, 168, 1, 99)).with_service("HTTP", 8080),
    ]
}

/// The example printer lands as one device, one IP, one service edge and
/// one audit entry.
#[test]
fn printer_end_to_end() {
    let mut store = SqliteInventory::in_memory().unwrap();
    let stats = engine().reconcile(&mut store, &[printer_fact()], false).unwrap();

    assert_eq!(
        stats,
        RunStatistics {
            new_devices: 1,
            updated_devices: 0,
            new_services: 1,
            total_hosts: 1,
            failed_hosts: 0,
        }
    );

    let devices = store.devices().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].identifier, "AA:BB:CC:DD:EE:01");
    assert_eq!(store.addresses_for_device(devices[0].id).unwrap(), vec!["192.168.1.50"]);
    assert_eq!(
        store.services_for_address("192.168.1.50").unwrap(),
        vec![(String::from("HTTP"), 80)]
    );

    let audit = store.audit_entries().unwrap();
    assert_eq!(audit.len(), 1);
    assert_eq!(audit[0].entity_type, "device");
    assert_eq!(audit[0].attribute, "created");

    let counts = store.counts().unwrap();
    assert_eq!(counts.locations, 1);
    assert_eq!(counts.ip_addresses, 1);
    assert_eq!(counts.services, 1);
    assert_eq!(counts.device_links, 1);
    assert_eq!(counts.service_links, 1);
}

#[test]
fn rerun_is_idempotent() {
    let mut store = SqliteInventory::in_memory().unwrap();
    let facts = mixed_batch();

    let first = engine().reconcile(&mut store, &facts, false).unwrap();
    assert!(first.new_devices > 0);
    let snapshot = store.counts().unwrap();

    let second = engine().reconcile(&mut store, &facts, false).unwrap();
    assert_eq!(second.new_devices, 0);
    assert_eq!(second.updated_devices, 0);
    assert_eq!(second.new_services, 0);
    assert_eq!(second.total_hosts, facts.len());
    assert_eq!(store.counts().unwrap(), snapshot);
}

#[test]
fn dry_run_leaves_store_untouched() {
    let facts = mixed_batch();

    let mut dry = SqliteInventory::in_memory().unwrap();
    let planned = engine().reconcile(&mut dry, &facts, true).unwrap();
    assert_eq!(dry.counts().unwrap(), InventoryCounts::default());

    let mut live = SqliteInventory::in_memory().unwrap();
    let applied = engine().reconcile(&mut live, &facts, false).unwrap();

    assert_eq!(planned, applied);
}

#[test]
fn dry_run_over_populated_store_matches_live_run() {
    let mut seeded = SqliteInventory::in_memory().unwrap();
    engine().reconcile(&mut seeded, &[printer_fact()], false).unwrap();
    let before = seeded.counts().unwrap();

    let facts = mixed_batch();
    let planned = engine().reconcile(&mut seeded, &facts, true).unwrap();
    assert_eq!(seeded.counts().unwrap(), before);

    let applied = engine().reconcile(&mut seeded, &facts, false).unwrap();
    assert_eq!(planned, applied);
}

#[test]
fn dry_run_follows_renames_made_earlier_in_the_batch() {
    let mut store = SqliteInventory::in_memory().unwrap();
    engine().reconcile(&mut store, &[printer_fact()], false).unwrap();

    let facts = vec![
        printer_fact().with_hostname("printer1-lobby"),
        HostFact::new(Ipv4Addr::new(192, 168, 1, 60)).with_hostname("lobby"),
    ];
    let planned = engine().reconcile(&mut store, &facts, true).unwrap();
    let applied = engine().reconcile(&mut store, &facts, false).unwrap();

    assert_eq!(planned, applied);
    assert_eq!(applied.new_devices, 0);
    assert_eq!(applied.updated_devices, 2);
    assert_eq!(store.devices().unwrap()[0].name, "lobby");
}

#[test]
fn dry_run_drops_matches_renamed_away_earlier_in_the_batch() {
    let mut store = SqliteInventory::in_memory().unwrap();
    engine().reconcile(&mut store, &[printer_fact()], false).unwrap();

    let facts = vec![
        printer_fact().with_hostname("copier"),
        HostFact::new(Ipv4Addr::new(192, 168, 1, 61)).with_hostname("printer1"),
    ];
    let planned = engine().reconcile(&mut store, &facts, true).unwrap();
    let applied = engine().reconcile(&mut store, &facts, false).unwrap();

    assert_eq!(planned, applied);
    assert_eq!(applied.new_devices, 1);
    assert_eq!(applied.updated_devices, 1);
}

#[test]
fn second_host_failure_is_isolated() {
    let failing = Ipv4Addr::new(10, 0, 0, 2);
    let facts = vec![
        HostFact::new(Ipv4Addr::new(10, 0, 0, 1)).with_hostname("alpha"),
        HostFact::new(failing).with_hostname("beta").with_service("SSH", 22),
        HostFact::new(Ipv4Addr::new(10, 0, 0, 3)).with_hostname("gamma"),
    ];

    let mut store = FaultyStore::new(failing, Fault::Rejected);
    let stats = engine().reconcile(&mut store, &facts, false).unwrap();

    assert_eq!(stats.new_devices, 2);
    assert_eq!(stats.failed_hosts, 1);
    assert_eq!(stats.total_hosts, 3);

    let names: Vec<String> = store
        .inner
        .devices()
        .unwrap()
        .into_iter()
        .map(|device| device.name)
        .collect();
    assert_eq!(names, vec!["alpha", "gamma"]);
    assert_eq!(store.inner.find_service("SSH").unwrap(), None);
}

#[test]
fn store_outage_aborts_the_batch() {
    let failing = Ipv4Addr::new(10, 0, 0, 2);
    let facts = vec![
        HostFact::new(Ipv4Addr::new(10, 0, 0, 1)).with_hostname("alpha"),
        HostFact::new(failing).with_hostname("beta"),
        HostFact::new(Ipv4Addr::new(10, 0, 0, 3)).with_hostname("gamma"),
    ];

    let mut store = FaultyStore::new(failing, Fault::Unavailable);
    let err = engine().reconcile(&mut store, &facts, false).unwrap_err();
    assert!(err.is_fatal());

    let devices = store.inner.devices().unwrap();
    assert_eq!(devices.len(), 1);
    assert_eq!(devices[0].name, "alpha");
}

#[test]
fn service_edge_is_unique_per_port() {
    let mut store = SqliteInventory::in_memory().unwrap();
    let fact = HostFact::new(Ipv4Addr::new(192, 168, 1, 20)).with_service("HTTP", 8080);

    let first = engine().reconcile(&mut store, &[fact.clone()], false).unwrap();
    let second = engine().reconcile(&mut store, &[fact], false).unwrap();

    assert_eq!(first.new_services, 1);
    assert_eq!(second.new_services, 0);
    assert_eq!(store.counts().unwrap().service_links, 1);
}

#[test]
fn same_service_on_two_ports_keeps_both_edges() {
    let mut store = SqliteInventory::in_memory().unwrap();
    let fact = HostFact::new(Ipv4Addr::new(192, 168, 1, 21))
        .with_service("HTTP", 80)
        .with_service("HTTP", 8080);

    let stats = engine().reconcile(&mut store, &[fact], false).unwrap();
    assert_eq!(stats.new_services, 1);
    assert_eq!(store.counts().unwrap().services, 1);
    assert_eq!(store.counts().unwrap().service_links, 2);
}

#[test]
fn shared_default_location_is_created_once() {
    let mut store = SqliteInventory::in_memory().unwrap();
    engine().reconcile(&mut store, &mixed_batch(), false).unwrap();

    let location = store.find_location(DEFAULT_LOCATION_NAME).unwrap().unwrap();
    assert_eq!(store.counts().unwrap().locations, 1);
    assert!(
        store
            .devices()
            .unwrap()
            .iter()
            .all(|device| device.location_id == location.id)
    );
}
