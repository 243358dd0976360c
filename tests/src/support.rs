use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use netinv_common::config::DiscoveryConfig;
use netinv_common::network::host::HostFact;
use netinv_common::network::mac;
use netinv_common::network::subnet::SubnetEnumerator;
use netinv_core::discovery::DiscoveryService;
use netinv_core::inventory::{
    DeviceRecord, InventoryStore, IpRecord, LocationRecord, NewAuditEntry, NewDevice,
    ServiceRecord, SqliteInventory, StoreError, Upserted,
};
use netinv_core::probe::{ProbeError, Prober};
use netinv_core::scanner::{DiscoveryOrchestrator, ScanSettings};
use netinv_core::vendors::NoVendors;

pub fn printer_fact() -> HostFact {
    HostFact::new(Ipv4Addr::new(192, 168, 1, 50))
        .with_mac(mac::parse("AA:BB:CC:DD:EE:01").expect("valid mac"))
        .with_hostname("printer1")
        .with_service("HTTP", 80)
}

pub fn test_config() -> DiscoveryConfig {
    DiscoveryConfig {
        max_concurrent_scans: 4,
        scan_delay_ms: 0,
        retry_attempts: 1,
        max_scan_range: 256,
        ..DiscoveryConfig::default()
    }
}

/// Answers from a fixed table; listed failing addresses always error.
#[derive(Default)]
pub struct ScriptedProber {
    answers: HashMap<Ipv4Addr, HostFact>,
    failing: HashSet<Ipv4Addr>,
}

impl ScriptedProber {
    pub fn answer(mut self, fact: HostFact) -> Self {
        self.answers.insert(fact.address, fact);
        self
    }

    pub fn fail(mut self, address: Ipv4Addr) -> Self {
        self.failing.insert(address);
        self
    }
}

#[async_trait]
impl Prober for ScriptedProber {
    async fn probe(
        &self,
        address: Ipv4Addr,
        _timeout: Duration,
    ) -> Result<Option<HostFact>, ProbeError> {
        if self.failing.contains(&address) {
            return Err(ProbeError::unexpected(address, "scripted failure"));
        }
        Ok(self.answers.get(&address).cloned())
    }
}

pub fn scripted_service<S: InventoryStore + 'static>(
    prober: ScriptedProber,
    store: S,
) -> DiscoveryService<S> {
    let cfg = test_config();
    let enumerator = SubnetEnumerator::from_config(&cfg).expect("test setup");
    let orchestrator = DiscoveryOrchestrator::new(
        enumerator,
        Arc::new(prober),
        Arc::new(NoVendors),
        ScanSettings::from_config(&cfg),
    );
    DiscoveryService::new(cfg, orchestrator, Arc::new(Mutex::new(store)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    Rejected,
    Unavailable,
}

/// Delegates to a real store but fails every IP insert for one address.
pub struct FaultyStore {
    pub inner: SqliteInventory,
    address: String,
    fault: Fault,
}

impl FaultyStore {
    pub fn new(address: Ipv4Addr, fault: Fault) -> Self {
        Self {
            inner: SqliteInventory::in_memory().expect("test setup"),
            address: address.to_string(),
            fault,
        }
    }
}

impl InventoryStore for FaultyStore {
    fn find_ip(&self, address: &str) -> Result<Option<IpRecord>, StoreError> {
        self.inner.find_ip(address)
    }

    fn insert_ip(&mut self, address: &str) -> Result<Upserted<IpRecord>, StoreError> {
        if address == self.address {
            return Err(match self.fault {
                Fault::Rejected => StoreError::rejected(format!("constraint failed for {address}")),
                Fault::Unavailable => StoreError::unavailable("disk I/O error"),
            });
        }
        self.inner.insert_ip(address)
    }

    fn find_device_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        self.inner.find_device_by_identifier(identifier)
    }

    fn find_device_by_name_fragment(
        &self,
        fragment: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        self.inner.find_device_by_name_fragment(fragment)
    }

    fn find_devices_by_name_fragment(
        &self,
        fragment: &str,
    ) -> Result<Vec<DeviceRecord>, StoreError> {
        self.inner.find_devices_by_name_fragment(fragment)
    }

    fn find_device_by_ip(&self, ip_id: i64) -> Result<Option<DeviceRecord>, StoreError> {
        self.inner.find_device_by_ip(ip_id)
    }

    fn insert_device(&mut self, device: &NewDevice) -> Result<Upserted<DeviceRecord>, StoreError> {
        self.inner.insert_device(device)
    }

    fn rename_device(&mut self, device_id: i64, name: &str) -> Result<(), StoreError> {
        self.inner.rename_device(device_id, name)
    }

    fn link_device_ip(&mut self, device_id: i64, ip_id: i64) -> Result<bool, StoreError> {
        self.inner.link_device_ip(device_id, ip_id)
    }

    fn find_service(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError> {
        self.inner.find_service(name)
    }

    fn insert_service(&mut self, name: &str) -> Result<Upserted<ServiceRecord>, StoreError> {
        self.inner.insert_service(name)
    }

    fn link_service_ip(
        &mut self,
        service_id: i64,
        ip_id: i64,
        port: u16,
    ) -> Result<bool, StoreError> {
        self.inner.link_service_ip(service_id, ip_id, port)
    }

    fn find_location(&self, name: &str) -> Result<Option<LocationRecord>, StoreError> {
        self.inner.find_location(name)
    }

    fn get_or_create_location(&mut self, name: &str) -> Result<LocationRecord, StoreError> {
        self.inner.get_or_create_location(name)
    }

    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), StoreError> {
        self.inner.append_audit(entry)
    }

    fn begin_unit(&mut self) -> Result<(), StoreError> {
        self.inner.begin_unit()
    }

    fn commit_unit(&mut self) -> Result<(), StoreError> {
        self.inner.commit_unit()
    }

    fn rollback_unit(&mut self) -> Result<(), StoreError> {
        self.inner.rollback_unit()
    }
}
