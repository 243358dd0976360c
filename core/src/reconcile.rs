//! # Reconciliation Engine
//!
//! Merges a batch of [`HostFact`]s into the inventory.
//!
//! Every host goes through the same steps: resolve its IP record, match it to
//! a device (creating one when nothing matches), rename the device when the
//! discovered hostname differs, link device and IP, then record each open
//! service and its `(service, ip, port)` edge.
//!
//! The steps are written once against a [`Ledger`]. A live run writes through
//! the store inside one unit per host; a dry run reads the store and records
//! would-be writes in a [`plan::Plan`], so later hosts in the same batch see
//! them and the returned statistics equal those of a live run.
//!
//! A host that fails is logged and counted in [`RunStatistics::failed_hosts`];
//! a fatal store error aborts the whole batch.

use netinv_common::network::host::HostFact;
use tracing::{debug, info, warn};

use crate::inventory::{InventoryStore, NewAuditEntry, StoreError, Upserted};

mod ledger;
mod plan;

use ledger::{DeviceView, Key, Ledger, LiveLedger};
use plan::{Plan, PlannedLedger};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStatistics {
    pub new_devices: usize,
    pub updated_devices: usize,
    pub new_services: usize,
    /// Every fact in the batch, including failed ones.
    pub total_hosts: usize,
    pub failed_hosts: usize,
}

impl RunStatistics {
    fn absorb(&mut self, changes: HostChanges) {
        if changes.new_device {
            self.new_devices += 1;
        } else if changes.updated_device {
            self.updated_devices += 1;
        }
        self.new_services += changes.new_services;
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct HostChanges {
    new_device: bool,
    updated_device: bool,
    new_services: usize,
}

pub struct ReconciliationEngine {
    default_location: String,
}

impl ReconciliationEngine {
    pub fn new(default_location: impl Into<String>) -> Self {
        Self {
            default_location: default_location.into(),
        }
    }

    pub fn reconcile<S: InventoryStore>(
        &self,
        store: &mut S,
        facts: &[HostFact],
        dry_run: bool,
    ) -> Result<RunStatistics, StoreError> {
        let mut stats = RunStatistics {
            total_hosts: facts.len(),
            ..RunStatistics::default()
        };
        let mut plan = Plan::default();

        for fact in facts {
            let outcome = if dry_run {
                let checkpoint = plan.clone();
                let result = self.reconcile_host(&mut PlannedLedger::new(&*store, &mut plan), fact);
                if result.is_err() {
                    plan = checkpoint;
                }
                result
            } else {
                store.within_unit(|s| self.reconcile_host(&mut LiveLedger::new(s), fact))
            };

            match outcome {
                Ok(changes) => {
                    debug!(address = %fact.address, ?changes, "host reconciled");
                    stats.absorb(changes);
                }
                Err(e) if e.is_fatal() => {
                    warn!(address = %fact.address, "aborting reconciliation: {e}");
                    return Err(e);
                }
                Err(e) => {
                    warn!(address = %fact.address, "skipping host: {e}");
                    stats.failed_hosts += 1;
                }
            }
        }

        info!(
            dry_run,
            total_hosts = stats.total_hosts,
            new_devices = stats.new_devices,
            updated_devices = stats.updated_devices,
            new_services = stats.new_services,
            failed_hosts = stats.failed_hosts,
            "reconciliation finished"
        );
        Ok(stats)
    }

    fn reconcile_host<L: Ledger>(
        &self,
        ledger: &mut L,
        fact: &HostFact,
    ) -> Result<HostChanges, StoreError> {
        let mut changes = HostChanges::default();
        let hostname = fact
            .hostname
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty());

        let address = fact.address.to_string();
        let ip = match ledger.find_ip(&address)? {
            Some(ip) => ip,
            None => ledger.create_ip(&address)?,
        };

        let device = match self.match_device(ledger, fact, hostname, ip)? {
            Some(device) => device,
            None => match self.create_device(ledger, fact, hostname)? {
                Upserted::Inserted(device) => {
                    changes.new_device = true;
                    device
                }
                Upserted::Existing(device) => device,
            },
        };

        if !changes.new_device
            && let Some(hostname) = hostname
            && device.name != hostname
        {
            ledger.audit(NewAuditEntry::device_renamed(
                &device.identifier,
                &device.name,
                hostname,
            ))?;
            ledger.rename_device(&device, hostname)?;
            changes.updated_device = true;
        }

        ledger.link_device_ip(&device, ip)?;

        for service in &fact.open_services {
            let key = match ledger.find_service(&service.service_name)? {
                Some(key) => key,
                None => {
                    let created = ledger.create_service(&service.service_name)?;
                    if created.was_inserted() {
                        changes.new_services += 1;
                    }
                    created.into_inner()
                }
            };
            ledger.link_service_ip(key, ip, service.port)?;
        }

        Ok(changes)
    }

    /// MAC identifier first, then hostname fragment. Hosts with neither fall
    /// back to whichever device already owns their IP.
    fn match_device<L: Ledger>(
        &self,
        ledger: &L,
        fact: &HostFact,
        hostname: Option<&str>,
        ip: Key,
    ) -> Result<Option<DeviceView>, StoreError> {
        if let Some(identifier) = fact.mac_identifier()
            && let Some(device) = ledger.device_by_identifier(&identifier)?
        {
            return Ok(Some(device));
        }
        if let Some(hostname) = hostname {
            return ledger.device_by_name_fragment(hostname);
        }
        if fact.mac.is_none() {
            return ledger.device_by_ip(ip);
        }
        Ok(None)
    }

    fn create_device<L: Ledger>(
        &self,
        ledger: &mut L,
        fact: &HostFact,
        hostname: Option<&str>,
    ) -> Result<Upserted<DeviceView>, StoreError> {
        let identifier = fact
            .mac_identifier()
            .unwrap_or_else(placeholder_identifier);
        let name = hostname
            .map(str::to_string)
            .unwrap_or_else(|| format!("Unknown device ({})", fact.address));
        let location = ledger.default_location(&self.default_location)?;

        let created = ledger.create_device(&identifier, &name, fact.vendor.clone(), location)?;
        if let Upserted::Inserted(device) = &created {
            ledger.audit(NewAuditEntry::device_created(&device.identifier, &device.name))?;
        }
        Ok(created)
    }
}

/// `AUTO-` followed by 12 upper-case hex digits.
pub fn placeholder_identifier() -> String {
    let bits: u64 = rand::random::<u64>() & 0xFFFF_FFFF_FFFF;
    format!("AUTO-{bits:012X}")
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{InventoryCounts, NewDevice, SqliteInventory};
    use netinv_common::network::mac;
    use std::net::Ipv4Addr;

    const LOCATION: &str = "Auto-Discovered Devices";

    fn engine() -> ReconciliationEngine {
        ReconciliationEngine::new(LOCATION)
    }

    fn store() -> SqliteInventory {
        SqliteInventory::in_memory().unwrap()
    }

    fn printer() -> HostFact {
        HostFact::new(Ipv4Addr::new(192, 168, 1, 50))
            .with_mac(mac::parse("AA:BB:CC:DD:EE:01").unwrap())
            .with_hostname("printer1")
            .with_service("HTTP", 80)
    }

    #[test]
    fn printer_lands_in_empty_store() {
        let mut store = store();
        let stats = engine().reconcile(&mut store, &[printer()], false).unwrap();

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
        assert_eq!(devices[0].name, "printer1");
        assert_eq!(store.addresses_for_device(devices[0].id).unwrap(), vec!["192.168.1.50"]);
        assert_eq!(
            store.services_for_address("192.168.1.50").unwrap(),
            vec![(String::from("HTTP"), 80)]
        );

        let location = store.location(devices[0].location_id).unwrap().unwrap();
        assert_eq!(location.name, LOCATION);

        let audit = store.audit_entries().unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].entity_id, "AA:BB:CC:DD:EE:01");
        assert_eq!(audit[0].attribute, "created");
    }

    #[test]
    fn second_run_changes_nothing() {
        let mut store = store();
        let facts = vec![
            printer(),
            HostFact::new(Ipv4Addr::new(192, 168, 1, 60)).with_service("SSH", 22),
        ];
        engine().reconcile(&mut store, &facts, false).unwrap();
        let before = store.counts().unwrap();

        let stats = engine().reconcile(&mut store, &facts, false).unwrap();
        assert_eq!(stats.new_devices, 0);
        assert_eq!(stats.updated_devices, 0);
        assert_eq!(stats.new_services, 0);
        assert_eq!(stats.total_hosts, 2);
        assert_eq!(store.counts().unwrap(), before);
    }

    #[test]
    fn dry_run_writes_nothing_and_reports_live_counts() {
        let facts = vec![
            printer(),
            HostFact::new(Ipv4Addr::new(192, 168, 1, 51))
                .with_hostname("printer1")
                .with_service("HTTP", 8080),
            HostFact::new(Ipv4Addr::new(192, 168, 1, 52)).with_service("HTTP", 80),
        ];

        let mut dry_store = store();
        let planned = engine().reconcile(&mut dry_store, &facts, true).unwrap();
        assert_eq!(dry_store.counts().unwrap(), InventoryCounts::default());

        let mut live_store = store();
        let applied = engine().reconcile(&mut live_store, &facts, false).unwrap();
        assert_eq!(planned, applied);
        assert_eq!(applied.new_devices, 2);
        assert_eq!(applied.new_services, 1);
    }

    #[test]
    fn dry_run_sees_existing_inventory() {
        let mut store = store();
        engine().reconcile(&mut store, &[printer()], false).unwrap();
        let before = store.counts().unwrap();

        let renamed = printer().with_hostname("printer1-lobby");
        let stats = engine().reconcile(&mut store, &[renamed], true).unwrap();
        assert_eq!(stats.new_devices, 0);
        assert_eq!(stats.updated_devices, 1);
        assert_eq!(store.counts().unwrap(), before);
    }

    #[test]
    fn hostname_change_renames_and_audits() {
        let mut store = store();
        engine().reconcile(&mut store, &[printer()], false).unwrap();

        let renamed = printer().with_hostname("printer1-lobby");
        let stats = engine().reconcile(&mut store, &[renamed], false).unwrap();
        assert_eq!(stats.updated_devices, 1);
        assert_eq!(stats.new_devices, 0);

        let devices = store.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "printer1-lobby");

        let audit = store.audit_entries().unwrap();
        assert_eq!(audit.len(), 2);
        assert_eq!(audit[1].attribute, "name");
        assert_eq!(audit[1].old_value.as_deref(), Some("printer1"));
        assert_eq!(audit[1].new_value.as_deref(), Some("printer1-lobby"));
    }

    #[test]
    fn hostname_matches_existing_device_by_fragment() {
        let mut store = store();
        let seed = HostFact::new(Ipv4Addr::new(10, 0, 0, 5)).with_hostname("NAS01");
        engine().reconcile(&mut store, &[seed], false).unwrap();

        let same = HostFact::new(Ipv4Addr::new(10, 0, 0, 6)).with_hostname("nas01");
        let stats = engine().reconcile(&mut store, &[same], false).unwrap();
        assert_eq!(stats.new_devices, 0);
        assert_eq!(stats.updated_devices, 1);

        let devices = store.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].name, "nas01");

        let audit = store.audit_entries().unwrap();
        assert_eq!(audit.last().unwrap().old_value.as_deref(), Some("NAS01"));
        assert_eq!(audit.last().unwrap().new_value.as_deref(), Some("nas01"));
        assert_eq!(
            store.addresses_for_device(devices[0].id).unwrap(),
            vec!["10.0.0.5", "10.0.0.6"]
        );
    }

    #[test]
    fn mac_match_wins_over_hostname() {
        let mut store = store();
        let location = store.get_or_create_location(LOCATION).unwrap();
        store
            .insert_device(&NewDevice::new("AUTO-000000000001", "printer1-backup", None, location.id))
            .unwrap();
        store
            .insert_device(&NewDevice::new("AA:BB:CC:DD:EE:01", "printer1", None, location.id))
            .unwrap();

        let stats = engine().reconcile(&mut store, &[printer()], false).unwrap();
        assert_eq!(stats.new_devices, 0);
        assert_eq!(stats.updated_devices, 0);

        let devices = store.devices().unwrap();
        assert_eq!(devices[0].name, "printer1-backup");
        assert!(store.addresses_for_device(devices[0].id).unwrap().is_empty());
        assert_eq!(store.addresses_for_device(devices[1].id).unwrap(), vec!["192.168.1.50"]);
    }

    #[test]
    fn anonymous_host_reuses_device_on_its_ip() {
        let mut store = store();
        let bare = HostFact::new(Ipv4Addr::new(10, 0, 0, 9));
        let first = engine().reconcile(&mut store, &[bare.clone()], false).unwrap();
        let second = engine().reconcile(&mut store, &[bare], false).unwrap();

        assert_eq!(first.new_devices, 1);
        assert_eq!(second.new_devices, 0);
        let devices = store.devices().unwrap();
        assert_eq!(devices.len(), 1);
        assert!(devices[0].identifier.starts_with("AUTO-"));
        assert_eq!(devices[0].name, "Unknown device (10.0.0.9)");
    }

    #[test]
    fn repeated_service_edge_is_stored_once() {
        let mut store = store();
        let fact = HostFact::new(Ipv4Addr::new(10, 0, 0, 3)).with_service("HTTP", 8080);
        engine().reconcile(&mut store, &[fact.clone()], false).unwrap();
        engine().reconcile(&mut store, &[fact], false).unwrap();

        assert_eq!(store.counts().unwrap().service_links, 1);
        assert_eq!(
            store.services_for_address("10.0.0.3").unwrap(),
            vec![(String::from("HTTP"), 8080)]
        );
    }

    #[test]
    fn vendor_becomes_model_of_new_device() {
        let mut store = store();
        let mut fact = printer();
        fact.vendor = Some(String::from("Acme Printing"));
        engine().reconcile(&mut store, &[fact], false).unwrap();
        assert_eq!(
            store.devices().unwrap()[0].model.as_deref(),
            Some("Acme Printing")
        );
    }

    #[test]
    fn placeholder_identifier_shape() {
        let id = placeholder_identifier();
        assert_eq!(id.len(), 17);
        assert!(id.starts_with("AUTO-"));
        assert!(id[5..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }

    #[test]
    fn empty_batch() {
        let mut store = store();
        let stats = engine().reconcile(&mut store, &[], false).unwrap();
        assert_eq!(stats, RunStatistics::default());
    }
}
