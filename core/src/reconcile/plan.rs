//! Dry-run bookkeeping.
//!
//! Reads go to the store first and then to the rows planned earlier in the
//! batch; writes only ever touch the plan.

use std::collections::BTreeMap;

use crate::inventory::{InventoryStore, NewAuditEntry, StoreError, Upserted};

use super::ledger::{DeviceView, Key, Ledger};

#[derive(Debug, Clone)]
struct PlannedDevice {
    identifier: String,
    name: String,
}

#[derive(Debug, Default, Clone)]
pub struct Plan {
    ips: Vec<String>,
    devices: Vec<PlannedDevice>,
    services: Vec<String>,
    /// Pending renames of stored devices, by row id.
    renames: BTreeMap<i64, PlannedDevice>,
    /// `(ip, device)` pairs, with the device identifier.
    device_links: BTreeMap<(Key, Key), String>,
}

pub struct PlannedLedger<'a, S> {
    store: &'a S,
    plan: &'a mut Plan,
}

impl<'a, S: InventoryStore> PlannedLedger<'a, S> {
    pub fn new(store: &'a S, plan: &'a mut Plan) -> Self {
        Self { store, plan }
    }

    fn overlay(&self, mut device: DeviceView) -> DeviceView {
        if let Key::Stored(id) = device.key
            && let Some(renamed) = self.plan.renames.get(&id)
        {
            device.name = renamed.name.clone();
        }
        device
    }

    fn planned_device(&self, idx: usize) -> Option<DeviceView> {
        self.plan.devices.get(idx).map(|device| DeviceView {
            key: Key::Planned(idx),
            identifier: device.identifier.clone(),
            name: device.name.clone(),
        })
    }

    fn linked_view(&self, key: Key, identifier: &str) -> Result<Option<DeviceView>, StoreError> {
        match key {
            Key::Planned(idx) => Ok(self.planned_device(idx)),
            Key::Stored(_) => Ok(self
                .store
                .find_device_by_identifier(identifier)?
                .map(|device| self.overlay(device.into()))),
        }
    }
}

impl<S: InventoryStore> Ledger for PlannedLedger<'_, S> {
    fn find_ip(&self, address: &str) -> Result<Option<Key>, StoreError> {
        if let Some(ip) = self.store.find_ip(address)? {
            return Ok(Some(Key::Stored(ip.id)));
        }
        Ok(self
            .plan
            .ips
            .iter()
            .position(|planned| planned == address)
            .map(Key::Planned))
    }

    fn create_ip(&mut self, address: &str) -> Result<Key, StoreError> {
        self.plan.ips.push(address.to_string());
        Ok(Key::Planned(self.plan.ips.len() - 1))
    }

    fn device_by_identifier(&self, identifier: &str) -> Result<Option<DeviceView>, StoreError> {
        if let Some(device) = self.store.find_device_by_identifier(identifier)? {
            return Ok(Some(self.overlay(device.into())));
        }
        Ok(self
            .plan
            .devices
            .iter()
            .position(|device| device.identifier == identifier)
            .and_then(|idx| self.planned_device(idx)))
    }

    fn device_by_name_fragment(&self, fragment: &str) -> Result<Option<DeviceView>, StoreError> {
        if fragment.trim().is_empty() {
            return Ok(None);
        }
        let needle = fragment.to_lowercase();
        let matches = |name: &str| name.to_lowercase().contains(&needle);

        // Stored rows match on their name after the planned renames.
        let stored = self
            .store
            .find_devices_by_name_fragment(fragment)?
            .into_iter()
            .map(|device| self.overlay(device.into()))
            .find(|device| matches(&device.name));
        let renamed = self
            .plan
            .renames
            .iter()
            .find(|(_, renamed)| matches(&renamed.name))
            .map(|(id, renamed)| DeviceView {
                key: Key::Stored(*id),
                identifier: renamed.identifier.clone(),
                name: renamed.name.clone(),
            });

        let first_stored = match (stored, renamed) {
            (Some(a), Some(b)) => Some(if b.key < a.key { b } else { a }),
            (a, b) => a.or(b),
        };
        if first_stored.is_some() {
            return Ok(first_stored);
        }

        Ok(self
            .plan
            .devices
            .iter()
            .position(|device| matches(&device.name))
            .and_then(|idx| self.planned_device(idx)))
    }

    fn device_by_ip(&self, ip: Key) -> Result<Option<DeviceView>, StoreError> {
        let stored = match ip {
            Key::Stored(id) => self
                .store
                .find_device_by_ip(id)?
                .map(|device| self.overlay(device.into())),
            Key::Planned(_) => None,
        };
        let planned = self
            .plan
            .device_links
            .range((ip, Key::Stored(i64::MIN))..)
            .take_while(|((linked_ip, _), _)| *linked_ip == ip)
            .map(|((_, device), identifier)| (*device, identifier.as_str()))
            .next();

        match (stored, planned) {
            (Some(device), Some((key, identifier))) if key < device.key => {
                self.linked_view(key, identifier)
            }
            (Some(device), _) => Ok(Some(device)),
            (None, Some((key, identifier))) => self.linked_view(key, identifier),
            (None, None) => Ok(None),
        }
    }

    fn default_location(&mut self, name: &str) -> Result<Key, StoreError> {
        Ok(match self.store.find_location(name)? {
            Some(location) => Key::Stored(location.id),
            None => Key::Planned(0),
        })
    }

    fn create_device(
        &mut self,
        identifier: &str,
        name: &str,
        _model: Option<String>,
        _location: Key,
    ) -> Result<Upserted<DeviceView>, StoreError> {
        self.plan.devices.push(PlannedDevice {
            identifier: identifier.to_string(),
            name: name.to_string(),
        });
        let idx = self.plan.devices.len() - 1;
        self.planned_device(idx)
            .map(Upserted::Inserted)
            .ok_or_else(|| StoreError::rejected("planned device missing"))
    }

    fn rename_device(&mut self, device: &DeviceView, name: &str) -> Result<(), StoreError> {
        match device.key {
            Key::Stored(id) => {
                self.plan.renames.insert(
                    id,
                    PlannedDevice {
                        identifier: device.identifier.clone(),
                        name: name.to_string(),
                    },
                );
            }
            Key::Planned(idx) => {
                if let Some(planned) = self.plan.devices.get_mut(idx) {
                    planned.name = name.to_string();
                }
            }
        }
        Ok(())
    }

    fn link_device_ip(&mut self, device: &DeviceView, ip: Key) -> Result<(), StoreError> {
        self.plan
            .device_links
            .insert((ip, device.key), device.identifier.clone());
        Ok(())
    }

    fn find_service(&self, name: &str) -> Result<Option<Key>, StoreError> {
        if let Some(svc) = self.store.find_service(name)? {
            return Ok(Some(Key::Stored(svc.id)));
        }
        Ok(self
            .plan
            .services
            .iter()
            .position(|planned| planned == name)
            .map(Key::Planned))
    }

    fn create_service(&mut self, name: &str) -> Result<Upserted<Key>, StoreError> {
        self.plan.services.push(name.to_string());
        Ok(Upserted::Inserted(Key::Planned(self.plan.services.len() - 1)))
    }

    fn link_service_ip(&mut self, _service: Key, _ip: Key, _port: u16) -> Result<(), StoreError> {
        Ok(())
    }

    fn audit(&mut self, _entry: NewAuditEntry) -> Result<(), StoreError> {
        Ok(())
    }
}
