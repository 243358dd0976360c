//! The store operations a host reconciliation performs, abstracted so the
//! same steps drive both live writes and dry-run planning.

use crate::inventory::{DeviceRecord, InventoryStore, NewAuditEntry, NewDevice, StoreError, Upserted};

/// Reference to an inventory row, persisted or only planned.
///
/// Planned rows sort after stored ones, matching the ids a live run would
/// hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Key {
    Stored(i64),
    Planned(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceView {
    pub key: Key,
    pub identifier: String,
    pub name: String,
}

impl From<DeviceRecord> for DeviceView {
    fn from(record: DeviceRecord) -> Self {
        Self {
            key: Key::Stored(record.id),
            identifier: record.identifier,
            name: record.name,
        }
    }
}

pub trait Ledger {
    fn find_ip(&self, address: &str) -> Result<Option<Key>, StoreError>;
    fn create_ip(&mut self, address: &str) -> Result<Key, StoreError>;

    fn device_by_identifier(&self, identifier: &str) -> Result<Option<DeviceView>, StoreError>;
    fn device_by_name_fragment(&self, fragment: &str) -> Result<Option<DeviceView>, StoreError>;
    fn device_by_ip(&self, ip: Key) -> Result<Option<DeviceView>, StoreError>;
    fn default_location(&mut self, name: &str) -> Result<Key, StoreError>;
    fn create_device(
        &mut self,
        identifier: &str,
        name: &str,
        model: Option<String>,
        location: Key,
    ) -> Result<Upserted<DeviceView>, StoreError>;
    fn rename_device(&mut self, device: &DeviceView, name: &str) -> Result<(), StoreError>;
    fn link_device_ip(&mut self, device: &DeviceView, ip: Key) -> Result<(), StoreError>;

    fn find_service(&self, name: &str) -> Result<Option<Key>, StoreError>;
    fn create_service(&mut self, name: &str) -> Result<Upserted<Key>, StoreError>;
    fn link_service_ip(&mut self, service: Key, ip: Key, port: u16) -> Result<(), StoreError>;

    fn audit(&mut self, entry: NewAuditEntry) -> Result<(), StoreError>;
}

/// Writes straight through to the store.
pub struct LiveLedger<'a, S> {
    store: &'a mut S,
}

impl<'a, S: InventoryStore> LiveLedger<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self { store }
    }
}

fn stored(key: Key) -> Result<i64, StoreError> {
    match key {
        Key::Stored(id) => Ok(id),
        Key::Planned(_) => Err(StoreError::rejected("planned row reached a live write")),
    }
}

impl<S: InventoryStore> Ledger for LiveLedger<'_, S> {
    fn find_ip(&self, address: &str) -> Result<Option<Key>, StoreError> {
        Ok(self.store.find_ip(address)?.map(|ip| Key::Stored(ip.id)))
    }

    fn create_ip(&mut self, address: &str) -> Result<Key, StoreError> {
        Ok(Key::Stored(self.store.insert_ip(address)?.into_inner().id))
    }

    fn device_by_identifier(&self, identifier: &str) -> Result<Option<DeviceView>, StoreError> {
        Ok(self.store.find_device_by_identifier(identifier)?.map(DeviceView::from))
    }

    fn device_by_name_fragment(&self, fragment: &str) -> Result<Option<DeviceView>, StoreError> {
        Ok(self.store.find_device_by_name_fragment(fragment)?.map(DeviceView::from))
    }

    fn device_by_ip(&self, ip: Key) -> Result<Option<DeviceView>, StoreError> {
        Ok(self.store.find_device_by_ip(stored(ip)?)?.map(DeviceView::from))
    }

    fn default_location(&mut self, name: &str) -> Result<Key, StoreError> {
        Ok(Key::Stored(self.store.get_or_create_location(name)?.id))
    }

    fn create_device(
        &mut self,
        identifier: &str,
        name: &str,
        model: Option<String>,
        location: Key,
    ) -> Result<Upserted<DeviceView>, StoreError> {
        let device = NewDevice::new(identifier, name, model, stored(location)?);
        Ok(match self.store.insert_device(&device)? {
            Upserted::Inserted(record) => Upserted::Inserted(record.into()),
            Upserted::Existing(record) => Upserted::Existing(record.into()),
        })
    }

    fn rename_device(&mut self, device: &DeviceView, name: &str) -> Result<(), StoreError> {
        self.store.rename_device(stored(device.key)?, name)
    }

    fn link_device_ip(&mut self, device: &DeviceView, ip: Key) -> Result<(), StoreError> {
        self.store.link_device_ip(stored(device.key)?, stored(ip)?)?;
        Ok(())
    }

    fn find_service(&self, name: &str) -> Result<Option<Key>, StoreError> {
        Ok(self.store.find_service(name)?.map(|svc| Key::Stored(svc.id)))
    }

    fn create_service(&mut self, name: &str) -> Result<Upserted<Key>, StoreError> {
        Ok(match self.store.insert_service(name)? {
            Upserted::Inserted(svc) => Upserted::Inserted(Key::Stored(svc.id)),
            Upserted::Existing(svc) => Upserted::Existing(Key::Stored(svc.id)),
        })
    }

    fn link_service_ip(&mut self, service: Key, ip: Key, port: u16) -> Result<(), StoreError> {
        self.store.link_service_ip(stored(service)?, stored(ip)?, port)?;
        Ok(())
    }

    fn audit(&mut self, entry: NewAuditEntry) -> Result<(), StoreError> {
        self.store.append_audit(&entry)
    }
}
