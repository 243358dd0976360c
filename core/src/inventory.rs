//! # Inventory Store
//!
//! The persistent side of discovery: locations, devices, IP addresses,
//! services, the links between them and the append-only audit log.
//!
//! [`InventoryStore`] is the port the reconciliation engine writes through;
//! [`sqlite::SqliteInventory`] is the adapter used by the binary and tests.
//! Every insert is an upsert on the entity's unique key and reports whether
//! it created the row, so two runs racing on the same database never
//! duplicate an entity.

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::warn;

pub mod schema;
pub mod sqlite;

pub use sqlite::SqliteInventory;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be used at all (connection lost, disk full,
    /// corruption). Aborts the whole reconciliation phase.
    #[error("inventory store unavailable: {0}")]
    Unavailable(#[source] BoxError),

    /// One change was refused (constraint, bad data). Only the host being
    /// reconciled is affected.
    #[error("inventory store rejected the change: {0}")]
    Rejected(#[source] BoxError),

    #[error("inventory store lock poisoned")]
    Poisoned,
}

impl StoreError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::Rejected(reason.into())
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        let reason: String = reason.into();
        Self::Unavailable(reason.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Poisoned)
    }
}

/// Result of an insert-if-absent on a unique key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Upserted<T> {
    Inserted(T),
    Existing(T),
}

impl<T> Upserted<T> {
    pub fn was_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            Self::Inserted(v) | Self::Existing(v) => v,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationRecord {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRecord {
    pub id: i64,
    pub identifier: String,
    pub name: String,
    pub model: Option<String>,
    pub location_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRecord {
    pub id: i64,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRecord {
    pub id: i64,
    pub name: String,
}

/// Every settable column of a new device; ids and timestamps are the store's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDevice {
    pub identifier: String,
    pub name: String,
    pub model: Option<String>,
    pub location_id: i64,
}

impl NewDevice {
    pub fn new(
        identifier: impl Into<String>,
        name: impl Into<String>,
        model: Option<String>,
        location_id: i64,
    ) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            model,
            location_id,
        }
    }
}

pub const DEVICE_ENTITY: &str = "device";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAuditEntry {
    pub entity_type: String,
    pub entity_id: String,
    pub attribute: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
}

impl NewAuditEntry {
    pub fn device_created(identifier: &str, name: &str) -> Self {
        Self {
            entity_type: String::from(DEVICE_ENTITY),
            entity_id: identifier.to_string(),
            attribute: String::from("created"),
            old_value: None,
            new_value: Some(name.to_string()),
        }
    }

    pub fn device_renamed(identifier: &str, old_name: &str, new_name: &str) -> Self {
        Self {
            entity_type: String::from(DEVICE_ENTITY),
            entity_id: identifier.to_string(),
            attribute: String::from("name"),
            old_value: Some(old_name.to_string()),
            new_value: Some(new_name.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub id: i64,
    pub entity_type: String,
    pub entity_id: String,
    pub attribute: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct InventoryCounts {
    pub locations: u64,
    pub devices: u64,
    pub ip_addresses: u64,
    pub services: u64,
    pub device_links: u64,
    pub service_links: u64,
    pub audit_entries: u64,
}

/// Write and lookup operations the reconciliation engine needs.
pub trait InventoryStore: Send {
    fn find_ip(&self, address: &str) -> Result<Option<IpRecord>, StoreError>;
    fn insert_ip(&mut self, address: &str) -> Result<Upserted<IpRecord>, StoreError>;

    fn find_device_by_identifier(&self, identifier: &str)
        -> Result<Option<DeviceRecord>, StoreError>;
    /// First device (lowest id) whose name contains `fragment`, ignoring case.
    fn find_device_by_name_fragment(&self, fragment: &str)
        -> Result<Option<DeviceRecord>, StoreError>;
    /// Every device whose name contains `fragment`, ignoring case, lowest id first.
    fn find_devices_by_name_fragment(&self, fragment: &str)
        -> Result<Vec<DeviceRecord>, StoreError>;
    /// First device (lowest id) linked to the IP record.
    fn find_device_by_ip(&self, ip_id: i64) -> Result<Option<DeviceRecord>, StoreError>;
    fn insert_device(&mut self, device: &NewDevice) -> Result<Upserted<DeviceRecord>, StoreError>;
    fn rename_device(&mut self, device_id: i64, name: &str) -> Result<(), StoreError>;
    /// Returns false when the link already existed.
    fn link_device_ip(&mut self, device_id: i64, ip_id: i64) -> Result<bool, StoreError>;

    fn find_service(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError>;
    fn insert_service(&mut self, name: &str) -> Result<Upserted<ServiceRecord>, StoreError>;
    /// Returns false when the `(service, ip, port)` edge already existed.
    fn link_service_ip(&mut self, service_id: i64, ip_id: i64, port: u16)
        -> Result<bool, StoreError>;

    fn find_location(&self, name: &str) -> Result<Option<LocationRecord>, StoreError>;
    fn get_or_create_location(&mut self, name: &str) -> Result<LocationRecord, StoreError>;
    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), StoreError>;

    fn begin_unit(&mut self) -> Result<(), StoreError>;
    fn commit_unit(&mut self) -> Result<(), StoreError>;
    fn rollback_unit(&mut self) -> Result<(), StoreError>;

    /// Runs `f` as one atomic unit: committed on `Ok`, rolled back on `Err`.
    fn within_unit<T, F>(&mut self, f: F) -> Result<T, StoreError>
    where
        Self: Sized,
        F: FnOnce(&mut Self) -> Result<T, StoreError>,
    {
        self.begin_unit()?;
        match f(self).and_then(|value| self.commit_unit().map(|()| value)) {
            Ok(value) => Ok(value),
            Err(e) => {
                if let Err(rollback) = self.rollback_unit() {
                    warn!("rollback failed after {e}: {rollback}");
                }
                Err(e)
            }
        }
    }
}
