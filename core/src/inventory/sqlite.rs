//! SQLite adapter for [`InventoryStore`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};

use super::schema;
use super::{
    AuditEntry, DeviceRecord, InventoryCounts, InventoryStore, IpRecord, LocationRecord, NewAuditEntry,
    NewDevice, ServiceRecord, StoreError, Upserted,
};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const DEVICE_COLUMNS: &str = "d.id, d.identifier, d.name, d.model, d.location_id";

pub struct SqliteInventory {
    conn: Connection,
    path: PathBuf,
}

impl SqliteInventory {
    /// Opens (creating if needed) the database file and its schema.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open inventory database {}", path.display()))?;
        Self::initialize(conn, path.to_path_buf())
    }

    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::initialize(conn, PathBuf::from(":memory:"))
    }

    fn initialize(conn: Connection, path: PathBuf) -> anyhow::Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to configure busy timeout")?;
        schema::create_tables(&conn).context("Failed to create inventory schema")?;
        Ok(Self { conn, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn counts(&self) -> Result<InventoryCounts, StoreError> {
        let count = |table: &str| -> Result<u64, StoreError> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as u64)
        };
        Ok(InventoryCounts {
            locations: count("locations")?,
            devices: count("devices")?,
            ip_addresses: count("ip_addresses")?,
            services: count("services")?,
            device_links: count("device_ip")?,
            service_links: count("ip_service")?,
            audit_entries: count("audit_entries")?,
        })
    }

    pub fn devices(&self) -> Result<Vec<DeviceRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {DEVICE_COLUMNS} FROM devices d ORDER BY d.id"))?;
        let devices = stmt
            .query_map([], device_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    pub fn location(&self, id: i64) -> Result<Option<LocationRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, parent_id FROM locations WHERE id = ?1",
                params![id],
                location_from_row,
            )
            .optional()?)
    }

    /// Addresses linked to a device, in address-string order.
    pub fn addresses_for_device(&self, device_id: i64) -> Result<Vec<String>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT ip.address
            FROM ip_addresses ip
            JOIN device_ip l ON l.ip_id = ip.id
            WHERE l.device_id = ?1
            ORDER BY ip.address
            "#,
        )?;
        let addresses = stmt
            .query_map(params![device_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(addresses)
    }

    /// `(service name, port)` edges of an address, ordered by port.
    pub fn services_for_address(&self, address: &str) -> Result<Vec<(String, u16)>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT s.name, l.port
            FROM services s
            JOIN ip_service l ON l.service_id = s.id
            JOIN ip_addresses ip ON ip.id = l.ip_id
            WHERE ip.address = ?1
            ORDER BY l.port, s.name
            "#,
        )?;
        let services = stmt
            .query_map(params![address], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<(String, u16)>>>()?;
        Ok(services)
    }

    pub fn audit_entries(&self) -> Result<Vec<AuditEntry>, StoreError> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, entity_type, entity_id, attribute, old_value, new_value, recorded_at
            FROM audit_entries
            ORDER BY id
            "#,
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    entity_type: row.get(1)?,
                    entity_id: row.get(2)?,
                    attribute: row.get(3)?,
                    old_value: row.get(4)?,
                    new_value: row.get(5)?,
                    recorded_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }

    fn device_where(&self, clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<DeviceRecord>, StoreError> {
        let sql = format!("SELECT {DEVICE_COLUMNS} FROM devices d {clause} ORDER BY d.id LIMIT 1");
        Ok(self
            .conn
            .query_row(&sql, [param], device_from_row)
            .optional()?)
    }
}

impl InventoryStore for SqliteInventory {
    fn find_ip(&self, address: &str) -> Result<Option<IpRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, address FROM ip_addresses WHERE address = ?1",
                params![address],
                |row| {
                    Ok(IpRecord {
                        id: row.get(0)?,
                        address: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn insert_ip(&mut self, address: &str) -> Result<Upserted<IpRecord>, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO ip_addresses (address) VALUES (?1) ON CONFLICT(address) DO NOTHING",
            params![address],
        )? > 0;
        let record = self
            .find_ip(address)?
            .ok_or_else(|| StoreError::rejected(format!("ip {address} vanished after insert")))?;
        Ok(upserted(inserted, record))
    }

    fn find_device_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        self.device_where("WHERE d.identifier = ?1", &identifier)
    }

    fn find_device_by_name_fragment(
        &self,
        fragment: &str,
    ) -> Result<Option<DeviceRecord>, StoreError> {
        if fragment.trim().is_empty() {
            return Ok(None);
        }
        self.device_where("WHERE instr(lower(d.name), lower(?1)) > 0", &fragment)
    }

    fn find_devices_by_name_fragment(
        &self,
        fragment: &str,
    ) -> Result<Vec<DeviceRecord>, StoreError> {
        if fragment.trim().is_empty() {
            return Ok(Vec::new());
        }
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {DEVICE_COLUMNS} FROM devices d \
             WHERE instr(lower(d.name), lower(?1)) > 0 ORDER BY d.id"
        ))?;
        let devices = stmt
            .query_map(params![fragment], device_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(devices)
    }

    fn find_device_by_ip(&self, ip_id: i64) -> Result<Option<DeviceRecord>, StoreError> {
        self.device_where(
            "JOIN device_ip l ON l.device_id = d.id WHERE l.ip_id = ?1",
            &ip_id,
        )
    }

    fn insert_device(&mut self, device: &NewDevice) -> Result<Upserted<DeviceRecord>, StoreError> {
        let inserted = self.conn.execute(
            r#"
            INSERT INTO devices (identifier, name, model, location_id)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(identifier) DO NOTHING
            "#,
            params![device.identifier, device.name, device.model, device.location_id],
        )? > 0;
        let record = self
            .find_device_by_identifier(&device.identifier)?
            .ok_or_else(|| {
                StoreError::rejected(format!("device {} vanished after insert", device.identifier))
            })?;
        Ok(upserted(inserted, record))
    }

    fn rename_device(&mut self, device_id: i64, name: &str) -> Result<(), StoreError> {
        let changed = self.conn.execute(
            "UPDATE devices SET name = ?2 WHERE id = ?1",
            params![device_id, name],
        )?;
        if changed == 0 {
            return Err(StoreError::rejected(format!("no device with id {device_id}")));
        }
        Ok(())
    }

    fn link_device_ip(&mut self, device_id: i64, ip_id: i64) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO device_ip (device_id, ip_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![device_id, ip_id],
        )?;
        Ok(inserted > 0)
    }

    fn find_service(&self, name: &str) -> Result<Option<ServiceRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name FROM services WHERE name = ?1",
                params![name],
                |row| {
                    Ok(ServiceRecord {
                        id: row.get(0)?,
                        name: row.get(1)?,
                    })
                },
            )
            .optional()?)
    }

    fn insert_service(&mut self, name: &str) -> Result<Upserted<ServiceRecord>, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO services (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )? > 0;
        let record = self
            .find_service(name)?
            .ok_or_else(|| StoreError::rejected(format!("service {name} vanished after insert")))?;
        Ok(upserted(inserted, record))
    }

    fn link_service_ip(&mut self, service_id: i64, ip_id: i64, port: u16) -> Result<bool, StoreError> {
        let inserted = self.conn.execute(
            "INSERT INTO ip_service (ip_id, service_id, port) VALUES (?1, ?2, ?3) ON CONFLICT DO NOTHING",
            params![ip_id, service_id, port],
        )?;
        Ok(inserted > 0)
    }

    fn find_location(&self, name: &str) -> Result<Option<LocationRecord>, StoreError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id, name, parent_id FROM locations WHERE name = ?1",
                params![name],
                location_from_row,
            )
            .optional()?)
    }

    fn get_or_create_location(&mut self, name: &str) -> Result<LocationRecord, StoreError> {
        self.conn.execute(
            "INSERT INTO locations (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![name],
        )?;
        self.find_location(name)?
            .ok_or_else(|| StoreError::rejected(format!("location {name} vanished after insert")))
    }

    fn append_audit(&mut self, entry: &NewAuditEntry) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO audit_entries (
                entity_type, entity_id, attribute, old_value, new_value, recorded_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                entry.entity_type,
                entry.entity_id,
                entry.attribute,
                entry.old_value,
                entry.new_value,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    /// Takes the write lock up front, so a concurrent writer makes this
    /// wait out the busy timeout instead of failing on a lock upgrade.
    /// Units do not nest.
    fn begin_unit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(())
    }

    fn commit_unit(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch("COMMIT")?;
        Ok(())
    }

    fn rollback_unit(&mut self) -> Result<(), StoreError> {
        if !self.conn.is_autocommit() {
            self.conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }
}

fn upserted<T>(inserted: bool, record: T) -> Upserted<T> {
    if inserted {
        Upserted::Inserted(record)
    } else {
        Upserted::Existing(record)
    }
}

fn location_from_row(row: &Row<'_>) -> rusqlite::Result<LocationRecord> {
    Ok(LocationRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        parent_id: row.get(2)?,
    })
}

fn device_from_row(row: &Row<'_>) -> rusqlite::Result<DeviceRecord> {
    Ok(DeviceRecord {
        id: row.get(0)?,
        identifier: row.get(1)?,
        name: row.get(2)?,
        model: row.get(3)?,
        location_id: row.get(4)?,
    })
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        let fatal = match &e {
            rusqlite::Error::SqliteFailure(err, _) => matches!(
                err.code,
                ErrorCode::CannotOpen
                    | ErrorCode::NotADatabase
                    | ErrorCode::DatabaseCorrupt
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::ReadOnly
                    | ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::OutOfMemory
                    | ErrorCode::PermissionDenied
                    | ErrorCode::FileLockingProtocolFailed
            ),
            rusqlite::Error::InvalidPath(_) | rusqlite::Error::SqliteSingleThreadedMode => true,
            _ => false,
        };
        if fatal {
            StoreError::Unavailable(Box::new(e))
        } else {
            StoreError::Rejected(Box::new(e))
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
