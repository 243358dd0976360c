use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS locations (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            parent_id   INTEGER REFERENCES locations(id)
        );

        CREATE TABLE IF NOT EXISTS devices (
            id          INTEGER PRIMARY KEY,
            identifier  TEXT NOT NULL UNIQUE,
            name        TEXT NOT NULL,
            model       TEXT,
            location_id INTEGER NOT NULL REFERENCES locations(id),
            created_at  TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS ip_addresses (
            id          INTEGER PRIMARY KEY,
            address     TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS services (
            id          INTEGER PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS device_ip (
            device_id   INTEGER NOT NULL REFERENCES devices(id),
            ip_id       INTEGER NOT NULL REFERENCES ip_addresses(id),
            PRIMARY KEY (device_id, ip_id)
        );

        CREATE TABLE IF NOT EXISTS ip_service (
            ip_id       INTEGER NOT NULL REFERENCES ip_addresses(id),
            service_id  INTEGER NOT NULL REFERENCES services(id),
            port        INTEGER NOT NULL CHECK (port BETWEEN 0 AND 65535),
            PRIMARY KEY (ip_id, service_id, port)
        );

        CREATE TABLE IF NOT EXISTS audit_entries (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            entity_type TEXT NOT NULL,
            entity_id   TEXT NOT NULL,
            attribute   TEXT NOT NULL,
            old_value   TEXT,
            new_value   TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_device_ip_ip ON device_ip(ip_id);
        CREATE INDEX IF NOT EXISTS idx_audit_entity ON audit_entries(entity_type, entity_id);

        CREATE TRIGGER IF NOT EXISTS devices_identifier_immutable
        BEFORE UPDATE OF identifier ON devices
        WHEN NEW.identifier IS NOT OLD.identifier
        BEGIN
            SELECT RAISE(ABORT, 'device identifier is immutable');
        END;

        CREATE TRIGGER IF NOT EXISTS audit_entries_no_update
        BEFORE UPDATE ON audit_entries
        BEGIN
            SELECT RAISE(ABORT, 'audit entries are append-only');
        END;

        CREATE TRIGGER IF NOT EXISTS audit_entries_no_delete
        BEFORE DELETE ON audit_entries
        BEGIN
            SELECT RAISE(ABORT, 'audit entries are append-only');
        END;
        "#,
    )
}
