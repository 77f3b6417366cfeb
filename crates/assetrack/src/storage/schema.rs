//! `SQLite` schema definitions for assetrack.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the users table.
pub const CREATE_USERS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    role TEXT NOT NULL,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL
)
";

/// SQL statement to create the sessions table.
///
/// Timestamps are unix seconds so expiry can be compared in SQL.
pub const CREATE_SESSIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS sessions (
    token TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL REFERENCES users(id),
    created_at INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    flashes TEXT NOT NULL DEFAULT '[]',
    pending_import TEXT
)
";

/// SQL statement to create the assets table.
pub const CREATE_ASSETS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS assets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_code TEXT NOT NULL UNIQUE,
    asset_name TEXT NOT NULL,
    serial_no TEXT,
    plant TEXT,
    department TEXT,
    location TEXT,
    purchase_date TEXT,
    status TEXT NOT NULL DEFAULT 'Active' CHECK (status IN ('Active', 'Scrapped')),
    scrapped_on TEXT,
    scrap_reason TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
)
";

/// Indexes backing the asset master filters.
pub const CREATE_ASSET_SERIAL_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_serial ON assets(serial_no)
";

/// Filter by plant.
pub const CREATE_ASSET_PLANT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_plant ON assets(plant)
";

/// Filter by department.
pub const CREATE_ASSET_DEPARTMENT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_department ON assets(department)
";

/// Filter by status.
pub const CREATE_ASSET_STATUS_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_assets_status ON assets(status)
";

/// SQL statement to create the maintenance contract table.
pub const CREATE_AMCS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS amcs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    vendor TEXT NOT NULL,
    contract_no TEXT,
    start_date TEXT NOT NULL,
    end_date TEXT NOT NULL,
    cost REAL,
    notes TEXT,
    created_at TEXT NOT NULL,
    CHECK (end_date >= start_date)
)
";

/// Contracts per asset, by start date.
pub const CREATE_AMC_ASSET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_amcs_asset ON amcs(asset_id, start_date)
";

/// SQL statement to create the calibration history table.
pub const CREATE_CALIBRATIONS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS calibrations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    calibrated_on TEXT NOT NULL,
    next_due_on TEXT NOT NULL,
    agency TEXT,
    certificate_no TEXT,
    result TEXT NOT NULL,
    remarks TEXT,
    created_at TEXT NOT NULL,
    CHECK (next_due_on > calibrated_on)
)
";

/// Calibration history per asset, newest first.
pub const CREATE_CALIBRATION_ASSET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_calibrations_asset ON calibrations(asset_id, calibrated_on DESC)
";

/// SQL statement to create the event log.
pub const CREATE_EVENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    kind TEXT NOT NULL,
    event_date TEXT NOT NULL,
    description TEXT NOT NULL,
    recorded_by TEXT,
    created_at TEXT NOT NULL
)
";

/// Event log per asset, newest first.
pub const CREATE_EVENT_ASSET_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_events_asset ON events(asset_id, event_date DESC)
";

/// Events are append-only.
pub const CREATE_EVENTS_NO_UPDATE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS events_no_update BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are immutable');
END
";

/// Events cannot be deleted.
pub const CREATE_EVENTS_NO_DELETE_TRIGGER: &str = r"
CREATE TRIGGER IF NOT EXISTS events_no_delete BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are immutable');
END
";

/// SQL statement to create the document table.
pub const CREATE_DOCUMENTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS documents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    asset_id INTEGER NOT NULL REFERENCES assets(id),
    kind TEXT NOT NULL,
    original_name TEXT NOT NULL,
    stored_name TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    content_hash TEXT NOT NULL,
    uploaded_by TEXT,
    uploaded_at TEXT NOT NULL,
    UNIQUE (asset_id, stored_name)
)
";

/// Duplicate content lookup per asset.
pub const CREATE_DOCUMENT_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_documents_hash ON documents(asset_id, content_hash)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_USERS_TABLE,
    CREATE_SESSIONS_TABLE,
    CREATE_ASSETS_TABLE,
    CREATE_ASSET_SERIAL_INDEX,
    CREATE_ASSET_PLANT_INDEX,
    CREATE_ASSET_DEPARTMENT_INDEX,
    CREATE_ASSET_STATUS_INDEX,
    CREATE_AMCS_TABLE,
    CREATE_AMC_ASSET_INDEX,
    CREATE_CALIBRATIONS_TABLE,
    CREATE_CALIBRATION_ASSET_INDEX,
    CREATE_EVENTS_TABLE,
    CREATE_EVENT_ASSET_INDEX,
    CREATE_EVENTS_NO_UPDATE_TRIGGER,
    CREATE_EVENTS_NO_DELETE_TRIGGER,
    CREATE_DOCUMENTS_TABLE,
    CREATE_DOCUMENT_HASH_INDEX,
    CREATE_METADATA_TABLE,
];
