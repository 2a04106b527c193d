//! `SQLite` schema definitions for birdy.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema. Every statement is idempotent so it can run against a
//! database created by an older collector.

/// SQL statement to create the flights table (one row per collected state vector).
pub const CREATE_FLIGHTS_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS flights (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    icao24 TEXT NOT NULL,
    callsign TEXT,
    origin_country TEXT,
    time_position INTEGER,
    last_contact INTEGER,
    longitude REAL,
    latitude REAL,
    baro_altitude REAL,
    on_ground BOOLEAN,
    velocity REAL,
    true_track REAL,
    vertical_rate REAL,
    sensors TEXT,
    geo_altitude REAL,
    squawk TEXT,
    spi BOOLEAN,
    position_source INTEGER,
    category INTEGER,
    collection_time TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
";

/// SQL statement to create the aircraft registry table.
pub const CREATE_AIRCRAFT_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS aircraft_metadata (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    icao24 TEXT UNIQUE NOT NULL,
    registration TEXT,
    manufacturer_icao TEXT,
    manufacturer_name TEXT,
    model TEXT,
    typecode TEXT,
    serial_number TEXT,
    line_number TEXT,
    icao_aircraft_type TEXT,
    operator TEXT,
    operator_callsign TEXT,
    operator_icao TEXT,
    operator_iata TEXT,
    owner TEXT,
    category_description TEXT,
    built TEXT,
    first_flight_date TEXT,
    seat_configuration TEXT,
    engines TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
";

/// SQL statement to create an index on `icao24` for history lookups.
pub const CREATE_FLIGHTS_ICAO24_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_icao24 ON flights(icao24)
";

/// SQL statement to create an index on `collection_time`.
pub const CREATE_FLIGHTS_COLLECTION_TIME_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_collection_time ON flights(collection_time)
";

/// SQL statement to create an index on `callsign`.
pub const CREATE_FLIGHTS_CALLSIGN_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_flights_callsign ON flights(callsign)
";

/// SQL statement to create an index on metadata `icao24`.
pub const CREATE_AIRCRAFT_ICAO24_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_aircraft_icao24 ON aircraft_metadata(icao24)
";

/// SQL statement to create an index on `registration`.
pub const CREATE_AIRCRAFT_REGISTRATION_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_aircraft_registration ON aircraft_metadata(registration)
";

/// SQL statement to create a view joining snapshots with registry data.
pub const CREATE_FLIGHTS_WITH_METADATA_VIEW: &str = r"
CREATE VIEW IF NOT EXISTS flights_with_metadata AS
SELECT
    f.*,
    am.registration,
    am.manufacturer_name,
    am.model,
    am.operator,
    am.operator_callsign
FROM flights f
LEFT JOIN aircraft_metadata am ON f.icao24 = am.icao24
";

/// SQL statement to create the key-value table holding the schema version.
pub const CREATE_SCHEMA_META_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_FLIGHTS_TABLE,
    CREATE_AIRCRAFT_METADATA_TABLE,
    CREATE_FLIGHTS_ICAO24_INDEX,
    CREATE_FLIGHTS_COLLECTION_TIME_INDEX,
    CREATE_FLIGHTS_CALLSIGN_INDEX,
    CREATE_AIRCRAFT_ICAO24_INDEX,
    CREATE_AIRCRAFT_REGISTRATION_INDEX,
    CREATE_FLIGHTS_WITH_METADATA_VIEW,
    CREATE_SCHEMA_META_TABLE,
];
