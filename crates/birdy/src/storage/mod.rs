//! Storage layer for birdy.
//!
//! This module provides `SQLite`-based storage for collected flight snapshots
//! and aircraft registry data, plus the read-only queries behind the HTTP
//! routes. The server never holds a connection: [`StoreHandle`] opens a fresh
//! read-only connection per call on the blocking thread pool.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::feed::opensky::StateVector;
use crate::model::{AircraftMetadata, FlightJourney, Position};

/// Gap between two snapshots that splits a journey, in seconds.
pub const JOURNEY_GAP_SECS: i64 = 30 * 60;

/// Maximum entries in each top-N list of [`AircraftStats`].
pub const TOP_LIST_LEN: usize = 10;

/// Days counted as "recent" for new registry entries.
pub const RECENT_DAYS: u32 = 7;

const METADATA_COLUMNS: &str = r"
    icao24, registration, manufacturer_icao, manufacturer_name, model,
    typecode, serial_number, line_number, icao_aircraft_type, operator,
    operator_callsign, operator_icao, operator_iata, owner, category_description,
    built, first_flight_date, seat_configuration, engines
";

/// One page of registry entries.
#[derive(Debug, Clone, PartialEq)]
pub struct AircraftPage {
    /// Entries on this page.
    pub aircraft: Vec<AircraftMetadata>,
    /// Entries matching the search across all pages.
    pub total: u64,
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameCount {
    /// The value.
    pub name: String,
    /// Rows carrying it.
    pub count: u64,
}

/// Registry summary for `/api/aircraft/stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AircraftStats {
    pub total_aircraft: u64,
    /// Entries created in the last [`RECENT_DAYS`] days.
    pub recent_additions: u64,
    pub top_manufacturers: Vec<NameCount>,
    pub top_operators: Vec<NameCount>,
    pub top_aircraft_types: Vec<NameCount>,
}

/// Database overview for `birdy db info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreInfo {
    pub path: PathBuf,
    pub schema_version: i32,
    pub flights: u64,
    pub aircraft_metadata: u64,
    pub latest_collection: Option<String>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}

/// Address frequency summary for `birdy db icao-stats`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Icao24Stats {
    pub most_common: Option<NameCount>,
    pub total_entries: u64,
    pub unique_icao24: u64,
}

/// A stored snapshot row as needed to build journeys.
#[derive(Debug, Clone, PartialEq)]
struct Observation {
    time: i64,
    callsign: Option<String>,
    origin_country: Option<String>,
    position: Option<Position>,
    altitude: Option<f64>,
}

/// Storage engine over one `SQLite` connection.
#[derive(Debug)]
pub struct Store {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Store {
    /// Open or create a database at the given path.
    ///
    /// Creates the parent directories and the file if they don't exist, then
    /// brings the schema up to date.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        migrations::initialize_schema(&conn)?;

        info!("Database opened at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Open an existing database without write access or migrations.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DatabaseOpen`] if the file is missing or unreadable.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, conn })
    }

    /// Create an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;
        migrations::initialize_schema(&conn)?;
        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// List registry entries, most recently updated first.
    ///
    /// `page` starts at 1. `search` matches icao24, registration, manufacturer,
    /// model, typecode and operator, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn list_aircraft(&self, page: u32, limit: u32, search: Option<&str>) -> Result<AircraftPage> {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let filter = r"
            WHERE ?1 IS NULL
               OR icao24 LIKE ?1 ESCAPE '\'
               OR registration LIKE ?1 ESCAPE '\'
               OR manufacturer_name LIKE ?1 ESCAPE '\'
               OR model LIKE ?1 ESCAPE '\'
               OR typecode LIKE ?1 ESCAPE '\'
               OR operator LIKE ?1 ESCAPE '\'
        ";

        let total: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM aircraft_metadata {filter}"),
            [&pattern],
            |row| row.get(0),
        )?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {METADATA_COLUMNS} FROM aircraft_metadata {filter}
             ORDER BY updated_at DESC, icao24 LIMIT ?2 OFFSET ?3"
        ))?;
        let aircraft = stmt
            .query_map(params![pattern, limit, offset], row_to_metadata)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(AircraftPage {
            aircraft,
            total: count(total),
        })
    }

    /// Summarize the registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn aircraft_stats(&self) -> Result<AircraftStats> {
        let total: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM aircraft_metadata", [], |row| row.get(0))?;
        let recent: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM aircraft_metadata WHERE created_at >= datetime('now', ?1)",
            [format!("-{RECENT_DAYS} days")],
            |row| row.get(0),
        )?;

        Ok(AircraftStats {
            total_aircraft: count(total),
            recent_additions: count(recent),
            top_manufacturers: self.top_values("manufacturer_name")?,
            top_operators: self.top_values("operator")?,
            top_aircraft_types: self.top_values("typecode")?,
        })
    }

    /// Most frequent non-blank values of one registry column.
    fn top_values(&self, column: &'static str) -> Result<Vec<NameCount>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {column}, COUNT(*) AS n FROM aircraft_metadata
             WHERE {column} IS NOT NULL AND trim({column}) != ''
             GROUP BY {column} ORDER BY n DESC, {column} LIMIT ?1"
        ))?;
        let rows = stmt
            .query_map([i64::try_from(TOP_LIST_LEN).unwrap_or(i64::MAX)], |row| {
                Ok(NameCount {
                    name: row.get(0)?,
                    count: count(row.get(1)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Journeys of one aircraft, newest departure first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn flight_history(&self, icao24: &str) -> Result<Vec<FlightJourney>> {
        let mut stmt = self.conn.prepare(
            r"
            SELECT collection_time, last_contact, callsign, origin_country,
                   latitude, longitude, baro_altitude
            FROM flights WHERE icao24 = ?1
            ORDER BY collection_time
            ",
        )?;
        let observations = stmt
            .query_map([icao24.to_ascii_lowercase()], |row| {
                let collected: String = row.get(0)?;
                let last_contact: Option<i64> = row.get(1)?;
                let Some(time) = parse_time(&collected).or(last_contact) else {
                    return Ok(None);
                };
                Ok(Some(Observation {
                    time,
                    callsign: row.get(2)?,
                    origin_country: row.get(3)?,
                    position: Position::from_parts(row.get(4)?, row.get(5)?),
                    altitude: row.get(6)?,
                }))
            })?
            .filter_map(std::result::Result::transpose)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        debug!(icao24, observations = observations.len(), "loaded flight history");
        Ok(group_journeys(icao24, observations))
    }

    /// Insert one collection run in a single transaction.
    ///
    /// Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns an error if any insert fails; nothing is written in that case.
    pub fn insert_snapshot(
        &mut self,
        vectors: &[StateVector],
        collection_time: DateTime<Utc>,
    ) -> Result<usize> {
        let collected = collection_time.to_rfc3339();
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                r"
                INSERT INTO flights (
                    icao24, callsign, origin_country, time_position, last_contact,
                    longitude, latitude, baro_altitude, on_ground, velocity,
                    true_track, vertical_rate, sensors, geo_altitude, squawk,
                    spi, position_source, category, collection_time
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)
                ",
            )?;
            for v in vectors {
                let s = &v.state;
                stmt.execute(params![
                    s.icao24,
                    s.callsign,
                    s.origin_country,
                    s.time_position,
                    s.last_contact,
                    s.longitude,
                    s.latitude,
                    s.baro_altitude,
                    s.on_ground,
                    s.velocity,
                    s.true_track,
                    s.vertical_rate,
                    v.sensors,
                    s.geo_altitude,
                    s.squawk,
                    v.spi,
                    v.position_source,
                    v.category,
                    collected,
                ])?;
            }
        }
        tx.commit()?;
        debug!(rows = vectors.len(), "snapshot stored");
        Ok(vectors.len())
    }

    /// Insert or update registry entries, keeping their creation time.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is written in that case.
    pub fn upsert_metadata(&mut self, entries: &[AircraftMetadata]) -> Result<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                r"
                INSERT INTO aircraft_metadata ({METADATA_COLUMNS}, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, CURRENT_TIMESTAMP)
                ON CONFLICT(icao24) DO UPDATE SET
                    registration = excluded.registration,
                    manufacturer_icao = excluded.manufacturer_icao,
                    manufacturer_name = excluded.manufacturer_name,
                    model = excluded.model,
                    typecode = excluded.typecode,
                    serial_number = excluded.serial_number,
                    line_number = excluded.line_number,
                    icao_aircraft_type = excluded.icao_aircraft_type,
                    operator = excluded.operator,
                    operator_callsign = excluded.operator_callsign,
                    operator_icao = excluded.operator_icao,
                    operator_iata = excluded.operator_iata,
                    owner = excluded.owner,
                    category_description = excluded.category_description,
                    built = excluded.built,
                    first_flight_date = excluded.first_flight_date,
                    seat_configuration = excluded.seat_configuration,
                    engines = excluded.engines,
                    updated_at = CURRENT_TIMESTAMP
                "
            ))?;
            for m in entries {
                stmt.execute(params![
                    m.icao24.to_ascii_lowercase(),
                    m.registration,
                    m.manufacturer_icao,
                    m.manufacturer_name,
                    m.model,
                    m.typecode,
                    m.serial_number,
                    m.line_number,
                    m.icao_aircraft_type,
                    m.operator,
                    m.operator_callsign,
                    m.operator_icao,
                    m.operator_iata,
                    m.owner,
                    m.category_description,
                    m.built,
                    m.first_flight_date,
                    m.seat_configuration,
                    m.engines,
                ])?;
            }
        }
        tx.commit()?;
        Ok(entries.len())
    }

    /// Distinct addresses seen in `flights` that have no registry entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn icao24_without_metadata(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let limit = limit.map_or(-1, |l| i64::try_from(l).unwrap_or(i64::MAX));
        let mut stmt = self.conn.prepare(
            r"
            SELECT DISTINCT f.icao24 FROM flights f
            LEFT JOIN aircraft_metadata am ON am.icao24 = f.icao24
            WHERE am.icao24 IS NULL
            ORDER BY f.icao24 LIMIT ?1
            ",
        )?;
        let rows = stmt
            .query_map([limit], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(rows)
    }

    /// Row counts and latest collection time.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn info(&self) -> Result<StoreInfo> {
        let flights: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM flights", [], |row| row.get(0))?;
        let metadata: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM aircraft_metadata", [], |row| row.get(0))?;
        let latest_collection: Option<String> = self
            .conn
            .query_row(
                "SELECT collection_time FROM flights ORDER BY collection_time DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let db_size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);

        Ok(StoreInfo {
            path: self.path.clone(),
            schema_version: migrations::schema_version(&self.conn)?,
            flights: count(flights),
            aircraft_metadata: count(metadata),
            latest_collection,
            db_size_bytes,
        })
    }

    /// Most frequently seen address plus totals.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub fn icao24_stats(&self) -> Result<Icao24Stats> {
        let most_common = self
            .conn
            .query_row(
                r"
                SELECT icao24, COUNT(*) AS n FROM flights
                GROUP BY icao24 ORDER BY n DESC, icao24 LIMIT 1
                ",
                [],
                |row| {
                    Ok(NameCount {
                        name: row.get(0)?,
                        count: count(row.get(1)?),
                    })
                },
            )
            .optional()?;
        let (total, unique): (i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT icao24) FROM flights",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(Icao24Stats {
            most_common,
            total_entries: count(total),
            unique_icao24: count(unique),
        })
    }
}

/// Cloneable handle the server uses to query the store off the async runtime.
#[derive(Debug, Clone)]
pub struct StoreHandle {
    path: Arc<PathBuf>,
}

impl StoreHandle {
    /// Create a handle for the database at `path`. Nothing is opened yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Arc::new(path.into()),
        }
    }

    /// Path of the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run `query` against a fresh read-only connection on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns the query's error, [`Error::DatabaseOpen`] if the database
    /// cannot be opened, or an internal error if the task panicked.
    pub async fn read<T, F>(&self, query: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Store) -> Result<T> + Send + 'static,
    {
        let path = Arc::clone(&self.path);
        tokio::task::spawn_blocking(move || {
            let store = Store::open_read_only(path.as_path())?;
            query(&store)
        })
        .await
        .map_err(|e| Error::internal(format!("store task failed: {e}")))?
    }
}

/// Convert a row from a `METADATA_COLUMNS` select into an [`AircraftMetadata`].
fn row_to_metadata(row: &rusqlite::Row<'_>) -> rusqlite::Result<AircraftMetadata> {
    Ok(AircraftMetadata {
        icao24: row.get(0)?,
        registration: row.get(1)?,
        manufacturer_icao: row.get(2)?,
        manufacturer_name: row.get(3)?,
        model: row.get(4)?,
        typecode: row.get(5)?,
        serial_number: row.get(6)?,
        line_number: row.get(7)?,
        icao_aircraft_type: row.get(8)?,
        operator: row.get(9)?,
        operator_callsign: row.get(10)?,
        operator_icao: row.get(11)?,
        operator_iata: row.get(12)?,
        owner: row.get(13)?,
        category_description: row.get(14)?,
        built: row.get(15)?,
        first_flight_date: row.get(16)?,
        seat_configuration: row.get(17)?,
        engines: row.get(18)?,
    })
}

fn count(n: i64) -> u64 {
    u64::try_from(n).unwrap_or(0)
}

fn like_pattern(search: &str) -> String {
    let escaped = search
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Parse a stored collection time (RFC 3339, or naive ISO 8601 taken as UTC).
fn parse_time(value: &str) -> Option<i64> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.timestamp());
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
        .map(|ts| ts.and_utc().timestamp())
}

fn trimmed(callsign: Option<&str>) -> Option<&str> {
    callsign.map(str::trim).filter(|c| !c.is_empty())
}

/// Split observations into journeys, newest departure first.
fn group_journeys(icao24: &str, mut observations: Vec<Observation>) -> Vec<FlightJourney> {
    // Text order of collection_time is not time order across mixed formats.
    observations.sort_by_key(|obs| obs.time);

    let mut journeys: Vec<FlightJourney> = Vec::new();
    let mut last_time = None;

    for obs in observations {
        let callsign = trimmed(obs.callsign.as_deref()).map(str::to_string);
        let continues = match (journeys.last(), last_time) {
            (Some(current), Some(prev)) => {
                current.callsign == callsign && obs.time - prev <= JOURNEY_GAP_SECS
            }
            _ => false,
        };
        last_time = Some(obs.time);

        match journeys.last_mut() {
            Some(current) if continues => {
                current.arrival_time = obs.time;
                current.arrival_position = obs.position;
                current.observations += 1;
                if current.origin_country.is_none() {
                    current.origin_country = obs.origin_country;
                }
                current.max_altitude = match (current.max_altitude, obs.altitude) {
                    (Some(a), Some(b)) => Some(a.max(b)),
                    (a, b) => a.or(b),
                };
            }
            _ => journeys.push(FlightJourney {
                icao24: icao24.to_ascii_lowercase(),
                callsign,
                origin_country: obs.origin_country,
                departure_time: obs.time,
                arrival_time: obs.time,
                departure_position: obs.position,
                arrival_position: obs.position,
                max_altitude: obs.altitude,
                observations: 1,
            }),
        }
    }

    journeys.sort_by(|a, b| b.departure_time.cmp(&a.departure_time));
    journeys
}
