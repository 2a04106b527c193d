//! Schema versioning for the birdy database.
//!
//! The version lives in the `schema_meta` table. Databases written by the
//! older collector scripts have the tables but no version row; they are
//! adopted as version 0 and migrated forward.

use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The current schema version.
pub const CURRENT_VERSION: i32 = 1;

/// Key of the schema version row.
const VERSION_KEY: &str = "schema_version";

type Migration = fn(&Connection) -> Result<()>;

/// Forward migrations, indexed by the version they produce.
const MIGRATIONS: &[(i32, Migration)] = &[(1, migrate_v1)];

/// Create missing tables, indexes and views, then migrate to [`CURRENT_VERSION`].
///
/// # Errors
///
/// Returns an error if schema creation or a migration fails, or if the
/// database was written by a newer birdy.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }

    for (target, migrate) in MIGRATIONS.iter().filter(|(v, _)| *v > version) {
        info!("Migrating database schema to version {target}");
        migrate(conn)?;
        set_schema_version(conn, *target)?;
    }

    Ok(())
}

/// Read the stored schema version; 0 when none is recorded.
///
/// # Errors
///
/// Returns an error if the version row cannot be read or is not a number.
pub fn schema_version(conn: &Connection) -> Result<i32> {
    let value: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        Some(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        None => Ok(0),
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Version 1: normalize addresses written by older collectors to lowercase.
fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute("UPDATE flights SET icao24 = lower(icao24)", [])?;
    Ok(())
}
