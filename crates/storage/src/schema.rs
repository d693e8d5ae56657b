//! Schema definition and migration.

use quote_core::{Error, Result};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::store::sql_error;

/// Schema version recorded in `PRAGMA user_version`.
pub const SCHEMA_VERSION: i64 = 1;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    session_id   TEXT PRIMARY KEY,
    broker       TEXT NOT NULL,
    symbol       TEXT NOT NULL,
    archive_name TEXT NOT NULL,
    start_time   INTEGER NOT NULL,
    end_time     INTEGER NOT NULL,
    CHECK (start_time <= end_time)
);

CREATE INDEX IF NOT EXISTS idx_sessions_broker_symbol
    ON sessions (broker, symbol);

CREATE TABLE IF NOT EXISTS quotes (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL REFERENCES sessions (session_id),
    timestamp  INTEGER NOT NULL,
    bid        REAL NOT NULL,
    ask        REAL NOT NULL,
    UNIQUE (session_id, timestamp)
);

CREATE INDEX IF NOT EXISTS idx_quotes_timestamp
    ON quotes (timestamp);
"#;

/// Read the schema version stored in the database file.
pub fn schema_version(conn: &Connection) -> Result<i64> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(sql_error)
}

/// Create tables and indexes if missing. Safe to run repeatedly.
pub fn migrate(conn: &Connection) -> Result<()> {
    let version = schema_version(conn)?;
    if version > SCHEMA_VERSION {
        return Err(Error::storage_unavailable(format!(
            "database schema version {version} is newer than supported version {SCHEMA_VERSION}"
        )));
    }

    conn.execute_batch(SCHEMA).map_err(sql_error)?;
    conn.pragma_update(None, "user_version", SCHEMA_VERSION)
        .map_err(sql_error)?;

    if version < SCHEMA_VERSION {
        info!(from = version, to = SCHEMA_VERSION, "Schema migrated");
    }
    Ok(())
}

/// Drop both tables and recreate an empty schema.
pub fn reset(conn: &Connection) -> Result<()> {
    warn!("Dropping all sessions and quotes");
    conn.execute_batch(
        "DROP TABLE IF EXISTS quotes;
         DROP TABLE IF EXISTS sessions;
         PRAGMA user_version = 0;",
    )
    .map_err(sql_error)?;
    migrate(conn)
}
