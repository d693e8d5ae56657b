//! Store descriptor and handle acquisition.
//!
//! A [`Database`] is cheap to clone and holds no connection. Each unit of
//! work calls [`Database::acquire`] and drops the returned [`QuoteStore`]
//! when done, success or failure.

use std::path::{Path, PathBuf};
use std::time::Duration;

use quote_core::config::StorageConfig;
use quote_core::{Error, Result};
use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use crate::schema::{self, SCHEMA_VERSION};
use crate::store::{sql_error, QuoteStore};

/// Descriptor of an on-disk quote store.
#[derive(Debug, Clone)]
pub struct Database {
    config: StorageConfig,
}

impl Database {
    /// Create a descriptor. Does not touch the filesystem.
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    /// Path of the database file.
    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    /// Create the database file if needed and bring the schema up to date.
    ///
    /// Run once at process start, before any handle is acquired.
    pub fn migrate(&self) -> Result<()> {
        let path = &self.config.db_path;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = self.connect(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)?;
        schema::migrate(&conn)?;
        info!(path = %path.display(), "Quote store ready");
        Ok(())
    }

    /// Open a handle for one unit of work.
    ///
    /// Fails with `StorageUnavailable` if the file is missing or was never migrated.
    pub fn acquire(&self) -> Result<QuoteStore> {
        let conn = self.connect(OpenFlags::SQLITE_OPEN_READ_WRITE)?;
        let version = schema::schema_version(&conn)?;
        if version != SCHEMA_VERSION {
            return Err(Error::storage_unavailable(format!(
                "{} has schema version {version}, expected {SCHEMA_VERSION}; run migrate first",
                self.config.db_path.display()
            )));
        }
        debug!(path = %self.config.db_path.display(), "Store handle acquired");
        Ok(QuoteStore::from_connection(conn))
    }

    /// Drop all data and recreate an empty schema.
    pub fn reset(&self) -> Result<()> {
        let conn = self.connect(OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE)?;
        schema::reset(&conn)
    }

    fn connect(&self, flags: OpenFlags) -> Result<Connection> {
        let path: &PathBuf = &self.config.db_path;
        let conn = Connection::open_with_flags(path, flags | OpenFlags::SQLITE_OPEN_NO_MUTEX)
            .map_err(|e| {
                Error::storage_unavailable(format!("cannot open {}: {e}", path.display()))
            })?;

        conn.busy_timeout(Duration::from_millis(self.config.busy_timeout_ms))
            .map_err(sql_error)?;
        conn.pragma_update_and_check(
            None,
            "journal_mode",
            self.config.journal_mode.pragma_value(),
            |row| row.get::<_, String>(0),
        )
        .map_err(sql_error)?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(sql_error)?;

        Ok(conn)
    }
}
