//! Database connection management
//!
//! `DatabaseConn` wraps one configured SQLite connection. `ConnectionProvider`
//! owns the resolved storage location and opens a fresh `DatabaseConn` for
//! every unit of work, so concurrent callers never share a connection.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags, Transaction, TransactionBehavior};
use tracing::{debug, info};

use super::error::{StoreError, StoreResult};
use super::schema::{SchemaManager, Table};

/// File name used when only a data directory is configured
pub const DEFAULT_DATABASE_FILE: &str = "growbox.sqlite3";

/// How long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Core database connection wrapper
///
/// Every connection has WAL journaling and foreign-key enforcement enabled;
/// opening fails if enforcement cannot be confirmed.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path
    pub fn open(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            StoreError::storage_unavailable(format!(
                "Failed to open database at '{}': {}",
                path.display(),
                e
            ))
        })?;

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open an existing database for inspection only
    ///
    /// No pragmas are written and the schema is not touched.
    pub fn open_read_only(path: &Path) -> StoreResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            StoreError::storage_unavailable(format!(
                "Failed to open database at '{}': {}",
                path.display(),
                e
            ))
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to set busy timeout"))?;
        Ok(DatabaseConn { conn })
    }

    /// Configure the connection
    fn configure(&self) -> StoreResult<()> {
        self.conn
            .busy_timeout(BUSY_TIMEOUT)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to set busy timeout"))?;

        // WAL lets readers proceed while a sweep or ingestion is writing
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| StoreError::from_sqlite(e, "Failed to set journal mode"))?;

        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| StoreError::from_sqlite(e, "Failed to set synchronous mode"))?;

        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| StoreError::from_sqlite(e, "Failed to enable foreign keys"))?;

        let enforced: i64 = self
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read foreign key setting"))?;
        if enforced != 1 {
            return Err(StoreError::storage_unavailable(
                "SQLite build does not enforce foreign keys",
            ));
        }

        Ok(())
    }

    /// Begin a write transaction
    ///
    /// The write lock is taken up front so two concurrent units of work
    /// cannot both read and then fail to upgrade.
    pub fn transaction(&mut self) -> StoreResult<Transaction<'_>> {
        self.conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to begin transaction"))
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> StoreResult<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to check table existence"))?;
        Ok(count > 0)
    }

    /// Get the row count for a table
    pub fn table_count(&self, table: Table) -> StoreResult<u64> {
        let query = format!("SELECT COUNT(*) FROM {}", table.name());
        let count: u64 = self
            .conn
            .query_row(&query, [], |row| row.get(0))
            .map_err(|e| StoreError::from_sqlite(e, "Failed to get table count"))?;
        Ok(count)
    }
}

/// Hands out one connection per unit of work
///
/// Cloning is cheap; clones share the resolved location. The schema is
/// bootstrapped once when the provider is created.
#[derive(Debug, Clone)]
pub struct ConnectionProvider {
    path: Arc<PathBuf>,
}

impl ConnectionProvider {
    /// Configure the storage location
    ///
    /// Relative locations are resolved against the current directory, the
    /// parent directory is created, and the schema is created on first run.
    pub fn new(location: impl AsRef<Path>) -> StoreResult<Self> {
        let path = resolve_location(location.as_ref())?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::storage_unavailable(format!(
                    "Failed to create database directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let provider = Self {
            path: Arc::new(path),
        };

        let db = provider.acquire()?;
        let status = SchemaManager::new(&db.conn).bootstrap()?;
        info!(
            "Growbox database ready at {} ({:?})",
            provider.path.display(),
            status
        );

        Ok(provider)
    }

    /// Configure a provider for `{data_dir}/growbox.sqlite3`
    pub fn in_dir(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        Self::new(data_dir.as_ref().join(DEFAULT_DATABASE_FILE))
    }

    /// Absolute path of the database file
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Open a connection for one unit of work
    ///
    /// The connection is closed when the returned value is dropped.
    pub fn acquire(&self) -> StoreResult<DatabaseConn> {
        debug!("Opening connection to {}", self.path.display());
        DatabaseConn::open(&self.path)
    }
}

fn resolve_location(location: &Path) -> StoreResult<PathBuf> {
    if location.as_os_str().is_empty() {
        return Err(StoreError::invalid_argument(
            "Database location must not be empty",
        ));
    }
    if location.is_absolute() {
        return Ok(location.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(location))
        .map_err(|e| {
            StoreError::storage_unavailable(format!("Failed to resolve current directory: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::StoreErrorKind;
    use tempfile::TempDir;

    #[test]
    fn test_provider_creates_parent_and_schema() {
        let dir = TempDir::new().unwrap();
        let location = dir.path().join("nested").join("deeper").join("db.sqlite3");

        let provider = ConnectionProvider::new(&location).unwrap();
        assert!(location.exists());
        assert_eq!(provider.path(), location.as_path());

        let db = provider.acquire().unwrap();
        for table in Table::ALL {
            assert!(db.table_exists(table.name()).unwrap());
        }
    }

    #[test]
    fn test_foreign_keys_enforced_on_every_connection() {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::in_dir(dir.path()).unwrap();

        for _ in 0..3 {
            let db = provider.acquire().unwrap();
            let enabled: i64 = db
                .conn
                .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
                .unwrap();
            assert_eq!(enabled, 1);
        }
    }

    #[test]
    fn test_table_count() {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::in_dir(dir.path()).unwrap();
        let db = provider.acquire().unwrap();
        db.conn
            .execute_batch(
                "INSERT INTO sensor_data (soil_moisture) VALUES (1.0);
                 INSERT INTO sensor_data (soil_moisture) VALUES (2.0);",
            )
            .unwrap();

        assert_eq!(db.table_count(Table::SensorData).unwrap(), 2);
        assert_eq!(db.table_count(Table::ImageCapture).unwrap(), 0);
    }

    #[test]
    fn test_unwritable_location_is_storage_unavailable() {
        let dir = TempDir::new().unwrap();
        // a regular file where a directory is expected
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let err = ConnectionProvider::new(blocker.join("growbox.sqlite3")).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::StorageUnavailable);
    }

    #[test]
    fn test_empty_location_rejected() {
        let err = ConnectionProvider::new("").unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidArgument);
    }

    #[test]
    fn test_relative_location_resolved_to_absolute() {
        let resolved = resolve_location(Path::new("data/growbox.sqlite3")).unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("data/growbox.sqlite3"));
    }
}
