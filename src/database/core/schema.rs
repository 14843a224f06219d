//! Database schema management
//!
//! This module owns the table and index definitions for the growbox database,
//! the closed set of table identifiers callers may name, and the destructive
//! reset used by the administrative CLI.

use std::fmt;
use std::str::FromStr;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::{StoreError, StoreResult};

/// Current schema version
/// Increment this when making breaking schema changes
pub const SCHEMA_VERSION: u32 = 2;

/// Schema definitions for all tables in the growbox database
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// SQL for creating the meta table (tracks schema version)
    pub const META_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS growbox_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );
    "#;

    /// Scalar environment telemetry
    pub const SENSOR_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS sensor_data (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            soil_moisture REAL,
            air_temperature REAL,
            air_humidity REAL,
            light_intensity REAL,
            water_level REAL
        );
    "#;

    /// One row per stored image
    pub const IMAGE_CAPTURE_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS image_capture (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            file_path TEXT NOT NULL UNIQUE CHECK (length(file_path) > 0)
        );
    "#;

    /// Classifier output, removed together with its capture
    pub const ANALYSIS_RESULT_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS ai_result (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            image_id INTEGER NOT NULL,
            ripeness_score REAL
                CHECK (ripeness_score IS NULL OR (ripeness_score >= 0.0 AND ripeness_score <= 1.0)),
            ripeness_text TEXT,
            flower_count INTEGER CHECK (flower_count IS NULL OR flower_count >= 0),
            flower_text TEXT,
            created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f', 'now')),
            FOREIGN KEY (image_id) REFERENCES image_capture(id) ON DELETE CASCADE
        );
    "#;

    /// Recency and cutoff queries walk these indexes instead of scanning
    pub const INDEXES: &'static [&'static str] = &[
        "CREATE INDEX IF NOT EXISTS idx_sensor_timestamp ON sensor_data (timestamp DESC, id DESC)",
        "CREATE INDEX IF NOT EXISTS idx_image_timestamp ON image_capture (timestamp DESC, id DESC)",
        "CREATE INDEX IF NOT EXISTS idx_ai_image_id ON ai_result (image_id)",
        // v2
        "CREATE INDEX IF NOT EXISTS idx_ai_created_at ON ai_result (created_at DESC, id DESC)",
    ];
}

/// Tables that callers may refer to by name
///
/// Identifiers cannot be bound as query parameters, so any SQL that needs a
/// table name takes one of these variants and interpolates only the constant
/// strings below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    SensorData,
    ImageCapture,
    AnalysisResult,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::SensorData, Table::ImageCapture, Table::AnalysisResult];

    /// SQL table name
    pub fn name(&self) -> &'static str {
        match self {
            Table::SensorData => "sensor_data",
            Table::ImageCapture => "image_capture",
            Table::AnalysisResult => "ai_result",
        }
    }

    /// Column holding the row's creation time
    pub fn timestamp_column(&self) -> &'static str {
        match self {
            Table::SensorData | Table::ImageCapture => "timestamp",
            Table::AnalysisResult => "created_at",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Table {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Table::ALL
            .into_iter()
            .find(|t| t.name() == s.trim())
            .ok_or_else(|| StoreError::unknown_table(s))
    }
}

/// Schema manager for the growbox database
///
/// Handles schema initialization, version checking and reset.
pub struct SchemaManager<'a> {
    conn: &'a Connection,
}

impl<'a> SchemaManager<'a> {
    /// Create a new schema manager for the given connection
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Create all tables and indexes that are missing
    ///
    /// Safe to call on every start; existing objects are left untouched.
    pub fn ensure_schema(&self) -> StoreResult<()> {
        let statements = [
            ("growbox_meta", SchemaDefinitions::META_TABLE),
            ("sensor_data", SchemaDefinitions::SENSOR_TABLE),
            ("image_capture", SchemaDefinitions::IMAGE_CAPTURE_TABLE),
            ("ai_result", SchemaDefinitions::ANALYSIS_RESULT_TABLE),
        ];
        for (name, sql) in statements {
            self.conn
                .execute(sql, [])
                .map_err(|e| StoreError::from_sqlite(e, &format!("Failed to create {name} table")))?;
        }

        for index_sql in SchemaDefinitions::INDEXES {
            self.conn
                .execute(index_sql, [])
                .map_err(|e| StoreError::from_sqlite(e, "Failed to create index"))?;
        }

        self.set_meta("schema_version", &SCHEMA_VERSION.to_string())?;
        Ok(())
    }

    /// Bring a database to a usable state on first connection
    ///
    /// Creates missing objects for fresh, older or partially-created databases.
    /// A database written by a newer version is refused rather than reset,
    /// because dropping data is only done through [`SchemaManager::reset_schema`].
    pub fn bootstrap(&self) -> StoreResult<SchemaStatus> {
        let status = self.check_status()?;
        match &status {
            SchemaStatus::Current => {}
            SchemaStatus::NotInitialized => {
                info!("Initializing growbox database schema");
                self.ensure_schema()?;
            }
            SchemaStatus::NeedsMigration { from, to } => {
                info!("Upgrading growbox database schema from v{} to v{}", from, to);
                self.ensure_schema()?;
            }
            SchemaStatus::Corrupted => {
                warn!("Growbox database is missing tables, recreating them");
                self.ensure_schema()?;
            }
            SchemaStatus::Incompatible {
                database_version,
                required_version,
            } => {
                return Err(StoreError::storage_unavailable(format!(
                    "Database schema v{} is newer than supported v{}",
                    database_version, required_version
                )));
            }
        }
        Ok(status)
    }

    /// Check the current schema status
    pub fn check_status(&self) -> StoreResult<SchemaStatus> {
        if !self.table_exists("growbox_meta")? {
            return Ok(SchemaStatus::NotInitialized);
        }

        let current_version = self.get_schema_version()?;

        if current_version == SCHEMA_VERSION {
            if self.verify_integrity()? {
                Ok(SchemaStatus::Current)
            } else {
                Ok(SchemaStatus::Corrupted)
            }
        } else if current_version < SCHEMA_VERSION {
            Ok(SchemaStatus::NeedsMigration {
                from: current_version,
                to: SCHEMA_VERSION,
            })
        } else {
            Ok(SchemaStatus::Incompatible {
                database_version: current_version,
                required_version: SCHEMA_VERSION,
            })
        }
    }

    /// Get the current schema version from the database
    fn get_schema_version(&self) -> StoreResult<u32> {
        let version = self.get_meta("schema_version")?.unwrap_or_else(|| "0".to_string());
        version.parse().map_err(|e| {
            StoreError::storage_unavailable(format!("Invalid schema version '{}': {}", version, e))
        })
    }

    /// Verify schema integrity by checking required tables exist
    fn verify_integrity(&self) -> StoreResult<bool> {
        for table in Table::ALL {
            if !self.table_exists(table.name())? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn table_exists(&self, name: &str) -> StoreResult<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [name],
                |row| row.get(0),
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to check table existence"))?;
        Ok(count > 0)
    }

    /// Names of every user table (SQLite's own `sqlite_*` tables excluded)
    pub fn user_tables(&self) -> StoreResult<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .map_err(|e| StoreError::from_sqlite(e, "Failed to list tables"))?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::from_sqlite(e, "Failed to list tables"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read table name"))?;
        Ok(names)
    }

    /// Set a metadata value
    pub fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        self.conn
            .execute(
                "INSERT OR REPLACE INTO growbox_meta (key, value, updated_at) VALUES (?1, ?2, strftime('%s', 'now'))",
                [key, value],
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to set meta value"))?;
        Ok(())
    }

    /// Get a metadata value
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let result: Result<String, _> = self.conn.query_row(
            "SELECT value FROM growbox_meta WHERE key = ?1",
            [key],
            |row| row.get(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(StoreError::from_sqlite(e, "Failed to get meta value")),
        }
    }

    /// Reset the schema
    ///
    /// With `drop_all` every user table is dropped, the file is vacuumed and
    /// the schema is created from scratch. Without it this is `ensure_schema`.
    /// Only the administrative CLI calls this with `drop_all = true`.
    pub fn reset_schema(&self, drop_all: bool) -> StoreResult<()> {
        if drop_all {
            let tables = self.user_tables()?;

            // dropping a parent table must not trip the child's foreign key
            self.conn
                .execute("PRAGMA foreign_keys=OFF", [])
                .map_err(|e| StoreError::from_sqlite(e, "Failed to disable foreign keys"))?;

            let dropped = tables.iter().try_for_each(|table| {
                warn!("Dropping table {}", table);
                let sql = format!("DROP TABLE IF EXISTS \"{}\"", table.replace('"', "\"\""));
                self.conn
                    .execute(&sql, [])
                    .map(|_| ())
                    .map_err(|e| StoreError::from_sqlite(e, &format!("Failed to drop {table}")))
            });

            self.conn
                .execute("PRAGMA foreign_keys=ON", [])
                .map_err(|e| StoreError::from_sqlite(e, "Failed to enable foreign keys"))?;
            dropped?;

            self.conn
                .execute_batch("VACUUM")
                .map_err(|e| StoreError::from_sqlite(e, "Failed to vacuum database"))?;
            info!("Dropped {} tables, recreating schema", tables.len());
        }

        self.ensure_schema()
    }
}

/// Status of the database schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SchemaStatus {
    /// Database is not initialized (fresh database)
    NotInitialized,

    /// Schema is current and valid
    Current,

    /// Schema is from an older version
    NeedsMigration { from: u32, to: u32 },

    /// Database is from a newer version (incompatible)
    Incompatible {
        database_version: u32,
        required_version: u32,
    },

    /// Schema is missing tables
    Corrupted,
}
