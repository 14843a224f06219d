//! Growbox database storage
//!
//! This module provides the persistent store for one growing enclosure:
//! - Sensor readings (scalar telemetry)
//! - Image captures and their analysis results
//! - Retention sweeps over aging telemetry

mod capture;
mod models;
mod retention;
mod sensor;

pub use capture::CaptureStore;
pub use models::{
    AnalysisResult, AnalysisScores, CaptureAnalysis, ImageCapture, MeasurementValue,
    Measurements, RecordedCapture, SensorInput, SensorReading, TIMESTAMP_FORMAT,
};
pub use retention::{RetentionSweeper, DEFAULT_RETENTION_DAYS};
pub use sensor::SensorReadingStore;

use std::path::Path;

use tracing::warn;

use crate::database::core::{
    ConnectionProvider, SchemaManager, SchemaStatus, StoreResult, Table,
};

/// Main growbox database
///
/// `GrowboxDatabase` gives access to every store over one storage location.
/// It is cheap to clone and holds no open connection; each store operation
/// acquires its own.
#[derive(Debug, Clone)]
pub struct GrowboxDatabase {
    provider: ConnectionProvider,
}

impl GrowboxDatabase {
    /// Open the database at the specified path
    ///
    /// The parent directory and the schema are created when missing.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self {
            provider: ConnectionProvider::new(path)?,
        })
    }

    /// Open the database from a data directory
    ///
    /// Uses the standard database file path: `{data_dir}/growbox.sqlite3`
    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self {
            provider: ConnectionProvider::in_dir(data_dir)?,
        })
    }

    /// Wrap a provider configured by a hosting layer
    pub fn from_provider(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &ConnectionProvider {
        &self.provider
    }

    pub fn path(&self) -> &Path {
        self.provider.path()
    }

    /// Sensor reading store
    pub fn readings(&self) -> SensorReadingStore {
        SensorReadingStore::new(self.provider.clone())
    }

    /// Capture/analysis store
    pub fn captures(&self) -> CaptureStore {
        CaptureStore::new(self.provider.clone())
    }

    /// Retention sweeper
    pub fn retention(&self) -> RetentionSweeper {
        RetentionSweeper::new(self.provider.clone())
    }

    /// Current schema status
    pub fn schema_status(&self) -> StoreResult<SchemaStatus> {
        let db = self.provider.acquire()?;
        SchemaManager::new(&db.conn).check_status()
    }

    /// Recreate the schema, dropping every table when `drop_all` is set
    ///
    /// Only reachable through the confirmed administrative CLI command.
    pub fn reset_schema(&self, drop_all: bool) -> StoreResult<()> {
        if drop_all {
            warn!("Dropping all data in {}", self.provider.path().display());
        }
        let db = self.provider.acquire()?;
        SchemaManager::new(&db.conn).reset_schema(drop_all)
    }

    /// Row count of every growbox table
    pub fn table_counts(&self) -> StoreResult<Vec<(Table, u64)>> {
        let db = self.provider.acquire()?;
        Table::ALL
            .into_iter()
            .map(|table| db.table_count(table).map(|count| (table, count)))
            .collect()
    }

    /// Get metadata value from the database
    pub fn get_meta(&self, key: &str) -> StoreResult<Option<String>> {
        let db = self.provider.acquire()?;
        SchemaManager::new(&db.conn).get_meta(key)
    }

    /// Set metadata value in the database
    pub fn set_meta(&self, key: &str, value: &str) -> StoreResult<()> {
        let db = self.provider.acquire()?;
        SchemaManager::new(&db.conn).set_meta(key, value)
    }
}
