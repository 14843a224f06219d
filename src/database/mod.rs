//! Database module
//!
//! This module provides all storage functionality for growbox, organized into:
//!
//! - **core**: Core database infrastructure (connection provider, schema management, errors)
//! - **growbox**: The enclosure's persistent stores (readings, captures, retention)
//!
//! # Architecture
//!
//! ```text
//! database/
//! ├── core/            # Foundation
//! │   ├── connection   # ConnectionProvider and the DatabaseConn wrapper
//! │   ├── schema       # Table definitions, allow-list, reset
//! │   └── error        # StoreError / StoreErrorKind
//! │
//! └── growbox/         # Persistent storage
//!     ├── sensor       # Sensor readings
//!     ├── capture      # Image captures and analysis results
//!     └── retention    # Retention sweeper
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use growbox::database::{GrowboxDatabase, Measurements, Table};
//!
//! let db = GrowboxDatabase::open_in_dir("/var/lib/growbox")?;
//!
//! let id = db.readings().append(&Measurements {
//!     soil_moisture: Some(41.0),
//!     ..Default::default()
//! }.into())?;
//!
//! let latest = db.readings().latest()?;
//! let deleted = db.retention().sweep(Table::SensorData, 30)?;
//! ```

pub mod core;
pub mod growbox;

// =============================================================================
// Core types
// =============================================================================

pub use core::{
    ConnectionProvider, DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, StoreError,
    StoreErrorKind, StoreResult, Table, DEFAULT_DATABASE_FILE, SCHEMA_VERSION,
};

// =============================================================================
// Growbox stores
// =============================================================================

pub use growbox::GrowboxDatabase;

pub use growbox::{
    AnalysisResult, AnalysisScores, CaptureAnalysis, CaptureStore, ImageCapture,
    MeasurementValue, Measurements, RecordedCapture, RetentionSweeper, SensorInput,
    SensorReading, SensorReadingStore, DEFAULT_RETENTION_DAYS, TIMESTAMP_FORMAT,
};
