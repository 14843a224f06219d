#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! Growbox - telemetry collector for a small automated growing enclosure
//!
//! Growbox accepts periodic environmental sensor readings and captured images,
//! records classifier results for each image, and keeps everything in a local
//! SQLite database. Aging telemetry is pruned and new images are requested by
//! background maintenance timers. It can be used as both a command-line
//! application and a library embedded in an HTTP layer.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `capture-http` | Pull frames from an HTTP capture device | `ureq` |
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | The `growbox` binary | All above + `clap`, `tracing-subscriber` |
//!
//! # Architecture
//!
//! - **[`database`]**: storage (always available)
//!   - `core`: connection provider, schema management, structured errors
//!   - `growbox`: sensor readings, captures/analyses, retention
//! - **[`ingest`]**: image storage, classifier seam, ingestion service
//! - **[`maintenance`]**: retention and capture timers
//! - **[`config`]**: configuration management
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use growbox::database::{AnalysisScores, GrowboxDatabase, Measurements, Table};
//!
//! let db = GrowboxDatabase::open_in_dir("/var/lib/growbox")?;
//!
//! // sensor telemetry
//! db.readings().append(&Measurements {
//!     soil_moisture: Some(38.5),
//!     air_temperature: Some(24.1),
//!     ..Default::default()
//! }.into())?;
//! let recent = db.readings().recent(10)?;
//!
//! // capture and analysis as one unit of work
//! let recorded = db.captures().record_capture_with_analysis(
//!     "/var/lib/growbox/images/capture_20240501_120000_1a2b3c4d.jpg",
//!     &AnalysisScores {
//!         ripeness_score: Some(0.91),
//!         ripeness_text: Some("ripe".to_string()),
//!         flower_count: Some(2),
//!         flower_text: Some("flowering".to_string()),
//!     },
//! )?;
//!
//! // retention
//! let deleted = db.retention().sweep(Table::SensorData, 30)?;
//! ```

pub mod config;
pub mod database;
pub mod ingest;
pub mod maintenance;
pub mod utils;

// =============================================================================
// Configuration
// =============================================================================

pub use config::GrowboxConfig;

// =============================================================================
// Database Module - Re-export commonly used types
// =============================================================================

// Primary database type
pub use database::GrowboxDatabase;

// Core database types
pub use database::{
    ConnectionProvider, DatabaseConn, SchemaDefinitions, SchemaManager, SchemaStatus, StoreError,
    StoreErrorKind, StoreResult, Table, SCHEMA_VERSION,
};

// Stores and records
pub use database::{
    AnalysisResult, AnalysisScores, CaptureAnalysis, CaptureStore, ImageCapture,
    MeasurementValue, Measurements, RecordedCapture, RetentionSweeper, SensorInput,
    SensorReading, SensorReadingStore,
};

// =============================================================================
// Ingestion and maintenance
// =============================================================================

pub use ingest::{CaptureRef, ImageClassifier, ImageStore, IngestOutcome, IngestService};
pub use maintenance::{MaintenanceJob, MaintenanceScheduler, SchedulerHandle, TimerState, TimerStatus};

pub use utils::OutputFormat;
