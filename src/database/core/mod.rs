//! Core database infrastructure
//!
//! This module provides the foundational database components used by every store:
//! - `ConnectionProvider`: resolves the storage location and opens one connection per unit of work
//! - `DatabaseConn`: SQLite connection wrapper with foreign keys enforced
//! - `SchemaManager`: Schema initialization, status and reset
//! - `StoreError`: Structured errors shared by all stores

mod connection;
mod error;
mod schema;

pub use connection::{ConnectionProvider, DatabaseConn, DEFAULT_DATABASE_FILE};
pub use error::{StoreError, StoreErrorKind, StoreResult};
pub use schema::{SchemaDefinitions, SchemaManager, SchemaStatus, Table, SCHEMA_VERSION};
