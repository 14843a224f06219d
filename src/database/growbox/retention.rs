//! Retention sweeper
//!
//! Deletes telemetry older than a retention horizon. Tables are addressed
//! through [`Table`], so only allow-listed identifiers ever reach the SQL.

use chrono::{NaiveDateTime, TimeDelta, Utc};
use tracing::{debug, info};

use super::models::format_timestamp;
use crate::database::core::{ConnectionProvider, StoreError, StoreResult, Table};

/// Default retention horizon in days
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

/// Deletes aged rows from allow-listed tables
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    provider: ConnectionProvider,
}

impl RetentionSweeper {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Delete rows of `table` created more than `retention_days` days ago
    ///
    /// Returns the number of rows deleted. Running it twice in a row deletes
    /// nothing the second time.
    pub fn sweep(&self, table: Table, retention_days: u32) -> StoreResult<usize> {
        self.sweep_before(table, cutoff(retention_days))
    }

    /// Same as [`RetentionSweeper::sweep`] with the table given by name
    ///
    /// Fails with `UnknownTable` for any name outside the allow-list.
    pub fn sweep_named(&self, table: &str, retention_days: u32) -> StoreResult<usize> {
        let table: Table = table.parse()?;
        self.sweep(table, retention_days)
    }

    /// Delete rows of `table` created strictly before `cutoff` (UTC)
    pub fn sweep_before(&self, table: Table, cutoff: NaiveDateTime) -> StoreResult<usize> {
        let cutoff = format_timestamp(&cutoff);
        debug!("Sweeping {} rows older than {}", table, cutoff);

        let db = self.provider.acquire()?;
        let sql = format!(
            "DELETE FROM {} WHERE {} < ?1",
            table.name(),
            table.timestamp_column()
        );
        let deleted = db
            .conn
            .execute(&sql, [&cutoff])
            .map_err(|e| StoreError::from_sqlite(e, &format!("Failed to sweep {}", table)))?;

        info!("Swept {} rows from {} older than {}", deleted, table, cutoff);
        Ok(deleted)
    }
}

/// Cutoff for a retention horizon; absurd horizons delete nothing
fn cutoff(retention_days: u32) -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    TimeDelta::try_days(i64::from(retention_days))
        .and_then(|horizon| now.checked_sub_signed(horizon))
        .unwrap_or(NaiveDateTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::StoreErrorKind;
    use tempfile::TempDir;

    fn setup() -> (TempDir, ConnectionProvider, RetentionSweeper) {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::in_dir(dir.path()).unwrap();
        let sweeper = RetentionSweeper::new(provider.clone());
        (dir, provider, sweeper)
    }

    fn insert_reading_at(provider: &ConnectionProvider, timestamp: &str) {
        provider
            .acquire()
            .unwrap()
            .conn
            .execute(
                "INSERT INTO sensor_data (timestamp, soil_moisture) VALUES (?1, 1.0)",
                [timestamp],
            )
            .unwrap();
    }

    #[test]
    fn test_sweep_deletes_only_old_rows() {
        let (_dir, provider, sweeper) = setup();
        let old = Utc::now().naive_utc() - TimeDelta::days(45);
        insert_reading_at(&provider, &format_timestamp(&old));
        insert_reading_at(&provider, "2001-02-03 04:05:06");
        provider
            .acquire()
            .unwrap()
            .conn
            .execute("INSERT INTO sensor_data (soil_moisture) VALUES (2.0)", [])
            .unwrap();

        assert_eq!(sweeper.sweep(Table::SensorData, 30).unwrap(), 2);
        let remaining = provider
            .acquire()
            .unwrap()
            .table_count(Table::SensorData)
            .unwrap();
        assert_eq!(remaining, 1);
    }

    #[test]
    fn test_second_sweep_deletes_nothing() {
        let (_dir, provider, sweeper) = setup();
        insert_reading_at(&provider, "2020-01-01 00:00:00.000");

        assert_eq!(sweeper.sweep(Table::SensorData, 30).unwrap(), 1);
        assert_eq!(sweeper.sweep(Table::SensorData, 30).unwrap(), 0);
    }

    #[test]
    fn test_sweep_before_is_strict() {
        let (_dir, provider, sweeper) = setup();
        insert_reading_at(&provider, "2024-06-01 12:00:00.000");

        let at = NaiveDateTime::parse_from_str("2024-06-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(sweeper.sweep_before(Table::SensorData, at).unwrap(), 0);
        let after = at + TimeDelta::milliseconds(1);
        assert_eq!(sweeper.sweep_before(Table::SensorData, after).unwrap(), 1);
    }

    #[test]
    fn test_sweep_named_rejects_unknown_table() {
        let (_dir, _provider, sweeper) = setup();
        for name in ["growbox_meta", "sensor_data; DROP TABLE image_capture", ""] {
            let err = sweeper.sweep_named(name, 30).unwrap_err();
            assert_eq!(err.kind, StoreErrorKind::UnknownTable);
        }
        assert_eq!(sweeper.sweep_named("image_capture", 30).unwrap(), 0);
    }

    #[test]
    fn test_huge_horizon_deletes_nothing() {
        let (_dir, provider, sweeper) = setup();
        insert_reading_at(&provider, "1999-01-01 00:00:00.000");
        assert_eq!(sweeper.sweep(Table::SensorData, u32::MAX).unwrap(), 0);
    }
}
