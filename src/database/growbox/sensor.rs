//! Sensor reading store
//!
//! Append-only writer and time-ordered readers for scalar telemetry.
//! "Most recent" always means `(timestamp DESC, id DESC)`.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use super::models::{SensorInput, SensorReading};
use crate::database::core::{ConnectionProvider, StoreError, StoreResult, Table};

/// Store for `sensor_data` rows
#[derive(Debug, Clone)]
pub struct SensorReadingStore {
    provider: ConnectionProvider,
}

impl SensorReadingStore {
    pub fn new(provider: ConnectionProvider) -> Self {
        Self { provider }
    }

    /// Validate and insert one reading, returning its id
    ///
    /// The timestamp is assigned by the database. Nothing is written when any
    /// field fails validation.
    pub fn append(&self, input: &SensorInput) -> StoreResult<i64> {
        let m = input.validate()?;

        let db = self.provider.acquire()?;
        db.conn
            .execute(
                "INSERT INTO sensor_data
                    (soil_moisture, air_temperature, air_humidity, light_intensity, water_level)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    m.soil_moisture,
                    m.air_temperature,
                    m.air_humidity,
                    m.light_intensity,
                    m.water_level
                ],
            )
            .map_err(|e| StoreError::from_sqlite(e, "Failed to insert sensor reading"))?;

        let id = db.conn.last_insert_rowid();
        debug!("Stored sensor reading {}", id);
        Ok(id)
    }

    /// The most recent reading, or `None` when the table is empty
    pub fn latest(&self) -> StoreResult<Option<SensorReading>> {
        let db = self.provider.acquire()?;
        let query = format!(
            "SELECT {} FROM sensor_data ORDER BY timestamp DESC, id DESC LIMIT 1",
            SensorReading::COLUMNS
        );
        db.conn
            .query_row(&query, [], SensorReading::from_row)
            .optional()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read latest sensor reading"))
    }

    /// Up to `limit` most recent readings, newest first
    pub fn recent(&self, limit: i64) -> StoreResult<Vec<SensorReading>> {
        if limit <= 0 {
            return Err(StoreError::invalid_argument(format!(
                "limit must be a positive integer, got {}",
                limit
            )));
        }
        self.query_readings(Some(limit))
    }

    /// Every stored reading, newest first
    pub fn all(&self) -> StoreResult<Vec<SensorReading>> {
        self.query_readings(None)
    }

    /// Number of stored readings
    pub fn count(&self) -> StoreResult<u64> {
        self.provider.acquire()?.table_count(Table::SensorData)
    }

    fn query_readings(&self, limit: Option<i64>) -> StoreResult<Vec<SensorReading>> {
        let db = self.provider.acquire()?;
        let query = format!(
            "SELECT {} FROM sensor_data ORDER BY timestamp DESC, id DESC LIMIT ?1",
            SensorReading::COLUMNS
        );
        let mut stmt = db
            .conn
            .prepare(&query)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to prepare sensor query"))?;

        // a negative LIMIT means no limit in SQLite
        let readings = stmt
            .query_map([limit.unwrap_or(-1)], SensorReading::from_row)
            .map_err(|e| StoreError::from_sqlite(e, "Failed to query sensor readings"))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::from_sqlite(e, "Failed to read sensor reading"))?;
        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::core::StoreErrorKind;
    use crate::database::growbox::models::{Measurements, MeasurementValue};
    use tempfile::TempDir;

    fn setup() -> (TempDir, SensorReadingStore) {
        let dir = TempDir::new().unwrap();
        let provider = ConnectionProvider::in_dir(dir.path()).unwrap();
        (dir, SensorReadingStore::new(provider))
    }

    fn reading(soil: f64) -> SensorInput {
        SensorInput {
            soil_moisture: Some(MeasurementValue::Number(soil)),
            ..Default::default()
        }
    }

    #[test]
    fn test_append_then_latest_round_trips_exactly() {
        let (_dir, store) = setup();
        let m = Measurements {
            soil_moisture: Some(0.1 + 0.2),
            air_temperature: Some(-3.125),
            air_humidity: Some(67.891_234_567_8),
            light_intensity: Some(1.0e6),
            water_level: None,
        };

        let id = store.append(&m.into()).unwrap();
        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.measurements, m);
    }

    #[test]
    fn test_latest_on_empty_table_is_none() {
        let (_dir, store) = setup();
        assert!(store.latest().unwrap().is_none());
        assert!(store.all().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_measurement_inserts_nothing() {
        let (_dir, store) = setup();
        store.append(&reading(10.0)).unwrap();

        let bad = SensorInput {
            soil_moisture: Some(MeasurementValue::Number(11.0)),
            air_temperature: Some(MeasurementValue::Text("warm".to_string())),
            ..Default::default()
        };
        let err = store.append(&bad).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidArgument);
        assert_eq!(err.field(), Some("air_temperature"));
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_recent_orders_newest_first() {
        let (_dir, store) = setup();
        let r1 = store.append(&reading(1.0)).unwrap();
        let r2 = store.append(&reading(2.0)).unwrap();
        let r3 = store.append(&reading(3.0)).unwrap();

        let recent = store.recent(2).unwrap();
        let ids: Vec<i64> = recent.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![r3, r2]);

        let all: Vec<i64> = store.all().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(all, vec![r3, r2, r1]);
    }

    #[test]
    fn test_timestamp_is_primary_sort_key() {
        let (_dir, store) = setup();
        let newer = store.append(&reading(1.0)).unwrap();
        let older = store.append(&reading(2.0)).unwrap();

        // backdate the row with the larger id
        let db = store.provider.acquire().unwrap();
        db.conn
            .execute(
                "UPDATE sensor_data SET timestamp = '2000-01-01 00:00:00.000' WHERE id = ?1",
                [older],
            )
            .unwrap();

        let latest = store.latest().unwrap().unwrap();
        assert_eq!(latest.id, newer);
    }

    #[test]
    fn test_recent_rejects_non_positive_limit() {
        let (_dir, store) = setup();
        for limit in [0, -5] {
            let err = store.recent(limit).unwrap_err();
            assert_eq!(err.kind, StoreErrorKind::InvalidArgument);
        }
    }
}
