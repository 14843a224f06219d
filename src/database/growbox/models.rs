//! Typed records for the growbox tables
//!
//! Rows are converted into these structs once, at the storage boundary.

use chrono::NaiveDateTime;
use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

use crate::database::core::{StoreError, StoreErrorKind, StoreResult};

/// Format used for every stored timestamp (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub(crate) fn parse_timestamp(idx: usize, value: &str) -> rusqlite::Result<NaiveDateTime> {
    // `%.f` also accepts second-precision values written by CURRENT_TIMESTAMP
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

// =============================================================================
// Sensor readings
// =============================================================================

/// Raw value of one measurement as delivered by a collaborator
///
/// Devices post numbers, but form posts and hand-written JSON often carry
/// strings; both are accepted and validated before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MeasurementValue {
    Number(f64),
    Text(String),
}

impl From<f64> for MeasurementValue {
    fn from(v: f64) -> Self {
        MeasurementValue::Number(v)
    }
}

impl From<&str> for MeasurementValue {
    fn from(v: &str) -> Self {
        MeasurementValue::Text(v.to_string())
    }
}

impl MeasurementValue {
    /// Validate into a finite number; blank text counts as absent
    fn validate(&self, field: &str) -> StoreResult<Option<f64>> {
        let value = match self {
            MeasurementValue::Number(v) => *v,
            MeasurementValue::Text(s) => {
                let s = s.trim();
                if s.is_empty() {
                    return Ok(None);
                }
                s.parse::<f64>()
                    .map_err(|_| StoreError::invalid_measurement(field, s))?
            }
        };
        if value.is_finite() {
            Ok(Some(value))
        } else {
            Err(StoreError::invalid_measurement(field, &value.to_string()))
        }
    }
}

/// Unvalidated sensor payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorInput {
    #[serde(default)]
    pub soil_moisture: Option<MeasurementValue>,
    #[serde(default)]
    pub air_temperature: Option<MeasurementValue>,
    #[serde(default)]
    pub air_humidity: Option<MeasurementValue>,
    #[serde(default)]
    pub light_intensity: Option<MeasurementValue>,
    #[serde(default)]
    pub water_level: Option<MeasurementValue>,
}

impl SensorInput {
    /// Check every field and produce storable measurements
    pub fn validate(&self) -> StoreResult<Measurements> {
        fn check(field: &str, v: &Option<MeasurementValue>) -> StoreResult<Option<f64>> {
            match v {
                Some(v) => v.validate(field),
                None => Ok(None),
            }
        }

        Ok(Measurements {
            soil_moisture: check("soil_moisture", &self.soil_moisture)?,
            air_temperature: check("air_temperature", &self.air_temperature)?,
            air_humidity: check("air_humidity", &self.air_humidity)?,
            light_intensity: check("light_intensity", &self.light_intensity)?,
            water_level: check("water_level", &self.water_level)?,
        })
    }
}

/// Validated measurements; every present value is finite
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurements {
    pub soil_moisture: Option<f64>,
    pub air_temperature: Option<f64>,
    pub air_humidity: Option<f64>,
    pub light_intensity: Option<f64>,
    pub water_level: Option<f64>,
}

impl From<Measurements> for SensorInput {
    fn from(m: Measurements) -> Self {
        SensorInput {
            soil_moisture: m.soil_moisture.map(MeasurementValue::Number),
            air_temperature: m.air_temperature.map(MeasurementValue::Number),
            air_humidity: m.air_humidity.map(MeasurementValue::Number),
            light_intensity: m.light_intensity.map(MeasurementValue::Number),
            water_level: m.water_level.map(MeasurementValue::Number),
        }
    }
}

/// A stored sensor reading
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    #[serde(flatten)]
    pub measurements: Measurements,
}

impl SensorReading {
    pub(crate) const COLUMNS: &'static str =
        "id, timestamp, soil_moisture, air_temperature, air_humidity, light_intensity, water_level";

    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let ts: String = row.get(1)?;
        Ok(SensorReading {
            id: row.get(0)?,
            timestamp: parse_timestamp(1, &ts)?,
            measurements: Measurements {
                soil_moisture: row.get(2)?,
                air_temperature: row.get(3)?,
                air_humidity: row.get(4)?,
                light_intensity: row.get(5)?,
                water_level: row.get(6)?,
            },
        })
    }
}

// =============================================================================
// Captures and analysis results
// =============================================================================

/// A stored image capture
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageCapture {
    pub id: i64,
    pub timestamp: NaiveDateTime,
    pub file_path: String,
}

impl ImageCapture {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let ts: String = row.get(1)?;
        Ok(ImageCapture {
            id: row.get(0)?,
            timestamp: parse_timestamp(1, &ts)?,
            file_path: row.get(2)?,
        })
    }
}

/// Classifier output for one image
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisScores {
    /// Ripeness confidence in 0.0..=1.0
    #[serde(default)]
    pub ripeness_score: Option<f64>,
    #[serde(default)]
    pub ripeness_text: Option<String>,
    /// Number of flowers detected
    #[serde(default)]
    pub flower_count: Option<u32>,
    #[serde(default)]
    pub flower_text: Option<String>,
}

impl AnalysisScores {
    pub fn validate(&self) -> StoreResult<()> {
        if let Some(score) = self.ripeness_score {
            if !score.is_finite() || !(0.0..=1.0).contains(&score) {
                return Err(StoreError::with_details(
                    StoreErrorKind::InvalidArgument,
                    format!("ripeness_score must be within 0.0..=1.0, got {}", score),
                    serde_json::json!({ "field": "ripeness_score" }),
                ));
            }
        }
        Ok(())
    }
}

/// A stored analysis result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub id: i64,
    pub image_id: i64,
    pub created_at: NaiveDateTime,
    #[serde(flatten)]
    pub scores: AnalysisScores,
}

impl AnalysisResult {
    pub(crate) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        let ts: String = row.get(2)?;
        Ok(AnalysisResult {
            id: row.get(0)?,
            image_id: row.get(1)?,
            created_at: parse_timestamp(2, &ts)?,
            scores: AnalysisScores {
                ripeness_score: row.get(3)?,
                ripeness_text: row.get(4)?,
                flower_count: row.get(5)?,
                flower_text: row.get(6)?,
            },
        })
    }
}

/// Identities produced by the combined capture + analysis write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordedCapture {
    pub capture_id: i64,
    pub result_id: i64,
}

/// A capture joined with one of its analysis results
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CaptureAnalysis {
    pub capture: ImageCapture,
    pub result: AnalysisResult,
}
