use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

use crate::database::{Table, DEFAULT_RETENTION_DAYS};

/// Default interval between retention sweeps
pub const DEFAULT_RETENTION_INTERVAL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default interval between capture requests
pub const DEFAULT_CAPTURE_INTERVAL: Duration = Duration::from_secs(12 * 60 * 60);

/// Default HTTP timeout for the capture device
pub const DEFAULT_CAPTURE_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GrowboxConfig {
    /// Path to the directory to hold growbox's data
    pub data_dir: String,

    /// SQLite database file (default: `{data_dir}/growbox.sqlite3`)
    pub database_path: String,

    /// Directory for captured images (default: `{data_dir}/images`)
    pub image_dir: String,

    /// Rows older than this many days are swept
    pub retention_days: u32,

    /// Tables swept by the retention timer
    pub retention_tables: Vec<Table>,

    #[serde(with = "humantime_serde_compat")]
    pub retention_interval: Duration,

    #[serde(with = "humantime_serde_compat")]
    pub capture_interval: Duration,

    /// Fire both timers once at startup instead of after the first interval
    pub run_on_startup: bool,

    /// Capture device endpoint; the capture timer is disabled when unset
    pub capture_url: Option<String>,

    pub capture_timeout_secs: u64,
}

const EMPTY_CONFIG: &str = r#"### growbox configuration file

### directory for the database and captured images
# data_dir = "~/.growbox"

### storage locations (default to files under data_dir)
# database_path = "~/.growbox/growbox.sqlite3"
# image_dir = "~/.growbox/images"

### retention
# retention_days = 30
# retention_tables = "sensor_data"
# retention_interval = "30days"

### capture device
# capture_url = "http://192.168.0.50/capture"
# capture_interval = "12h"
# capture_timeout_secs = 30

### fire maintenance timers once at startup
# run_on_startup = false
"#;

impl Default for GrowboxConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());

        Self::with_data_dir(format!("{}/.growbox", home_dir))
    }
}

impl GrowboxConfig {
    /// Function to create and initialize a new configuration
    pub fn new(path: &Option<String>) -> Result<GrowboxConfig> {
        // a .env file next to the binary may carry GROWBOX_* overrides
        let _ = dotenvy::dotenv();

        let mut builder = Config::builder();

        // By default use $HOME/.growbox/growbox.toml as the configuration file path
        let home_dir = dirs::home_dir()
            .ok_or_else(|| anyhow!("Could not find home directory"))?
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert home directory path to string"))?
            .to_owned();

        // Config dir
        let growbox_dir = format!("{}/.growbox", home_dir.as_str());

        // Add in toml configuration file
        match path {
            Some(p) => {
                let path = Path::new(p.as_str());
                if path.exists() {
                    let path_str = path
                        .to_str()
                        .ok_or_else(|| anyhow!("Could not convert path to string"))?;
                    builder = builder.add_source(config::File::with_name(path_str));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG)
                        .map_err(|e| anyhow!("Unable to create config file: {}", e))?;
                }
            }
            None => {
                std::fs::create_dir_all(growbox_dir.as_str())
                    .map_err(|e| anyhow!("Unable to create growbox directory: {}", e))?;
                let p = format!("{}/growbox.toml", growbox_dir.as_str());
                if Path::new(p.as_str()).exists() {
                    builder = builder.add_source(config::File::with_name(p.as_str()));
                } else {
                    std::fs::write(p.as_str(), EMPTY_CONFIG).map_err(|e| {
                        anyhow!("Unable to create config file {}: {}", p.as_str(), e)
                    })?;
                }
            }
        }

        // Add in settings from the environment (with a prefix of GROWBOX)
        // E.g., `GROWBOX_RETENTION_DAYS=7 ./growbox run` would shorten the horizon
        builder = builder.add_source(config::Environment::with_prefix("GROWBOX"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config, &growbox_dir)
    }

    /// Build a configuration from flat key/value settings
    ///
    /// Malformed optional values fall back to their defaults with a warning;
    /// an unknown retention table is an error.
    pub fn from_map(config: &HashMap<String, String>, default_data_dir: &str) -> Result<Self> {
        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => default_data_dir.to_string(),
        };
        let mut cfg = Self::with_data_dir(data_dir);

        if let Some(p) = non_empty(config, "database_path") {
            cfg.database_path = expand_home(p);
        }
        if let Some(p) = non_empty(config, "image_dir") {
            cfg.image_dir = expand_home(p);
        }

        cfg.retention_days = parse_or(config, "retention_days", DEFAULT_RETENTION_DAYS);

        if let Some(tables) = non_empty(config, "retention_tables") {
            cfg.retention_tables = tables
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<Table>().map_err(|e| anyhow!("retention_tables: {}", e)))
                .collect::<Result<Vec<_>>>()?;
        }

        cfg.retention_interval =
            parse_duration_or(config, "retention_interval", DEFAULT_RETENTION_INTERVAL);
        cfg.capture_interval =
            parse_duration_or(config, "capture_interval", DEFAULT_CAPTURE_INTERVAL);
        cfg.run_on_startup = parse_or(config, "run_on_startup", false);
        cfg.capture_url = non_empty(config, "capture_url").map(str::to_string);
        cfg.capture_timeout_secs =
            parse_or(config, "capture_timeout_secs", DEFAULT_CAPTURE_TIMEOUT_SECS);

        Ok(cfg)
    }

    /// Defaults rooted at `data_dir`
    pub fn with_data_dir(data_dir: impl Into<String>) -> Self {
        let data_dir = data_dir.into();
        let base = data_dir.trim_end_matches('/').to_string();
        Self {
            database_path: format!("{}/growbox.sqlite3", base),
            image_dir: format!("{}/images", base),
            data_dir,
            retention_days: DEFAULT_RETENTION_DAYS,
            retention_tables: vec![Table::SensorData],
            retention_interval: DEFAULT_RETENTION_INTERVAL,
            capture_interval: DEFAULT_CAPTURE_INTERVAL,
            run_on_startup: false,
            capture_url: None,
            capture_timeout_secs: DEFAULT_CAPTURE_TIMEOUT_SECS,
        }
    }

    /// Get the capture device timeout as Duration
    pub fn capture_timeout(&self) -> Duration {
        Duration::from_secs(self.capture_timeout_secs)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let tables: Vec<&str> = self.retention_tables.iter().map(|t| t.name()).collect();
        let mut lines = vec![
            format!("Data Directory:       {}", self.data_dir),
            format!("Database Path:        {}", self.database_path),
            format!("Image Directory:      {}", self.image_dir),
            format!("Retention:            {} days", self.retention_days),
            format!("Retention Tables:     {}", tables.join(", ")),
            format!(
                "Retention Interval:   {}",
                humantime::format_duration(self.retention_interval)
            ),
            format!("Run On Startup:       {}", self.run_on_startup),
        ];

        match &self.capture_url {
            Some(url) => {
                lines.push(format!("Capture URL:          {}", url));
                lines.push(format!(
                    "Capture Interval:     {}",
                    humantime::format_duration(self.capture_interval)
                ));
                lines.push(format!(
                    "Capture Timeout:      {} seconds",
                    self.capture_timeout_secs
                ));
            }
            None => lines.push("Capture URL:          (not set, capture timer disabled)".to_string()),
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.growbox/growbox.toml", home_dir)
    }
}

fn non_empty<'a>(config: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    config
        .get(key)
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
}

fn parse_or<T: std::str::FromStr>(config: &HashMap<String, String>, key: &str, default: T) -> T {
    match non_empty(config, key) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {} '{}', using default", key, raw);
            default
        }),
        None => default,
    }
}

fn parse_duration_or(config: &HashMap<String, String>, key: &str, default: Duration) -> Duration {
    match non_empty(config, key) {
        Some(raw) => match humantime::parse_duration(raw) {
            Ok(d) if !d.is_zero() => d,
            _ => {
                warn!("Ignoring invalid {} '{}', using default", key, raw);
                default
            }
        },
        None => default,
    }
}

/// Expand a leading `~` to the home directory
fn expand_home(path: &str) -> String {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) if rest.is_empty() || rest.starts_with('/') => {
            format!("{}{}", home.to_string_lossy(), rest)
        }
        _ => path.to_string(),
    }
}

/// Serialize durations the way they are written in the config file
mod humantime_serde_compat {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&humantime::format_duration(*d).to_string())
    }
}

// =============================================================================
// Shared database info (used by both config and database commands)
// =============================================================================

/// Information about the SQLite database
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    pub schema_initialized: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensor_readings: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_captures: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_results: Option<u64>,
}

/// Get SQLite database information without creating the file
pub fn get_database_info(config: &GrowboxConfig) -> DatabaseInfo {
    use crate::database::{DatabaseConn, SchemaManager, SchemaStatus, SCHEMA_VERSION};

    let path = config.database_path.clone();
    let exists = Path::new(&path).exists();
    let mut info = DatabaseInfo {
        size_bytes: if exists {
            std::fs::metadata(&path).ok().map(|m| m.len())
        } else {
            None
        },
        path,
        exists,
        schema_initialized: false,
        schema_version: None,
        sensor_readings: None,
        image_captures: None,
        analysis_results: None,
    };

    if !exists {
        return info;
    }

    // read-only: reporting must never bootstrap, migrate or repair the file
    let db = match DatabaseConn::open_read_only(Path::new(&info.path)) {
        Ok(db) => db,
        Err(e) => {
            warn!("Unable to open {}: {}", info.path, e);
            return info;
        }
    };

    let (initialized, version) = match SchemaManager::new(&db.conn).check_status() {
        Ok(SchemaStatus::Current) => (true, Some(SCHEMA_VERSION)),
        Ok(SchemaStatus::NeedsMigration { from, to: _ }) => (true, Some(from)),
        Ok(SchemaStatus::Incompatible {
            database_version,
            required_version: _,
        }) => (true, Some(database_version)),
        Ok(SchemaStatus::NotInitialized) | Ok(SchemaStatus::Corrupted) | Err(_) => (false, None),
    };
    info.schema_initialized = initialized;
    info.schema_version = version;

    if initialized {
        // tables missing from an older or newer schema simply stay unreported
        info.sensor_readings = db.table_count(Table::SensorData).ok();
        info.image_captures = db.table_count(Table::ImageCapture).ok();
        info.analysis_results = db.table_count(Table::AnalysisResult).ok();
    }

    info
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
