use clap::{Args, Subcommand};
use growbox::utils::{display_option, format_rows};
use growbox::{GrowboxConfig, MeasurementValue, OutputFormat, SensorInput, SensorReading};
use tabled::Tabled;

/// Arguments for the Sensor command
#[derive(Args)]
pub struct SensorArgs {
    #[clap(subcommand)]
    pub command: SensorCommands,
}

#[derive(Subcommand)]
pub enum SensorCommands {
    /// Record one reading; omitted measurements are stored as absent
    Add(AddArgs),

    /// Show the most recent reading
    Latest,

    /// Show recent readings, newest first
    Recent {
        /// Number of readings to show
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: i64,

        /// Show every stored reading
        #[clap(long, conflicts_with = "limit")]
        all: bool,
    },
}

#[derive(Args)]
pub struct AddArgs {
    /// Soil moisture
    #[clap(long)]
    pub soil_moisture: Option<String>,

    /// Air temperature
    #[clap(long)]
    pub air_temperature: Option<String>,

    /// Air humidity
    #[clap(long)]
    pub air_humidity: Option<String>,

    /// Light intensity
    #[clap(long)]
    pub light_intensity: Option<String>,

    /// Water level
    #[clap(long)]
    pub water_level: Option<String>,

    /// Full payload as JSON, e.g. '{"soil_moisture": 41.5, "water_level": "80"}'
    #[clap(long, conflicts_with_all = ["soil_moisture", "air_temperature", "air_humidity", "light_intensity", "water_level"])]
    pub json: Option<String>,
}

impl AddArgs {
    fn into_input(self) -> anyhow::Result<SensorInput> {
        if let Some(json) = self.json {
            return Ok(serde_json::from_str(&json)?);
        }
        let value = |v: Option<String>| v.map(MeasurementValue::Text);
        Ok(SensorInput {
            soil_moisture: value(self.soil_moisture),
            air_temperature: value(self.air_temperature),
            air_humidity: value(self.air_humidity),
            light_intensity: value(self.light_intensity),
            water_level: value(self.water_level),
        })
    }
}

#[derive(Tabled)]
struct ReadingRow {
    id: i64,
    timestamp: String,
    soil_moisture: String,
    air_temperature: String,
    air_humidity: String,
    light_intensity: String,
    water_level: String,
}

impl From<&SensorReading> for ReadingRow {
    fn from(r: &SensorReading) -> Self {
        let m = &r.measurements;
        ReadingRow {
            id: r.id,
            timestamp: r.timestamp.format(growbox::database::TIMESTAMP_FORMAT).to_string(),
            soil_moisture: display_option(&m.soil_moisture),
            air_temperature: display_option(&m.air_temperature),
            air_humidity: display_option(&m.air_humidity),
            light_intensity: display_option(&m.light_intensity),
            water_level: display_option(&m.water_level),
        }
    }
}

pub fn run(config: &GrowboxConfig, args: SensorArgs, output_format: OutputFormat) {
    let db = super::open_database(config);
    let readings = db.readings();

    match args.command {
        SensorCommands::Add(add) => {
            let input = match add.into_input() {
                Ok(input) => input,
                Err(e) => super::fail(format!("invalid JSON payload: {}", e)),
            };
            let id = match readings.append(&input) {
                Ok(id) => id,
                Err(e) => super::fail(e),
            };
            if output_format.is_json() {
                super::print_json(&serde_json::json!({ "id": id }), output_format);
            } else {
                println!("Recorded sensor reading {}", id);
            }
        }
        SensorCommands::Latest => match readings.latest() {
            Ok(latest) => print_readings(latest.as_slice(), output_format),
            Err(e) => super::fail(e),
        },
        SensorCommands::Recent { limit, all } => {
            let result = if all {
                readings.all()
            } else {
                readings.recent(limit)
            };
            match result {
                Ok(list) => print_readings(&list, output_format),
                Err(e) => super::fail(e),
            }
        }
    }
}

fn print_readings(list: &[SensorReading], output_format: OutputFormat) {
    if output_format.is_json() {
        super::print_json_list(list, output_format);
        return;
    }
    if list.is_empty() {
        eprintln!("No sensor readings recorded.");
        return;
    }
    let rows: Vec<ReadingRow> = list.iter().map(ReadingRow::from).collect();
    println!("{}", format_rows(&rows, output_format));
}
