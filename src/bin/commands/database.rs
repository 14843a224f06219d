use clap::{Args, Subcommand};
use growbox::config::{format_size, get_database_info, DatabaseInfo};
use growbox::{GrowboxConfig, OutputFormat, Table};
use serde::Serialize;

/// Arguments for the Database command
#[derive(Args)]
pub struct DatabaseArgs {
    #[clap(subcommand)]
    pub command: Option<DatabaseCommands>,
}

/// Database subcommands
#[derive(Subcommand)]
pub enum DatabaseCommands {
    /// Show database status (default when no subcommand)
    Status,

    /// Create the database file and schema if missing
    Init,

    /// Drop every table and recreate an empty schema
    Reset {
        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },

    /// Delete rows older than the retention horizon
    Sweep {
        /// Table to sweep: sensor_data, image_capture, ai_result (default: configured tables)
        #[clap(long, short)]
        table: Vec<String>,

        /// Retention horizon in days (default: configured retention)
        #[clap(long, short)]
        days: Option<u32>,
    },
}

#[derive(Debug, Serialize)]
struct SweepSummary {
    table: Table,
    retention_days: u32,
    deleted: usize,
}

pub fn run(config: &GrowboxConfig, args: DatabaseArgs, output_format: OutputFormat) {
    match args.command {
        None | Some(DatabaseCommands::Status) => run_status(config, output_format),
        Some(DatabaseCommands::Init) => run_init(config, output_format),
        Some(DatabaseCommands::Reset { yes }) => run_reset(config, yes, output_format),
        Some(DatabaseCommands::Sweep { table, days }) => {
            run_sweep(config, &table, days, output_format)
        }
    }
}

fn run_status(config: &GrowboxConfig, output_format: OutputFormat) {
    let info = get_database_info(config);

    if output_format.is_json() {
        super::print_json(&info, output_format);
    } else {
        print_status_table(&info);
    }
}

fn print_status_table(info: &DatabaseInfo) {
    println!("Growbox Database Status");
    println!("=======================\n");

    println!("SQLite Database:");
    println!("  Path:           {}", info.path);
    println!(
        "  Status:         {}",
        if info.exists { "exists" } else { "not created" }
    );
    if let Some(size) = info.size_bytes {
        println!("  Size:           {}", format_size(size));
    }
    println!(
        "  Schema:         {}",
        if info.schema_initialized {
            format!("initialized (v{})", info.schema_version.unwrap_or(0))
        } else {
            "not initialized".to_string()
        }
    );

    if info.schema_initialized {
        println!();
        println!("Records:");
        let counts = [
            (Table::SensorData, info.sensor_readings),
            (Table::ImageCapture, info.image_captures),
            (Table::AnalysisResult, info.analysis_results),
        ];
        for (table, count) in counts {
            let count = count
                .map(|c| format!("{} rows", c))
                .unwrap_or_else(|| "unavailable".to_string());
            println!("  {:15} {}", format!("{}:", table), count);
        }
    }

    eprintln!();
    eprintln!("Commands:");
    eprintln!("  growbox db init                  Create the database and schema");
    eprintln!("  growbox db sweep [--days N]      Delete aged rows");
    eprintln!("  growbox db reset                 Drop all tables and start over");
}

fn run_init(config: &GrowboxConfig, output_format: OutputFormat) {
    // opening bootstraps the schema
    let db = super::open_database(config);
    let status = match db.schema_status() {
        Ok(status) => status,
        Err(e) => super::fail(e),
    };

    if output_format.is_json() {
        super::print_json(&status, output_format);
    } else {
        println!("Database ready at {}", db.path().display());
    }
}

fn run_reset(config: &GrowboxConfig, yes: bool, output_format: OutputFormat) {
    if !yes
        && !super::confirm(&format!(
            "This will delete all readings, captures and analysis results in {}.",
            config.database_path
        ))
    {
        eprintln!("Aborted.");
        return;
    }

    let db = super::open_database(config);
    if let Err(e) = db.reset_schema(true) {
        super::fail(e);
    }

    if output_format.is_json() {
        super::print_json(&serde_json::json!({"reset": true}), output_format);
    } else {
        println!("Database reset: {}", db.path().display());
    }
}

fn run_sweep(
    config: &GrowboxConfig,
    tables: &[String],
    days: Option<u32>,
    output_format: OutputFormat,
) {
    let retention_days = days.unwrap_or(config.retention_days);
    let db = super::open_database(config);
    let sweeper = db.retention();

    let targets: Vec<Table> = if tables.is_empty() {
        config.retention_tables.clone()
    } else {
        match tables.iter().map(|t| t.parse()).collect() {
            Ok(targets) => targets,
            Err(e) => super::fail(e),
        }
    };

    let mut summaries = Vec::with_capacity(targets.len());
    for table in targets {
        match sweeper.sweep(table, retention_days) {
            Ok(deleted) => summaries.push(SweepSummary {
                table,
                retention_days,
                deleted,
            }),
            Err(e) => super::fail(format!("sweeping {}: {}", table, e)),
        }
    }

    if output_format.is_json() {
        super::print_json_list(&summaries, output_format);
    } else {
        for summary in &summaries {
            println!(
                "{}: deleted {} rows older than {} days",
                summary.table, summary.deleted, summary.retention_days
            );
        }
    }
}
