use clap::{Parser, Subcommand};
use growbox::*;
use tracing::Level;

mod commands;

use commands::capture::CaptureArgs;
use commands::config::ConfigArgs;
use commands::database::DatabaseArgs;
use commands::run::RunArgs;
use commands::sensor::SensorArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.growbox/growbox.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(short, long, global = true, default_value = "table")]
    format: OutputFormat,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the effective configuration
    Config(ConfigArgs),

    /// Database status and administration
    #[clap(alias = "database")]
    Db(DatabaseArgs),

    /// Record and query sensor readings
    Sensor(SensorArgs),

    /// Record and query image captures and analysis results
    Capture(CaptureArgs),

    /// Run the maintenance timers until interrupted
    Run(RunArgs),
}

fn main() {
    let cli = Cli::parse();

    let config = match GrowboxConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    };

    let level = if cli.debug {
        Level::DEBUG
    } else if matches!(cli.command, Commands::Run(_)) {
        Level::INFO
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Config(args) => commands::config::run(&config, args, cli.format),
        Commands::Db(args) => commands::database::run(&config, args, cli.format),
        Commands::Sensor(args) => commands::sensor::run(&config, args, cli.format),
        Commands::Capture(args) => commands::capture::run(&config, args, cli.format),
        Commands::Run(args) => commands::run::run(&config, args, cli.format),
    }
}
