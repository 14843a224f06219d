pub mod capture;
pub mod config;
pub mod database;
pub mod run;
pub mod sensor;

use growbox::ingest::{ImageStore, IngestService};
use growbox::{GrowboxConfig, GrowboxDatabase, OutputFormat};
use serde::Serialize;

/// Open the configured database or exit
pub(crate) fn open_database(config: &GrowboxConfig) -> GrowboxDatabase {
    match GrowboxDatabase::open(&config.database_path) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to open database: {}", e);
            std::process::exit(1);
        }
    }
}

/// Build the ingest service over the configured database and image directory
pub(crate) fn ingest_service(config: &GrowboxConfig) -> IngestService {
    let db = open_database(config);
    match ImageStore::new(&config.image_dir) {
        Ok(images) => IngestService::new(db, images),
        Err(e) => {
            eprintln!("ERROR: {}", e);
            std::process::exit(1);
        }
    }
}

/// Print a single value in a JSON variant
pub(crate) fn print_json<T: Serialize>(value: &T, output_format: OutputFormat) {
    match output_format.format_json_value(value) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Print a list in a JSON variant
pub(crate) fn print_json_list<T: Serialize>(items: &[T], output_format: OutputFormat) {
    match output_format.format_json_list(items) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing output: {}", e),
    }
}

/// Ask for confirmation on stderr; anything but y/yes aborts
pub(crate) fn confirm(prompt: &str) -> bool {
    eprintln!("{}", prompt);
    eprint!("Are you sure? [y/N] ");

    let mut input = String::new();
    if std::io::stdin().read_line(&mut input).is_ok() {
        let input = input.trim().to_lowercase();
        input == "y" || input == "yes"
    } else {
        false
    }
}

/// Print an error and exit
pub(crate) fn fail(err: impl std::fmt::Display) -> ! {
    eprintln!("ERROR: {}", err);
    std::process::exit(1);
}
