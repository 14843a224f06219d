use clap::Args;
use growbox::config::{format_size, get_database_info, DatabaseInfo};
use growbox::{GrowboxConfig, OutputFormat};
use serde::Serialize;
use std::path::Path;

/// Arguments for the Config command
#[derive(Args)]
pub struct ConfigArgs {
    /// List the stored images as well
    #[clap(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Serialize)]
struct ConfigInfo<'a> {
    config_file: String,
    settings: &'a GrowboxConfig,
    database: DatabaseInfo,
    images: ImageDirInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    files: Option<Vec<FileInfo>>,
}

#[derive(Debug, Serialize)]
struct ImageDirInfo {
    directory: String,
    exists: bool,
    file_count: u64,
    size_bytes: u64,
}

#[derive(Debug, Serialize)]
struct FileInfo {
    name: String,
    size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    modified: Option<String>,
}

pub fn run(config: &GrowboxConfig, args: ConfigArgs, output_format: OutputFormat) {
    let ConfigArgs { verbose } = args;

    let image_dir = Path::new(&config.image_dir);
    let mut images = ImageDirInfo {
        directory: config.image_dir.clone(),
        exists: image_dir.exists(),
        file_count: 0,
        size_bytes: 0,
    };
    let mut files = Vec::new();

    if let Ok(entries) = std::fs::read_dir(image_dir) {
        for entry in entries.flatten() {
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            images.file_count += 1;
            images.size_bytes += metadata.len();

            if verbose {
                let modified = metadata.modified().ok().map(|t| {
                    let datetime: chrono::DateTime<chrono::Utc> = t.into();
                    datetime.format("%Y-%m-%d %H:%M:%S UTC").to_string()
                });
                files.push(FileInfo {
                    name: entry.file_name().to_string_lossy().to_string(),
                    size_bytes: metadata.len(),
                    modified,
                });
            }
        }
    }
    files.sort_by(|a, b| a.name.cmp(&b.name));

    let info = ConfigInfo {
        config_file: GrowboxConfig::config_file_path(),
        settings: config,
        database: get_database_info(config),
        images,
        files: verbose.then_some(files),
    };

    if output_format.is_json() {
        super::print_json(&info, output_format);
    } else {
        print_config_table(&info);
    }
}

fn print_config_table(info: &ConfigInfo) {
    println!("Configuration:");
    println!("  Config file:          {}", info.config_file);
    for line in info.settings.summary().lines() {
        println!("  {}", line);
    }

    println!();
    println!("SQLite Database:");
    println!(
        "  Status:               {}",
        if info.database.exists {
            "exists"
        } else {
            "not created"
        }
    );
    if let Some(size) = info.database.size_bytes {
        println!("  Size:                 {}", format_size(size));
    }
    if info.database.schema_initialized {
        println!(
            "  Schema:               initialized (v{})",
            info.database.schema_version.unwrap_or(0)
        );
    }

    println!();
    println!("Images:");
    println!(
        "  Status:               {}",
        if info.images.exists {
            "exists"
        } else {
            "not created"
        }
    );
    println!(
        "  Files:                {} ({})",
        info.images.file_count,
        format_size(info.images.size_bytes)
    );

    if let Some(files) = &info.files {
        println!();
        for file in files {
            println!(
                "  {:40} {:>10}  {}",
                file.name,
                format_size(file.size_bytes),
                file.modified.as_deref().unwrap_or("-")
            );
        }
    }

    if !Path::new(&info.config_file).exists() {
        eprintln!();
        eprintln!(
            "No config file found; create {} to override the defaults.",
            info.config_file
        );
    }
}
