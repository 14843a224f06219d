use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Subcommand};
use growbox::database::TIMESTAMP_FORMAT;
use growbox::ingest::StaticClassifier;
use growbox::maintenance::{CaptureTrigger, HttpCaptureTrigger};
use growbox::utils::{display_option, format_rows, truncate_name, DEFAULT_PATH_MAX_LEN};
use growbox::{
    AnalysisScores, CaptureAnalysis, CaptureRef, GrowboxConfig, IngestOutcome, OutputFormat,
};
use serde::Serialize;
use tabled::Tabled;

/// Arguments for the Capture command
#[derive(Args)]
pub struct CaptureArgs {
    #[clap(subcommand)]
    pub command: CaptureCommands,
}

#[derive(Subcommand)]
pub enum CaptureCommands {
    /// Copy an image into the image directory and record it
    ///
    /// When scores are given the capture and its analysis are recorded together.
    Import {
        /// Image file to import
        file: PathBuf,

        #[clap(flatten)]
        scores: ScoreArgs,
    },

    /// Record a capture for an image already in place
    Register {
        /// Image path; stored in absolute form
        path: String,
    },

    /// Attach an analysis result to a recorded capture
    Analyze {
        /// Capture id or image path
        capture: CaptureRef,

        #[clap(flatten)]
        scores: ScoreArgs,
    },

    /// Show a capture and its analysis results
    Show {
        /// Capture id or image path
        capture: CaptureRef,
    },

    /// Request one image from the capture device now
    Fetch {
        /// Device URL (default: configured capture URL)
        #[clap(long)]
        url: Option<String>,
    },

    /// Show recent captures with their analysis results, newest first
    Recent {
        /// Number of rows to show
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: i64,
    },
}

#[derive(Args, Default)]
pub struct ScoreArgs {
    /// Ripeness confidence in 0.0..=1.0
    #[clap(long)]
    pub ripeness: Option<f64>,

    /// Ripeness label
    #[clap(long)]
    pub ripeness_text: Option<String>,

    /// Number of flowers detected
    #[clap(long)]
    pub flowers: Option<u32>,

    /// Flower label
    #[clap(long)]
    pub flower_text: Option<String>,
}

impl ScoreArgs {
    fn into_scores(self) -> Option<AnalysisScores> {
        if self.ripeness.is_none()
            && self.ripeness_text.is_none()
            && self.flowers.is_none()
            && self.flower_text.is_none()
        {
            return None;
        }
        Some(AnalysisScores {
            ripeness_score: self.ripeness,
            ripeness_text: self.ripeness_text,
            flower_count: self.flowers,
            flower_text: self.flower_text,
        })
    }
}

#[derive(Tabled)]
struct AnalysisRow {
    capture_id: i64,
    captured_at: String,
    file_path: String,
    result_id: i64,
    ripeness: String,
    ripeness_text: String,
    flowers: String,
    flower_text: String,
}

impl From<&CaptureAnalysis> for AnalysisRow {
    fn from(row: &CaptureAnalysis) -> Self {
        let scores = &row.result.scores;
        AnalysisRow {
            capture_id: row.capture.id,
            captured_at: row.capture.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            file_path: truncate_name(&row.capture.file_path, DEFAULT_PATH_MAX_LEN),
            result_id: row.result.id,
            ripeness: display_option(&scores.ripeness_score),
            ripeness_text: display_option(&scores.ripeness_text),
            flowers: display_option(&scores.flower_count),
            flower_text: display_option(&scores.flower_text),
        }
    }
}

#[derive(Serialize)]
struct CaptureDetail {
    capture: growbox::ImageCapture,
    results: Vec<growbox::AnalysisResult>,
}

pub fn run(config: &GrowboxConfig, args: CaptureArgs, output_format: OutputFormat) {
    match args.command {
        CaptureCommands::Import { file, scores } => {
            run_import(config, &file, scores, output_format)
        }
        CaptureCommands::Register { path } => run_register(config, &path, output_format),
        CaptureCommands::Analyze { capture, scores } => {
            run_analyze(config, &capture, scores, output_format)
        }
        CaptureCommands::Show { capture } => run_show(config, &capture, output_format),
        CaptureCommands::Fetch { url } => run_fetch(config, url, output_format),
        CaptureCommands::Recent { limit } => run_recent(config, limit, output_format),
    }
}

fn run_import(
    config: &GrowboxConfig,
    file: &std::path::Path,
    scores: ScoreArgs,
    output_format: OutputFormat,
) {
    let mut service = super::ingest_service(config);
    if let Some(scores) = scores.into_scores() {
        service = service.with_classifier(Arc::new(StaticClassifier::new(scores)));
    }

    match service.import_file(file) {
        Ok(outcome) => print_outcome(&outcome, output_format),
        Err(e) => super::fail(e),
    }
}

fn run_register(config: &GrowboxConfig, path: &str, output_format: OutputFormat) {
    let service = super::ingest_service(config);
    match service.register_capture(path) {
        Ok(id) => {
            if output_format.is_json() {
                super::print_json(&serde_json::json!({ "capture_id": id }), output_format);
            } else {
                println!("Capture {}", id);
            }
        }
        Err(e) => super::fail(e),
    }
}

fn run_analyze(
    config: &GrowboxConfig,
    capture: &CaptureRef,
    scores: ScoreArgs,
    output_format: OutputFormat,
) {
    let Some(scores) = scores.into_scores() else {
        super::fail("at least one of --ripeness, --ripeness-text, --flowers, --flower-text is required");
    };

    let service = super::ingest_service(config);
    match service.attach_analysis(capture, &scores) {
        Ok(id) => {
            if output_format.is_json() {
                super::print_json(&serde_json::json!({ "result_id": id }), output_format);
            } else {
                println!("Recorded analysis result {}", id);
            }
        }
        Err(e) => super::fail(e),
    }
}

fn run_show(config: &GrowboxConfig, capture: &CaptureRef, output_format: OutputFormat) {
    let service = super::ingest_service(config);
    let captures = service.database().captures();

    let detail = service.resolve_capture(capture).and_then(|id| {
        let capture = captures.get_capture(id)?;
        let results = captures.analyses_for_capture(id)?;
        Ok(capture.map(|capture| CaptureDetail { capture, results }))
    });

    let detail = match detail {
        Ok(Some(detail)) => detail,
        Ok(None) => super::fail(format!("no capture matches {:?}", capture)),
        Err(e) => super::fail(e),
    };

    if output_format.is_json() {
        super::print_json(&detail, output_format);
        return;
    }

    println!("Capture {}", detail.capture.id);
    println!(
        "  Captured at:    {}",
        detail.capture.timestamp.format(TIMESTAMP_FORMAT)
    );
    println!("  File:           {}", detail.capture.file_path);
    if detail.results.is_empty() {
        println!("  Analysis:       none");
    }
    for result in &detail.results {
        println!(
            "  Analysis {}:    ripeness {} ({}), flowers {} ({})",
            result.id,
            display_option(&result.scores.ripeness_score),
            display_option(&result.scores.ripeness_text),
            display_option(&result.scores.flower_count),
            display_option(&result.scores.flower_text),
        );
    }
}

fn run_fetch(config: &GrowboxConfig, url: Option<String>, output_format: OutputFormat) {
    let Some(url) = url.or_else(|| config.capture_url.clone()) else {
        super::fail("no capture URL configured; pass --url or set capture_url");
    };

    let service = super::ingest_service(config);
    let trigger = HttpCaptureTrigger::new(url, config.capture_timeout(), service);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => super::fail(e),
    };

    match runtime.block_on(trigger.trigger()) {
        Ok(outcome) => print_outcome(&outcome, output_format),
        Err(e) => super::fail(format!("{:#}", e)),
    }
}

fn run_recent(config: &GrowboxConfig, limit: i64, output_format: OutputFormat) {
    let db = super::open_database(config);
    let list = match db.captures().recent_analyses(limit) {
        Ok(list) => list,
        Err(e) => super::fail(e),
    };

    if output_format.is_json() {
        super::print_json_list(&list, output_format);
        return;
    }
    if list.is_empty() {
        eprintln!("No analyzed captures recorded.");
        return;
    }
    let rows: Vec<AnalysisRow> = list.iter().map(AnalysisRow::from).collect();
    println!("{}", format_rows(&rows, output_format));
}

fn print_outcome(outcome: &IngestOutcome, output_format: OutputFormat) {
    if output_format.is_json() {
        super::print_json(outcome, output_format);
        return;
    }
    println!(
        "Recorded capture {} ({} bytes) at {}",
        outcome.capture_id, outcome.image.size_bytes, outcome.image.file_path
    );
    match outcome.result_id {
        Some(id) => println!("Recorded analysis result {}", id),
        None => eprintln!("No analysis recorded; attach one with `growbox capture analyze`."),
    }
}
