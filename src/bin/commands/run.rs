use clap::Args;
use growbox::{GrowboxConfig, MaintenanceScheduler, OutputFormat, TimerStatus};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Arguments for the Run command
#[derive(Args)]
pub struct RunArgs {
    /// Run every job once at startup instead of waiting a full interval
    #[clap(long)]
    pub run_on_startup: bool,
}

pub fn run(config: &GrowboxConfig, args: RunArgs, output_format: OutputFormat) {
    let mut config = config.clone();
    config.run_on_startup |= args.run_on_startup;

    let service = super::ingest_service(&config);
    let scheduler = match MaintenanceScheduler::from_config(&config, &service) {
        Ok(s) => s,
        Err(e) => super::fail(e),
    };

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => super::fail(e),
    };

    let statuses = runtime.block_on(async move {
        let cancel = CancellationToken::new();
        info!(
            "Starting maintenance timers: {}",
            scheduler.job_names().join(", ")
        );
        let handle = scheduler.start(cancel);

        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Unable to listen for shutdown signal: {}", e);
        }
        info!("Shutting down maintenance timers");

        handle.shutdown().await
    });

    print_statuses(&statuses, output_format);
}

fn print_statuses(statuses: &[TimerStatus], output_format: OutputFormat) {
    if output_format.is_json() {
        super::print_json_list(statuses, output_format);
        return;
    }
    for status in statuses {
        println!(
            "{}: {} completed, {} failed",
            status.job, status.completed_runs, status.failed_runs
        );
    }
}
