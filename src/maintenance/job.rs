//! Jobs driven by the maintenance scheduler

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{error, info};

use super::trigger::CaptureTrigger;
use crate::database::{RetentionSweeper, Table};

/// One unit of periodic maintenance
///
/// A failed run is reported through the returned error; the scheduler logs
/// it and keeps the timer going.
#[async_trait]
pub trait MaintenanceJob: Send + Sync {
    /// Name used in logs and timer status
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

// =============================================================================
// Retention
// =============================================================================

/// Sweeps each configured table with the same horizon
pub struct RetentionJob {
    sweeper: RetentionSweeper,
    tables: Vec<Table>,
    retention_days: u32,
}

impl RetentionJob {
    pub fn new(sweeper: RetentionSweeper, tables: Vec<Table>, retention_days: u32) -> Self {
        Self {
            sweeper,
            tables,
            retention_days,
        }
    }

    pub fn tables(&self) -> &[Table] {
        &self.tables
    }
}

#[async_trait]
impl MaintenanceJob for RetentionJob {
    fn name(&self) -> &str {
        "retention"
    }

    /// Every table is attempted even when an earlier one fails
    async fn run(&self) -> Result<()> {
        let mut failed = Vec::new();
        let mut total = 0;

        for &table in &self.tables {
            let sweeper = self.sweeper.clone();
            let days = self.retention_days;
            let outcome = tokio::task::spawn_blocking(move || sweeper.sweep(table, days))
                .await
                .map_err(|e| anyhow!("retention task for {} panicked: {}", table, e))
                .and_then(|r| r.map_err(anyhow::Error::from));

            match outcome {
                Ok(deleted) => total += deleted,
                Err(e) => {
                    error!("Retention sweep of {} failed: {:#}", table, e);
                    failed.push(table.name());
                }
            }
        }

        if failed.is_empty() {
            info!(
                "Retention removed {} rows older than {} days",
                total, self.retention_days
            );
            Ok(())
        } else {
            Err(anyhow!("retention failed for {}", failed.join(", ")))
        }
    }
}

// =============================================================================
// Capture
// =============================================================================

/// Asks the capture device for a new image
pub struct CaptureJob {
    trigger: Arc<dyn CaptureTrigger>,
}

impl CaptureJob {
    pub fn new(trigger: Arc<dyn CaptureTrigger>) -> Self {
        Self { trigger }
    }
}

#[async_trait]
impl MaintenanceJob for CaptureJob {
    fn name(&self) -> &str {
        "capture"
    }

    async fn run(&self) -> Result<()> {
        let outcome = self.trigger.trigger().await?;
        info!(
            "Capture via {} stored as {} (capture {})",
            self.trigger.name(),
            outcome.image.file_path,
            outcome.capture_id
        );
        Ok(())
    }
}
