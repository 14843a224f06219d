//! Maintenance scheduler
//!
//! Each registered job gets its own fixed-interval timer task. A timer
//! alternates between `WAITING` and `RUNNING` until the cancellation token
//! fires; a failed run is logged and the timer keeps going. A run that has
//! started is never interrupted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::job::{MaintenanceJob, RetentionJob};
use crate::config::GrowboxConfig;
use crate::ingest::IngestService;

// =============================================================================
// Timer status
// =============================================================================

/// The two states of a maintenance timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimerState {
    Waiting,
    Running,
}

impl std::fmt::Display for TimerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimerState::Waiting => write!(f, "WAITING"),
            TimerState::Running => write!(f, "RUNNING"),
        }
    }
}

/// Snapshot of one timer, published on a watch channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimerStatus {
    pub job: String,
    pub state: TimerState,
    pub completed_runs: u64,
    pub failed_runs: u64,
}

impl TimerStatus {
    fn new(job: &str) -> Self {
        Self {
            job: job.to_string(),
            state: TimerState::Waiting,
            completed_runs: 0,
            failed_runs: 0,
        }
    }

    /// Runs that have finished, successfully or not
    pub fn total_runs(&self) -> u64 {
        self.completed_runs + self.failed_runs
    }
}

// =============================================================================
// Scheduler
// =============================================================================

struct TimerSpec {
    job: Arc<dyn MaintenanceJob>,
    period: Duration,
    run_immediately: bool,
}

/// Registry of maintenance timers, started together
#[derive(Default)]
pub struct MaintenanceScheduler {
    timers: Vec<TimerSpec>,
}

impl MaintenanceScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a job on its own timer
    ///
    /// With `run_immediately` the first run happens at start, otherwise after
    /// one full `period`.
    pub fn with_job(
        mut self,
        job: Arc<dyn MaintenanceJob>,
        period: Duration,
        run_immediately: bool,
    ) -> Result<Self> {
        if period.is_zero() {
            return Err(anyhow!("timer period for '{}' must be non-zero", job.name()));
        }
        self.timers.push(TimerSpec {
            job,
            period,
            run_immediately,
        });
        Ok(self)
    }

    /// The retention timer, plus the capture timer when a capture URL is set
    pub fn from_config(config: &GrowboxConfig, service: &IngestService) -> Result<Self> {
        let retention = RetentionJob::new(
            service.database().retention(),
            config.retention_tables.clone(),
            config.retention_days,
        );
        let scheduler = Self::new().with_job(
            Arc::new(retention),
            config.retention_interval,
            config.run_on_startup,
        )?;

        match &config.capture_url {
            #[cfg(feature = "capture-http")]
            Some(url) => {
                let trigger = super::trigger::HttpCaptureTrigger::new(
                    url.clone(),
                    config.capture_timeout(),
                    service.clone(),
                );
                scheduler.with_job(
                    Arc::new(super::job::CaptureJob::new(Arc::new(trigger))),
                    config.capture_interval,
                    config.run_on_startup,
                )
            }
            #[cfg(not(feature = "capture-http"))]
            Some(url) => {
                warn!(
                    "capture_url {} is set but HTTP capture support is not compiled in",
                    url
                );
                Ok(scheduler)
            }
            None => Ok(scheduler),
        }
    }

    /// Names of the registered jobs, in registration order
    pub fn job_names(&self) -> Vec<&str> {
        self.timers.iter().map(|t| t.job.name()).collect()
    }

    /// Spawn one task per timer on the current runtime
    pub fn start(self, cancel: CancellationToken) -> SchedulerHandle {
        let mut tasks = Vec::with_capacity(self.timers.len());
        let mut statuses = Vec::with_capacity(self.timers.len());

        for spec in self.timers {
            // fixed here so the schedule does not depend on when the task is first polled
            let first = if spec.run_immediately {
                Instant::now()
            } else {
                Instant::now() + spec.period
            };
            let (tx, rx) = watch::channel(TimerStatus::new(spec.job.name()));
            info!(
                "Starting {} timer every {}{}",
                spec.job.name(),
                humantime::format_duration(spec.period),
                if spec.run_immediately {
                    ", first run now"
                } else {
                    ""
                }
            );
            tasks.push(tokio::spawn(run_timer(spec, first, tx, cancel.clone())));
            statuses.push(rx);
        }

        SchedulerHandle {
            cancel,
            tasks,
            statuses,
        }
    }
}

async fn run_timer(
    spec: TimerSpec,
    first: Instant,
    status: watch::Sender<TimerStatus>,
    cancel: CancellationToken,
) {
    let name = spec.job.name().to_string();
    let mut ticker = interval_at(first, spec.period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("{} timer stopped", name);
                break;
            }
            _ = ticker.tick() => {}
        }

        status.send_modify(|s| s.state = TimerState::Running);
        debug!("Running {} job", name);

        // not raced against cancellation: a started run always finishes
        let outcome = spec.job.run().await;

        status.send_modify(|s| {
            s.state = TimerState::Waiting;
            match &outcome {
                Ok(()) => s.completed_runs += 1,
                Err(_) => s.failed_runs += 1,
            }
        });
        if let Err(e) = outcome {
            error!("{} job failed, retrying next interval: {:#}", name, e);
        }
    }
}

/// Running timers
pub struct SchedulerHandle {
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    statuses: Vec<watch::Receiver<TimerStatus>>,
}

impl SchedulerHandle {
    /// Current status of every timer
    pub fn statuses(&self) -> Vec<TimerStatus> {
        self.statuses.iter().map(|rx| rx.borrow().clone()).collect()
    }

    /// Watch one timer's status by job name
    pub fn subscribe(&self, job: &str) -> Option<watch::Receiver<TimerStatus>> {
        self.statuses
            .iter()
            .find(|rx| rx.borrow().job == job)
            .cloned()
    }

    /// Stop all timers, waiting for in-flight runs to finish
    ///
    /// Returns each timer's final status, including any run that was in
    /// flight when shutdown began.
    pub async fn shutdown(self) -> Vec<TimerStatus> {
        self.cancel.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("maintenance timer ended abnormally: {}", e);
            }
        }
        self.statuses.iter().map(|rx| rx.borrow().clone()).collect()
    }
}
