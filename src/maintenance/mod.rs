//! Background maintenance
//!
//! The scheduler drives independent fixed-interval timers for the lifetime
//! of the hosting process:
//!
//! - retention: sweeps aged telemetry (default every 30 days)
//! - capture: asks the capture device for a new image (default every 12 hours)
//!
//! ```rust,ignore
//! use growbox::maintenance::MaintenanceScheduler;
//! use tokio_util::sync::CancellationToken;
//!
//! let shutdown = CancellationToken::new();
//! let handle = MaintenanceScheduler::from_config(&config, &service)?.start(shutdown.clone());
//! tokio::signal::ctrl_c().await?;
//! handle.shutdown().await;
//! ```

mod job;
mod scheduler;
mod trigger;

pub use job::{CaptureJob, MaintenanceJob, RetentionJob};
pub use scheduler::{MaintenanceScheduler, SchedulerHandle, TimerState, TimerStatus};
pub use trigger::CaptureTrigger;

#[cfg(feature = "capture-http")]
pub use trigger::HttpCaptureTrigger;
