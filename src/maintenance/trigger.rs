//! Capture-request collaborators
//!
//! The capture device is opaque: a trigger asks it for a frame and hands the
//! bytes to the ingest service.

use anyhow::Result;
use async_trait::async_trait;

use crate::ingest::IngestOutcome;

/// Requests one image from a capture device and ingests it
#[async_trait]
pub trait CaptureTrigger: Send + Sync {
    fn name(&self) -> &str;

    async fn trigger(&self) -> Result<IngestOutcome>;
}

#[cfg(feature = "capture-http")]
pub use http::HttpCaptureTrigger;

#[cfg(feature = "capture-http")]
mod http {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use tracing::debug;

    use super::CaptureTrigger;
    use crate::ingest::{IngestOutcome, IngestService};

    /// Largest frame accepted from the device
    const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

    /// Fetches a JPEG with an HTTP GET, e.g. from an ESP32 camera
    pub struct HttpCaptureTrigger {
        url: String,
        agent: ureq::Agent,
        service: IngestService,
    }

    impl HttpCaptureTrigger {
        pub fn new(url: impl Into<String>, timeout: Duration, service: IngestService) -> Self {
            let agent: ureq::Agent = ureq::Agent::config_builder()
                .timeout_global(Some(timeout))
                .build()
                .into();
            Self {
                url: url.into(),
                agent,
                service,
            }
        }

        pub fn url(&self) -> &str {
            &self.url
        }

        fn fetch(agent: &ureq::Agent, url: &str) -> Result<Vec<u8>> {
            let mut response = agent
                .get(url)
                .call()
                .map_err(|e| anyhow!("capture request to {} failed: {}", url, e))?;
            let bytes = response
                .body_mut()
                .with_config()
                .limit(MAX_IMAGE_BYTES)
                .read_to_vec()
                .map_err(|e| anyhow!("failed to read capture from {}: {}", url, e))?;
            Ok(bytes)
        }
    }

    #[async_trait]
    impl CaptureTrigger for HttpCaptureTrigger {
        fn name(&self) -> &str {
            "http"
        }

        async fn trigger(&self) -> Result<IngestOutcome> {
            let agent = self.agent.clone();
            let url = self.url.clone();
            let service = self.service.clone();

            // blocking HTTP and SQLite stay off the runtime threads
            tokio::task::spawn_blocking(move || -> Result<IngestOutcome> {
                let bytes = Self::fetch(&agent, &url)?;
                debug!("Received {} bytes from {}", bytes.len(), url);
                Ok(service.ingest_and_analyze(&bytes)?)
            })
            .await
            .map_err(|e| anyhow!("capture task panicked: {}", e))?
        }
    }

}
