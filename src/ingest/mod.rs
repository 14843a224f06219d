//! Ingestion of sensor readings and images
//!
//! - `image_store`: writes opaque image payloads to the image directory
//! - `classifier`: the [`ImageClassifier`] seam
//! - `service`: [`IngestService`], the entry point for boundary layers

mod classifier;
mod image_store;
mod service;

pub use classifier::{ImageClassifier, StaticClassifier};
pub use image_store::{absolute_path, ImageStore, StoredImage};
pub use service::{CaptureRef, IngestOutcome, IngestService};
