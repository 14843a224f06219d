//! Ingestion entry points for boundary layers
//!
//! [`IngestService`] is what an HTTP layer or the capture timer calls: it
//! validates input, writes image bytes, runs the classifier and records the
//! outcome through the stores.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::classifier::ImageClassifier;
use super::image_store::{absolute_path, ImageStore, StoredImage};
use crate::database::{
    AnalysisScores, GrowboxDatabase, SensorInput, StoreError, StoreErrorKind, StoreResult,
};

/// How a caller refers to an existing capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureRef {
    Id(i64),
    /// Resolved to its absolute form before lookup
    Path(String),
}

impl From<i64> for CaptureRef {
    fn from(id: i64) -> Self {
        CaptureRef::Id(id)
    }
}

impl std::str::FromStr for CaptureRef {
    type Err = std::convert::Infallible;

    /// Integers are ids, anything else is a path
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().parse::<i64>() {
            Ok(id) => CaptureRef::Id(id),
            Err(_) => CaptureRef::Path(s.to_string()),
        })
    }
}

/// Result of ingesting one image
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestOutcome {
    pub image: StoredImage,
    pub capture_id: i64,
    /// Set when the image was analyzed in the same unit of work
    pub result_id: Option<i64>,
}

/// Ingestion facade over the stores, the image directory and a classifier
#[derive(Clone)]
pub struct IngestService {
    db: GrowboxDatabase,
    images: ImageStore,
    classifier: Option<Arc<dyn ImageClassifier>>,
}

impl IngestService {
    pub fn new(db: GrowboxDatabase, images: ImageStore) -> Self {
        Self {
            db,
            images,
            classifier: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ImageClassifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn database(&self) -> &GrowboxDatabase {
        &self.db
    }

    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Store one sensor reading
    pub fn record_reading(&self, input: &SensorInput) -> StoreResult<i64> {
        self.db.readings().append(input)
    }

    /// Store image bytes and record the capture; the analysis arrives later
    pub fn ingest_image(&self, bytes: &[u8]) -> StoreResult<IngestOutcome> {
        let image = self.images.write(bytes)?;

        match self.db.captures().record_capture(&image.file_path) {
            Ok(capture_id) => {
                info!("Recorded capture {} ({})", capture_id, image.file_path);
                Ok(IngestOutcome {
                    image,
                    capture_id,
                    result_id: None,
                })
            }
            Err(e) => {
                self.images.discard(&image);
                Err(e)
            }
        }
    }

    /// Store image bytes, classify them and record capture and result together
    ///
    /// Without a classifier, or when classification fails, only the capture
    /// is recorded so the result can be attached later.
    pub fn ingest_and_analyze(&self, bytes: &[u8]) -> StoreResult<IngestOutcome> {
        let Some(classifier) = self.classifier.as_ref() else {
            debug!("No classifier configured, recording capture only");
            return self.ingest_image(bytes);
        };

        let image = self.images.write(bytes)?;

        let scores = match classifier.classify(image.path()) {
            Ok(scores) => scores,
            Err(e) => {
                warn!(
                    "Classifier '{}' failed on {}: {:#}",
                    classifier.name(),
                    image.file_path,
                    e
                );
                return match self.db.captures().record_capture(&image.file_path) {
                    Ok(capture_id) => Ok(IngestOutcome {
                        image,
                        capture_id,
                        result_id: None,
                    }),
                    Err(e) => {
                        self.images.discard(&image);
                        Err(e)
                    }
                };
            }
        };

        match self
            .db
            .captures()
            .record_capture_with_analysis(&image.file_path, &scores)
        {
            Ok(recorded) => {
                info!(
                    "Recorded capture {} with analysis {} ({})",
                    recorded.capture_id, recorded.result_id, image.file_path
                );
                Ok(IngestOutcome {
                    image,
                    capture_id: recorded.capture_id,
                    result_id: Some(recorded.result_id),
                })
            }
            Err(e) => {
                self.images.discard(&image);
                Err(e)
            }
        }
    }

    /// Read an existing file and ingest a copy of it
    pub fn import_file(&self, file: &Path) -> StoreResult<IngestOutcome> {
        let bytes = std::fs::read(file).map_err(|e| {
            StoreError::invalid_argument(format!("Failed to read '{}': {}", file.display(), e))
        })?;
        self.ingest_and_analyze(&bytes)
    }

    /// Record a capture for an image already on disk
    ///
    /// If another flow recorded the same path first, its id is returned.
    pub fn register_capture(&self, path: &str) -> StoreResult<i64> {
        let path = resolve_path(path)?;
        let captures = self.db.captures();

        match captures.record_capture(&path) {
            Ok(id) => Ok(id),
            Err(e) if e.is(StoreErrorKind::DuplicateCapture) => {
                debug!("Capture for '{}' already recorded, looking it up", path);
                captures
                    .find_capture_id_by_path(&path)?
                    .ok_or_else(|| StoreError::unknown_capture_path(&path))
            }
            Err(e) => Err(e),
        }
    }

    /// Attach an analysis result to an existing capture
    pub fn attach_analysis(
        &self,
        capture: &CaptureRef,
        scores: &AnalysisScores,
    ) -> StoreResult<i64> {
        let capture_id = self.resolve_capture(capture)?;
        let result_id = self.db.captures().record_analysis(capture_id, scores)?;
        info!("Attached analysis {} to capture {}", result_id, capture_id);
        Ok(result_id)
    }

    /// Capture id for a reference; `UnknownCapture` when a path is not recorded
    pub fn resolve_capture(&self, capture: &CaptureRef) -> StoreResult<i64> {
        match capture {
            CaptureRef::Id(id) => Ok(*id),
            CaptureRef::Path(path) => {
                let path = resolve_path(path)?;
                self.db
                    .captures()
                    .find_capture_id_by_path(&path)?
                    .ok_or_else(|| StoreError::unknown_capture_path(&path))
            }
        }
    }
}

fn resolve_path(path: &str) -> StoreResult<String> {
    if path.trim().is_empty() {
        return Err(StoreError::invalid_argument("Image path must not be empty"));
    }
    let resolved = absolute_path(Path::new(path))?;
    resolved
        .to_str()
        .map(str::to_string)
        .ok_or_else(|| StoreError::invalid_argument(format!("Path '{}' is not valid UTF-8", path)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::Table;
    use crate::ingest::StaticClassifier;
    use tempfile::TempDir;

    struct FailingClassifier;

    impl ImageClassifier for FailingClassifier {
        fn name(&self) -> &str {
            "failing"
        }

        fn classify(&self, _image: &Path) -> anyhow::Result<AnalysisScores> {
            anyhow::bail!("model not loaded")
        }
    }

    fn setup() -> (TempDir, IngestService) {
        let dir = TempDir::new().unwrap();
        let db = GrowboxDatabase::open_in_dir(dir.path()).unwrap();
        let images = ImageStore::new(dir.path().join("images")).unwrap();
        (dir, IngestService::new(db, images))
    }

    fn scores() -> AnalysisScores {
        AnalysisScores {
            ripeness_score: Some(0.4),
            ripeness_text: Some("unripe".to_string()),
            flower_count: Some(0),
            flower_text: None,
        }
    }

    fn image_files(service: &IngestService) -> usize {
        std::fs::read_dir(service.images().dir()).unwrap().count()
    }

    #[test]
    fn test_ingest_and_analyze_with_classifier() {
        let (_dir, service) = setup();
        let service = service.with_classifier(Arc::new(StaticClassifier::new(scores())));

        let outcome = service.ingest_and_analyze(b"jpeg").unwrap();
        assert!(outcome.result_id.is_some());
        assert!(outcome.image.path().exists());

        let joined = service.database().captures().recent_analyses(5).unwrap();
        assert_eq!(joined.len(), 1);
        assert_eq!(joined[0].capture.file_path, outcome.image.file_path);
        assert_eq!(joined[0].result.scores, scores());
    }

    #[test]
    fn test_classifier_failure_records_capture_only() {
        let (_dir, service) = setup();
        let service = service.with_classifier(Arc::new(FailingClassifier));

        let outcome = service.ingest_and_analyze(b"jpeg").unwrap();
        assert_eq!(outcome.result_id, None);

        let counts = service.database().table_counts().unwrap();
        assert!(counts.contains(&(Table::ImageCapture, 1)));
        assert!(counts.contains(&(Table::AnalysisResult, 0)));
    }

    #[test]
    fn test_failed_combined_write_removes_file() {
        let (_dir, service) = setup();
        let bad = AnalysisScores {
            ripeness_score: Some(2.0),
            ..Default::default()
        };
        let service = service.with_classifier(Arc::new(StaticClassifier::new(bad)));

        let err = service.ingest_and_analyze(b"jpeg").unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::InvalidArgument);
        assert_eq!(image_files(&service), 0);
    }

    #[test]
    fn test_decoupled_flow_by_path() {
        let (_dir, service) = setup();
        let outcome = service.ingest_image(b"jpeg").unwrap();

        let capture = CaptureRef::Path(outcome.image.file_path.clone());
        let result_id = service.attach_analysis(&capture, &scores()).unwrap();

        let results = service
            .database()
            .captures()
            .analyses_for_capture(outcome.capture_id)
            .unwrap();
        assert_eq!(results[0].id, result_id);
    }

    #[test]
    fn test_attach_to_unknown_path() {
        let (dir, service) = setup();
        let missing = dir.path().join("images").join("never.jpg");
        let capture = CaptureRef::Path(missing.to_string_lossy().to_string());

        let err = service.attach_analysis(&capture, &scores()).unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::UnknownCapture);

        let err = service
            .attach_analysis(&CaptureRef::Id(999), &scores())
            .unwrap_err();
        assert_eq!(err.kind, StoreErrorKind::UnknownCapture);
    }

    #[test]
    fn test_register_capture_falls_back_to_existing() {
        let (_dir, service) = setup();
        let outcome = service.ingest_image(b"jpeg").unwrap();

        let id = service.register_capture(&outcome.image.file_path).unwrap();
        assert_eq!(id, outcome.capture_id);
    }

    #[test]
    fn test_capture_ref_parsing() {
        assert_eq!("42".parse::<CaptureRef>().unwrap(), CaptureRef::Id(42));
        assert_eq!(
            "/img/a.jpg".parse::<CaptureRef>().unwrap(),
            CaptureRef::Path("/img/a.jpg".to_string())
        );
    }
}
