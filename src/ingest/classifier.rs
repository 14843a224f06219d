//! Classifier seam
//!
//! The image classifier is an external collaborator. Anything that can turn
//! a stored image into [`AnalysisScores`] can be plugged into the ingest
//! service.

use std::path::Path;

use anyhow::Result;

use crate::database::AnalysisScores;

/// Produces ripeness and flower scores for one stored image
pub trait ImageClassifier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn classify(&self, image: &Path) -> Result<AnalysisScores>;
}

/// Returns the same scores for every image
///
/// Used when scores are computed elsewhere and handed in with the image,
/// e.g. `growbox capture import --ripeness 0.8`.
#[derive(Debug, Clone, Default)]
pub struct StaticClassifier {
    scores: AnalysisScores,
}

impl StaticClassifier {
    pub fn new(scores: AnalysisScores) -> Self {
        Self { scores }
    }
}

impl ImageClassifier for StaticClassifier {
    fn name(&self) -> &str {
        "static"
    }

    fn classify(&self, _image: &Path) -> Result<AnalysisScores> {
        Ok(self.scores.clone())
    }
}
