//! Two-tier face detection.
//!
//! [`ScrfdDetector`] runs the SCRFD ONNX model when it can be loaded;
//! [`HeuristicDetector`] scores skin-tone coverage and center lighting when
//! it cannot. [`CompositeDetector`] hides the difference: its `detect` never
//! fails, it only reports lower confidence when the model tier is missing.

pub mod heuristic;
pub mod scrfd;

pub use heuristic::HeuristicDetector;
pub use scrfd::ScrfdDetector;

use crate::types::DetectionResult;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} (place insightface det_10g.onnx in the model directory)")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A single detection strategy.
pub trait FaceDetector: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Locate the most prominent face in `image`.
    fn detect(&self, image: &RgbImage) -> Result<DetectionResult, DetectorError>;
}

/// Which tiers a [`CompositeDetector`] can use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorStatus {
    /// Model loaded; heuristic used only on runtime failure.
    ModelReady,
    /// Model unavailable; every call goes to the heuristic.
    HeuristicOnly,
}

impl DetectorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorStatus::ModelReady => "model-ready",
            DetectorStatus::HeuristicOnly => "heuristic-only",
        }
    }
}

/// Model detector with silent heuristic fallback.
pub struct CompositeDetector {
    primary: Option<Box<dyn FaceDetector>>,
    fallback: HeuristicDetector,
}

impl CompositeDetector {
    pub fn heuristic_only() -> Self {
        Self {
            primary: None,
            fallback: HeuristicDetector::default(),
        }
    }

    pub fn with_primary(primary: Box<dyn FaceDetector>) -> Self {
        Self {
            primary: Some(primary),
            fallback: HeuristicDetector::default(),
        }
    }

    /// Try to load the SCRFD model at `model_path`. Any failure leaves the
    /// detector in heuristic-only mode instead of returning an error.
    pub fn initialize(model_path: &Path) -> Self {
        match ScrfdDetector::load(model_path) {
            Ok(scrfd) => {
                tracing::info!(path = %model_path.display(), "SCRFD detector ready");
                Self::with_primary(Box::new(scrfd))
            }
            Err(e) => {
                tracing::warn!(
                    path = %model_path.display(),
                    error = %e,
                    "SCRFD unavailable; using heuristic detection only"
                );
                Self::heuristic_only()
            }
        }
    }

    pub fn status(&self) -> DetectorStatus {
        if self.primary.is_some() {
            DetectorStatus::ModelReady
        } else {
            DetectorStatus::HeuristicOnly
        }
    }

    /// Detect a face. Model errors are logged and answered by the heuristic.
    pub fn detect(&self, image: &RgbImage) -> DetectionResult {
        if let Some(primary) = &self.primary {
            match primary.detect(image) {
                Ok(result) => return result,
                Err(e) => {
                    tracing::warn!(
                        detector = primary.name(),
                        error = %e,
                        "model detection failed; falling back to heuristic"
                    );
                }
            }
        }
        self.fallback.evaluate(image)
    }
}

impl FaceDetector for CompositeDetector {
    fn name(&self) -> &'static str {
        "composite"
    }

    fn detect(&self, image: &RgbImage) -> Result<DetectionResult, DetectorError> {
        Ok(CompositeDetector::detect(self, image))
    }
}
