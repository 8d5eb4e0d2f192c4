//! makeup-core — Face analysis and makeup recommendation engine.
//!
//! Decodes and normalizes uploaded photos, detects a face with SCRFD via
//! ONNX Runtime (falling back to a pixel heuristic when the model is
//! unavailable), classifies face shape and skin tone, and maps the result
//! to a structured makeup plan.

pub mod analysis;
pub mod detector;
pub mod features;
pub mod preferences;
pub mod preprocess;
pub mod recommend;
pub mod types;

pub use analysis::{AnalysisRecord, FaceAnalyzer};
pub use detector::{CompositeDetector, DetectorStatus, FaceDetector};
pub use preferences::{Occasion, Preferences, Region, Style};
pub use preprocess::{ImageAsset, ImageMetadata, PreprocessError, RejectionReason, UploadedFile};
pub use recommend::{MakeupPlan, MakeupSuggestion};
pub use types::{DetectionResult, FaceAnalysis, FaceRegion, FaceShape, SkinTone};

use std::path::PathBuf;

/// Default directory searched for ONNX model files.
///
/// `$XDG_DATA_HOME/makeup/models`, or `~/.local/share/makeup/models`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("makeup/models")
}
