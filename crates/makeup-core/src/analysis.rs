//! Sequential analysis pipeline: validate → process → detect → extract → recommend.

use crate::detector::{CompositeDetector, DetectorStatus};
use crate::features;
use crate::preferences::Preferences;
use crate::preprocess::{
    ImageAsset, ImageMetadata, PreprocessError, Preprocessor, ProcessOptions, UploadedFile,
};
use crate::recommend::{self, MakeupPlan};
use crate::types::FaceAnalysis;
use chrono::{DateTime, Utc};
use image::{DynamicImage, RgbImage};
use serde::Serialize;
use uuid::Uuid;

/// What the pipeline hands to a persistence collaborator.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRecord {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub preferences: Preferences,
    pub image: ImageMetadata,
    pub analysis: FaceAnalysis,
    pub plan: MakeupPlan,
}

/// Owns a detector and runs every analysis step in order.
///
/// Holds no per-request state; the same analyzer can serve any number of
/// uploads one after another.
pub struct FaceAnalyzer {
    preprocessor: Preprocessor,
    options: ProcessOptions,
    detector: CompositeDetector,
}

impl FaceAnalyzer {
    pub fn new(
        preprocessor: Preprocessor,
        options: ProcessOptions,
        detector: CompositeDetector,
    ) -> Self {
        Self {
            preprocessor,
            options,
            detector,
        }
    }

    pub fn detector_status(&self) -> DetectorStatus {
        self.detector.status()
    }

    /// Validate and normalize an upload.
    pub fn prepare(&self, file: &UploadedFile) -> Result<ImageAsset, PreprocessError> {
        self.preprocessor.validate(file)?;
        self.preprocessor.process(file, &self.options)
    }

    /// Detect and classify a face in already-decoded pixels.
    pub fn analyze_image(&self, image: &RgbImage) -> FaceAnalysis {
        let detection = self.detector.detect(image);
        match (detection.face_detected, detection.bounding_box) {
            (true, Some(region)) => {
                let attributes = features::extract_attributes(image, &region);
                FaceAnalysis::detected(detection, attributes)
            }
            _ => FaceAnalysis::undetected(detection),
        }
    }

    /// Decode a prepared asset, then detect and classify.
    pub fn analyze_asset(&self, asset: &ImageAsset) -> Result<FaceAnalysis, PreprocessError> {
        let pixels = asset.decode_rgb()?;
        Ok(self.analyze_image(&pixels))
    }

    /// Run the full pipeline on an upload.
    pub fn analyze(
        &self,
        file: &UploadedFile,
        prefs: &Preferences,
    ) -> Result<AnalysisRecord, PreprocessError> {
        let asset = self.prepare(file)?;
        self.record(asset, prefs)
    }

    /// Run the pipeline on a frame the application captured itself.
    /// The frame is normalized like an upload but not subject to the
    /// upload type and size checks.
    pub fn analyze_frame(
        &self,
        frame: RgbImage,
        prefs: &Preferences,
    ) -> Result<AnalysisRecord, PreprocessError> {
        let asset = self
            .preprocessor
            .process_image(DynamicImage::ImageRgb8(frame), &self.options)?;
        self.record(asset, prefs)
    }

    fn record(
        &self,
        asset: ImageAsset,
        prefs: &Preferences,
    ) -> Result<AnalysisRecord, PreprocessError> {
        let analysis = self.analyze_asset(&asset)?;
        let plan = recommend::generate_plan(&analysis, prefs);

        tracing::info!(
            width = asset.width,
            height = asset.height,
            face_detected = analysis.face_detected(),
            confidence = analysis.confidence(),
            method = ?analysis.detection().method,
            "analysis complete"
        );

        Ok(AnalysisRecord {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            preferences: *prefs,
            image: ImageMetadata {
                width: asset.width,
                height: asset.height,
                size: asset.bytes.len(),
                mime_type: asset.mime_type,
            },
            analysis,
            plan,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{encode_png, OutputFormat};
    use crate::recommend::Category;
    use crate::types::{FaceShape, SkinTone};
    use image::imageops::FilterType;
    use image::Rgb;

    fn analyzer() -> FaceAnalyzer {
        let options = ProcessOptions { format: OutputFormat::Png, ..ProcessOptions::default() };
        FaceAnalyzer::new(Preprocessor::default(), options, CompositeDetector::heuristic_only())
    }

    fn portrait() -> RgbImage {
        RgbImage::from_fn(300, 400, |x, y| {
            if (50..250).contains(&x) && (75..325).contains(&y) {
                Rgb([200, 150, 120])
            } else {
                Rgb([50, 50, 50])
            }
        })
    }

    #[test]
    fn test_pipeline_on_portrait() {
        let file = UploadedFile::new("image/png", encode_png(&portrait()).unwrap());
        let record = analyzer().analyze(&file, &Preferences::default()).unwrap();

        assert!(record.analysis.face_detected());
        // Placeholder box on 300×400: 180/320 = 0.5625 → heart.
        assert_eq!(record.analysis.face_shape(), Some(FaceShape::Heart));
        // Placeholder box is ~78% skin block, ~22% backdrop: mean ≈ 133.
        assert_eq!(record.analysis.skin_tone(), Some(SkinTone::Dark));
        assert_eq!(record.plan.suggestions().len(), Category::ALL.len());
        assert_eq!((record.image.width, record.image.height), (300, 400));
    }

    #[test]
    fn test_pipeline_without_face_still_recommends() {
        let img = RgbImage::from_pixel(120, 120, Rgb([0, 0, 0]));
        let file = UploadedFile::new("image/png", encode_png(&img).unwrap());
        let record = analyzer().analyze(&file, &Preferences::default()).unwrap();

        assert!(!record.analysis.face_detected());
        assert!(record.analysis.skin_tone().is_none());
        assert_eq!(record.plan.suggestions().len(), 5);
        assert!((record.plan.overall().suitability - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_pipeline_rejects_before_decoding() {
        let file = UploadedFile::new("text/plain", b"hello".to_vec());
        let err = analyzer().analyze(&file, &Preferences::default()).unwrap_err();
        assert!(matches!(err, PreprocessError::Rejected(_)));
    }

    #[test]
    fn test_light_face_region_classifies_light() {
        let img = RgbImage::from_pixel(300, 400, Rgb([230, 200, 185]));
        let analysis = analyzer().analyze_image(&img);
        // B > 170 fails the skin rule, so only the skin check fails (score 0.7).
        assert!(analysis.face_detected());
        assert_eq!(analysis.skin_tone(), Some(SkinTone::Light));
    }

    #[test]
    fn test_record_serializes_for_persistence() {
        let file = UploadedFile::new("image/png", encode_png(&portrait()).unwrap());
        let record = analyzer().analyze(&file, &Preferences::default()).unwrap();
        let json = serde_json::to_value(&record).unwrap();
        assert!(json["id"].is_string());
        assert!(json["createdAt"].is_string());
        assert_eq!(json["analysis"]["faceDetected"], true);
        assert_eq!(json["plan"]["suggestions"].as_array().unwrap().len(), 5);
    }

    #[test]
    fn test_large_frame_bypasses_upload_ceiling() {
        let options = ProcessOptions { format: OutputFormat::Png, ..ProcessOptions::default() };
        let detector = CompositeDetector::heuristic_only();
        let analyzer = FaceAnalyzer::new(Preprocessor::new(1024), options, detector);
        let frame = image::imageops::resize(&portrait(), 1200, 1600, FilterType::Nearest);

        // The same pixels as an upload exceed the 1 KiB ceiling.
        let upload = UploadedFile::new("image/png", encode_png(&frame).unwrap());
        assert!(matches!(
            analyzer.analyze(&upload, &Preferences::default()),
            Err(PreprocessError::Rejected(_))
        ));

        let record = analyzer.analyze_frame(frame, &Preferences::default()).unwrap();
        assert_eq!((record.image.width, record.image.height), (768, 1024));
        assert!(record.analysis.face_detected());
    }
}
