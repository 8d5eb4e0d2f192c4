use serde::{Deserialize, Serialize};
use std::fmt;

/// Face region in normalized image coordinates (0.0–1.0 on both axes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceRegion {
    pub x_min: f32,
    pub y_min: f32,
    pub width: f32,
    pub height: f32,
}

impl FaceRegion {
    /// Centered box reported when a detector is positive but yields no usable geometry.
    pub const fn placeholder() -> Self {
        Self {
            x_min: 0.2,
            y_min: 0.1,
            width: 0.6,
            height: 0.8,
        }
    }

    /// Build a normalized region from a pixel-space rectangle, clipped to the image.
    pub fn from_pixels(x: f32, y: f32, width: f32, height: f32, img_w: u32, img_h: u32) -> Self {
        let iw = img_w.max(1) as f32;
        let ih = img_h.max(1) as f32;
        let x0 = (x / iw).clamp(0.0, 1.0);
        let y0 = (y / ih).clamp(0.0, 1.0);
        let x1 = ((x + width) / iw).clamp(0.0, 1.0);
        let y1 = ((y + height) / ih).clamp(0.0, 1.0);
        Self {
            x_min: x0,
            y_min: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// True when the region has a positive area.
    pub fn is_valid(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }

    /// Width/height of the region measured in pixels of an `img_w` × `img_h` image.
    pub fn pixel_aspect_ratio(&self, img_w: u32, img_h: u32) -> f32 {
        let h = self.height * img_h as f32;
        if h <= 0.0 {
            return 0.0;
        }
        (self.width * img_w as f32) / h
    }

    /// Pixel bounds `(x0, y0, x1, y1)` with exclusive upper edges, clamped to the image.
    pub fn pixel_bounds(&self, img_w: u32, img_h: u32) -> (u32, u32, u32, u32) {
        let to_px = |v: f32, max: u32| ((v * max as f32).round().max(0.0) as u32).min(max);
        let x0 = to_px(self.x_min, img_w);
        let y0 = to_px(self.y_min, img_h);
        let x1 = to_px(self.x_min + self.width, img_w).max(x0);
        let y1 = to_px(self.y_min + self.height, img_h).max(y0);
        (x0, y0, x1, y1)
    }
}

/// A facial keypoint in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub z: Option<f32>,
}

/// Which detector tier produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Scrfd,
    Heuristic,
    None,
}

/// Outcome of a single detection attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub face_detected: bool,
    /// Detector certainty in [0, 1].
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<FaceRegion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keypoints: Option<Vec<Keypoint>>,
    pub method: DetectionMethod,
}

impl DetectionResult {
    pub fn not_detected() -> Self {
        Self {
            face_detected: false,
            confidence: 0.0,
            bounding_box: None,
            keypoints: None,
            method: DetectionMethod::None,
        }
    }

    /// A positive detection. A region is mandatory: no box means no face.
    pub fn detected(
        confidence: f32,
        region: FaceRegion,
        keypoints: Option<Vec<Keypoint>>,
        method: DetectionMethod,
    ) -> Self {
        Self {
            face_detected: true,
            confidence: confidence.clamp(0.0, 1.0),
            bounding_box: Some(region),
            keypoints,
            method,
        }
    }
}

/// Face shape class. `Square` and `Diamond` are never produced by the
/// aspect-ratio classifier but remain valid for externally supplied analyses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaceShape {
    Oval,
    Round,
    Square,
    Heart,
    Oblong,
    Diamond,
}

impl FaceShape {
    pub fn as_str(&self) -> &'static str {
        match self {
            FaceShape::Oval => "oval",
            FaceShape::Round => "round",
            FaceShape::Square => "square",
            FaceShape::Heart => "heart",
            FaceShape::Oblong => "oblong",
            FaceShape::Diamond => "diamond",
        }
    }
}

impl fmt::Display for FaceShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Skin tone bucket derived from mean face brightness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkinTone {
    Light,
    Medium,
    Dark,
    Deep,
}

impl SkinTone {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkinTone::Light => "light",
            SkinTone::Medium => "medium",
            SkinTone::Dark => "dark",
            SkinTone::Deep => "deep",
        }
    }

    /// Seasonal color label shown to users.
    pub fn season(&self) -> &'static str {
        match self {
            SkinTone::Light => "spring",
            SkinTone::Medium => "summer",
            SkinTone::Dark => "autumn",
            SkinTone::Deep => "winter",
        }
    }
}

impl fmt::Display for SkinTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-feature attributes. Nothing measures these yet, so every field is
/// `None` until a landmark-based extractor fills them in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacialFeatures {
    pub eye_shape: Option<String>,
    pub eye_size: Option<String>,
    pub eyebrow_shape: Option<String>,
    pub lip_shape: Option<String>,
    pub nose_shape: Option<String>,
}

impl FacialFeatures {
    pub fn unmeasured() -> Self {
        Self::default()
    }
}

/// Attributes derived from a detected face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaceAttributes {
    pub face_shape: FaceShape,
    pub skin_tone: SkinTone,
    pub features: FacialFeatures,
}

/// Detection plus derived attributes. Attributes exist iff a face was detected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredFaceAnalysis")]
pub struct FaceAnalysis {
    #[serde(flatten)]
    detection: DetectionResult,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    attributes: Option<FaceAttributes>,
}

/// Wire shape of [`FaceAnalysis`] before the attribute invariant is checked.
#[derive(Deserialize)]
struct StoredFaceAnalysis {
    #[serde(flatten)]
    detection: DetectionResult,
    #[serde(flatten)]
    attributes: Option<FaceAttributes>,
}

impl TryFrom<StoredFaceAnalysis> for FaceAnalysis {
    type Error = String;

    fn try_from(stored: StoredFaceAnalysis) -> Result<Self, Self::Error> {
        match (stored.detection.face_detected, stored.attributes) {
            (true, Some(attributes)) => Ok(Self::detected(stored.detection, attributes)),
            (false, None) => Ok(Self::undetected(stored.detection)),
            (true, None) => Err("faceDetected is true but face attributes are missing".into()),
            (false, Some(_)) => Err("faceDetected is false but face attributes are present".into()),
        }
    }
}

impl FaceAnalysis {
    /// Analysis of an image in which no face was found.
    pub fn undetected(detection: DetectionResult) -> Self {
        Self {
            detection: DetectionResult {
                face_detected: false,
                bounding_box: None,
                keypoints: None,
                ..detection
            },
            attributes: None,
        }
    }

    /// Analysis of a detected face. Falls back to [`undetected`](Self::undetected)
    /// if `detection` is negative.
    pub fn detected(detection: DetectionResult, attributes: FaceAttributes) -> Self {
        if !detection.face_detected {
            return Self::undetected(detection);
        }
        Self {
            detection,
            attributes: Some(attributes),
        }
    }

    pub fn detection(&self) -> &DetectionResult {
        &self.detection
    }

    pub fn face_detected(&self) -> bool {
        self.detection.face_detected
    }

    pub fn confidence(&self) -> f32 {
        self.detection.confidence
    }

    pub fn attributes(&self) -> Option<&FaceAttributes> {
        self.attributes.as_ref()
    }

    pub fn face_shape(&self) -> Option<FaceShape> {
        self.attributes.as_ref().map(|a| a.face_shape)
    }

    pub fn skin_tone(&self) -> Option<SkinTone> {
        self.attributes.as_ref().map(|a| a.skin_tone)
    }
}
